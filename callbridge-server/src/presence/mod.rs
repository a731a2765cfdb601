mod connection_handle;
mod presence_registry;

pub use connection_handle::*;
pub use presence_registry::*;
