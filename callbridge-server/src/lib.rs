mod config;
mod error;
pub mod presence;
mod router;
pub mod signaling;

pub use config::*;
pub use error::*;
pub use presence::*;
pub use router::*;
pub use signaling::*;
