pub mod call;
mod config;
mod error;
pub mod media;
pub mod peer;
pub mod signaling;

pub use call::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use peer::*;
pub use signaling::*;
