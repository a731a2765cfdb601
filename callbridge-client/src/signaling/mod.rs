mod signaling_link;
mod ws_signaling;

pub use signaling_link::*;
pub use ws_signaling::*;
