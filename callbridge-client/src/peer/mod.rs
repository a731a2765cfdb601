mod peer_link;
#[cfg(feature = "webrtc")]
mod webrtc_link;

pub use peer_link::*;
#[cfg(feature = "webrtc")]
pub use webrtc_link::*;
