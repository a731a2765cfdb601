pub use callbridge_core::{CallConfig, Emitter, SessionId, Subscription};

pub mod model {
    pub use callbridge_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use callbridge_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use callbridge_client::*;
}
