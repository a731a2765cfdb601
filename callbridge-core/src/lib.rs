pub mod emitter;
pub mod model;

pub use emitter::{Emitter, Subscription};
pub use model::*;
