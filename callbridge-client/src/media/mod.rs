mod media_backend;
mod media_device;

pub use media_backend::*;
pub use media_device::*;
