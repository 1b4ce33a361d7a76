mod device_manager;
mod media_backend;
mod media_stream;
mod synthetic;

pub use device_manager::*;
pub use media_backend::*;
pub use media_stream::*;
pub use synthetic::*;
