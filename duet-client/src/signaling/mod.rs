mod channel;
mod connector;
mod signaling_output;

pub use channel::*;
pub use connector::*;
pub use signaling_output::*;
