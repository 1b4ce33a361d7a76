pub mod mock_rtc;

pub use mock_rtc::*;
pub use mock_signaling::*;
