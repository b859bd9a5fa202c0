
pub use mock_sink::*;
