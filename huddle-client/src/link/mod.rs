mod driver;
mod peer_link;

pub use driver::*;
pub use peer_link::*;
