pub mod dimensions;
pub mod stored;

pub use dimensions::*;
pub use stored::*;
