pub mod errors;
pub mod param;
pub mod point;

pub use errors::*;
pub use param::*;
pub use point::*;
