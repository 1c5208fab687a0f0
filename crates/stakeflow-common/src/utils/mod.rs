pub mod time;
pub mod units;

pub use time::*;
pub use units::*;
