pub mod criteria;
pub mod pattern;

pub use criteria::*;
pub use pattern::*;
