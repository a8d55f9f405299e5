pub mod audit;
pub mod evaluator;
pub mod role;
pub mod statement;

pub use audit::*;
pub use evaluator::*;
pub use role::*;
pub use statement::*;

#[cfg(test)]
pub(crate) mod test_support;
