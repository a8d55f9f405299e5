pub mod bus;
pub mod cluster;
pub mod invocation;
pub mod request;
pub mod rule;

pub use bus::*;
pub use cluster::*;
pub use invocation::*;
pub use request::*;
pub use rule::*;

#[cfg(test)]
pub(crate) mod test_support;
