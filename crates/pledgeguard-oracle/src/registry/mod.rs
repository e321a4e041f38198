//! Oracle node registry

pub mod stake;

pub use stake::{Settlement, StakeRegistry};
