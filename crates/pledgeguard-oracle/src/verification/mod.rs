//! Verification request storage

pub mod store;

pub use store::RequestStore;
