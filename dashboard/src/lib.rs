//! Dashboard showing the latest sign predictions, with registration and login.
pub mod auth;
pub mod endpoints;
pub mod pages;
pub mod session;

pub use endpoints::{router, Dashboard};
