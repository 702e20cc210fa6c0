pub mod endpoints;
pub mod error;
pub mod nn;
pub mod pipeline;

pub use endpoints::{router, PredictService};
