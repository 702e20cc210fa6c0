//! Dataset preparation and checkpoint selection for the sign classifier.
pub mod augment;
pub mod dataset;
pub mod evaluate;
