//! Webcam collector writing labelled training images.
pub mod capture;
pub mod sensors;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
