//! Common code shared between the services, the collector and the trainer.
pub mod imaging;
pub mod labels;
pub mod records;
pub mod store;

/// Error type.
pub type Error = Box<dyn std::error::Error>;

/// Side length of the square images the classifier is trained on.
pub const IMAGE_SIZE: u32 = 100;
