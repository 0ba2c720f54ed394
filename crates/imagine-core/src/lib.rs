//! Domain model for the image generation console: settings, batch planning,
//! the generation event stream, credentials and the provider seam.

pub mod batch;
pub mod catalog;
pub mod credentials;
pub mod error;
pub mod generation;
pub mod provider;
pub mod settings;

pub use error::{ImagineError, Result};
