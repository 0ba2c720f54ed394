//! HTTP image generation providers and the registry that selects them.

mod http;
#[cfg(test)]
mod mock_server;
pub mod openai_image_provider;
pub mod registry;
pub mod stability_image_provider;

pub use openai_image_provider::{OPENAI_SERVICE, OpenAiImageProvider};
pub use registry::ProviderRegistry;
pub use stability_image_provider::{STABILITY_SERVICE, StabilityImageProvider};
