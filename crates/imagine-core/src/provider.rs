//! The seam every image generation backend implements.

use async_trait::async_trait;

use crate::batch::BatchPlan;
use crate::catalog::{ModelSpec, ServiceSpec};
use crate::credentials::Verification;
use crate::error::Result;
use crate::generation::{GenerationParameters, GenerationStream};

/// An image generation service.
///
/// `generate` only validates its inputs; no network request is made until the
/// returned stream is polled.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Static description of the service and its models.
    fn spec(&self) -> &'static ServiceSpec;

    /// Checks `api_key` with a lightweight authenticated request.
    async fn verify(&self, api_key: &str) -> Verification;

    fn generate(
        &self,
        api_key: &str,
        model: &'static ModelSpec,
        prompt: &str,
        plan: BatchPlan,
        parameters: &GenerationParameters,
    ) -> Result<GenerationStream>;
}
