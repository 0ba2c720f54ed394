//! StabilityAI image generation (Stable Diffusion 3 and 3 Turbo).

use async_trait::async_trait;
use imagine_core::batch::BatchPlan;
use imagine_core::catalog::{ModelSpec, ParameterSpec, ServiceId, ServiceSpec};
use imagine_core::credentials::Verification;
use imagine_core::generation::{
    BatchFailure, FailureKind, GenerationParameters, GenerationStream, ImageEncoding,
    batched_stream, fan_out,
};
use imagine_core::provider::ImageProvider;
use imagine_core::{ImagineError, Result};
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::http::{GENERATION_TIMEOUT, error_body, network_failure, verify_with};

const BASE_URL: &str = "https://api.stability.ai";
const SERVICE: &str = "StabilityAI";

const ASPECT_RATIOS: &[&str] = &[
    "16:9", "1:1", "21:9", "2:3", "3:2", "4:5", "5:4", "9:16", "9:21",
];

const SD3_PARAMETERS: &[ParameterSpec] = &[ParameterSpec {
    name: "aspect_ratio",
    alias: "Aspect Ratio",
    description: "The aspect ratio/format of the generated image(s).",
    default: "1:1",
    options: ASPECT_RATIOS,
}];

pub const SD3: ModelSpec = ModelSpec {
    name: "sd3",
    alias: "Stable Diffusion 3",
    online_only: true,
    description: "(Recommended) The newest image generator from StabilityAI.",
    parameters: SD3_PARAMETERS,
};

pub const SD3_TURBO: ModelSpec = ModelSpec {
    name: "sd3-turbo",
    alias: "Stable Diffusion 3 Turbo",
    online_only: true,
    description: "A faster and cheaper version of Stable Diffusion 3",
    parameters: SD3_PARAMETERS,
};

pub static STABILITY_SERVICE: ServiceSpec = ServiceSpec {
    id: ServiceId::StabilityAi,
    alias: "StabilityAI",
    description: "The StabilityAI platform providing Stable Diffusion 3 and 3 Turbo.",
    link: "https://platform.stability.ai/account/keys",
    required: false,
    always_verify: false,
    models: &[SD3, SD3_TURBO],
};

/// Image provider backed by the v2beta Stable Image API.
#[derive(Clone)]
pub struct StabilityImageProvider {
    client: Client,
    base_url: String,
}

impl StabilityImageProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for StabilityImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for StabilityImageProvider {
    fn spec(&self) -> &'static ServiceSpec {
        &STABILITY_SERVICE
    }

    async fn verify(&self, api_key: &str) -> Verification {
        let request = self
            .client
            .get(format!("{}/v1/user/account", self.base_url))
            .bearer_auth(api_key);
        verify_with(SERVICE, request).await
    }

    fn generate(
        &self,
        api_key: &str,
        model: &'static ModelSpec,
        prompt: &str,
        plan: BatchPlan,
        parameters: &GenerationParameters,
    ) -> Result<GenerationStream> {
        let fields = Arc::new(build_fields(model, prompt, parameters)?);
        let client = self.client.clone();
        let url = Arc::new(format!(
            "{}/v2beta/stable-image/generate/sd3",
            self.base_url
        ));
        let api_key = Arc::new(api_key.to_string());

        tracing::info!(model = model.name, images = plan.total(), batches = plan.len(), "starting StabilityAI generation");

        Ok(batched_stream(plan, ImageEncoding::Base64, move |size| {
            let client = client.clone();
            let url = Arc::clone(&url);
            let api_key = Arc::clone(&api_key);
            let fields = Arc::clone(&fields);
            async move {
                fan_out(size, |_| request_image(&client, &url, &api_key, &fields)).await
            }
        }))
    }
}

/// Form fields of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GenerationFields {
    prompt: String,
    model: &'static str,
    output_format: &'static str,
    aspect_ratio: String,
}

impl GenerationFields {
    /// Multipart forms are single-use, so one is built per sub-request.
    fn to_form(&self) -> Form {
        Form::new()
            .text("prompt", self.prompt.clone())
            .text("model", self.model)
            .text("output_format", self.output_format)
            .text("aspect_ratio", self.aspect_ratio.clone())
    }
}

#[derive(Deserialize)]
struct GenerationResponse {
    image: String,
}

fn build_fields(
    model: &'static ModelSpec,
    prompt: &str,
    parameters: &GenerationParameters,
) -> Result<GenerationFields> {
    if !matches!(model.name, "sd3" | "sd3-turbo") {
        return Err(ImagineError::validation(format!(
            "Model '{}' is not offered by {SERVICE}.",
            model.name
        )));
    }
    let aspect_ratio = parameters.get("aspect_ratio").unwrap_or("1:1");
    if !ASPECT_RATIOS.contains(&aspect_ratio) {
        return Err(ImagineError::validation(format!(
            "Unsupported aspect ratio '{aspect_ratio}'."
        )));
    }

    Ok(GenerationFields {
        prompt: prompt.to_string(),
        model: model.name,
        output_format: "png",
        aspect_ratio: aspect_ratio.to_string(),
    })
}

async fn request_image(
    client: &Client,
    url: &str,
    api_key: &str,
    fields: &GenerationFields,
) -> std::result::Result<String, BatchFailure> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .header("accept", "application/json")
        .timeout(GENERATION_TIMEOUT)
        .multipart(fields.to_form())
        .send()
        .await
        .map_err(|err| network_failure(SERVICE, &err))?;

    if !response.status().is_success() {
        let (status, body) = error_body(SERVICE, response).await;
        return Err(classify_failure(status, &body));
    }

    let parsed: GenerationResponse = response.json().await.map_err(|err| {
        BatchFailure::new(
            FailureKind::Unknown,
            "Unknown error.",
            format!("Failed to parse {SERVICE} response: {err}"),
        )
    })?;
    Ok(parsed.image)
}

fn classify_failure(status: StatusCode, body: &str) -> BatchFailure {
    let detail = format!("{status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED => BatchFailure::new(
            FailureKind::Authentication,
            "The API key for StabilityAI is incorrect.",
            detail,
        ),
        StatusCode::PAYMENT_REQUIRED => BatchFailure::new(
            FailureKind::InsufficientBalance,
            "Your StabilityAI account does not have sufficient credits/balance.",
            detail,
        ),
        StatusCode::FORBIDDEN => BatchFailure::new(
            FailureKind::ContentRejected,
            "Provided prompt was rejected by StabilityAI.",
            detail,
        ),
        StatusCode::TOO_MANY_REQUESTS => BatchFailure::new(
            FailureKind::RateLimited,
            "Too many requests sent to StabilityAI. Please wait and try again later.",
            detail,
        ),
        StatusCode::INTERNAL_SERVER_ERROR => BatchFailure::new(
            FailureKind::ServerError,
            "StabilityAI faced an unexpected error.",
            detail,
        ),
        _ => BatchFailure::new(FailureKind::Unknown, "Unknown error.", detail),
    }
}
