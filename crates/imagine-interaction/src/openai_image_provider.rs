//! OpenAI image generation (Dall-E 2 and 3) over the REST API.

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
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::{GENERATION_TIMEOUT, error_body, network_failure, verify_with};

const BASE_URL: &str = "https://api.openai.com/v1";
const SERVICE: &str = "OpenAI";

const DALLE3_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "aspect_ratio",
        alias: "Aspect Ratio",
        description: "The aspect ratio/format of the generated image(s).",
        default: "square",
        options: &["square", "landscape", "portrait"],
    },
    ParameterSpec {
        name: "quality",
        alias: "Quality",
        description: "The quality of the image. Affects attention to detail, not resolution.",
        default: "standard",
        options: &["hd", "standard"],
    },
    ParameterSpec {
        name: "style",
        alias: "Style",
        description: "The style of the image. Vivid images are more dramatic and hyper-real than natural images.",
        default: "vivid",
        options: &["vivid", "natural"],
    },
];

pub const DALLE3: ModelSpec = ModelSpec {
    name: "dalle-3",
    alias: "Dall-E 3",
    online_only: true,
    description: "(Recommended) OpenAI's flagship image generator that trades affordability for a wide array of generation features.",
    parameters: DALLE3_PARAMETERS,
};

pub const DALLE2: ModelSpec = ModelSpec {
    name: "dalle-2",
    alias: "Dall-E 2",
    online_only: true,
    description: "An older image generator that provides faster and cheaper but lower quality image generation.",
    parameters: &[],
};

pub static OPENAI_SERVICE: ServiceSpec = ServiceSpec {
    id: ServiceId::OpenAi,
    alias: "OpenAI",
    description: "The OpenAI platform providing Dall-E 2 and 3.",
    link: "https://platform.openai.com/api-keys",
    required: false,
    always_verify: false,
    models: &[DALLE3, DALLE2],
};

/// Image provider backed by `POST /v1/images/generations`.
#[derive(Clone)]
pub struct OpenAiImageProvider {
    client: Client,
    base_url: String,
}

impl OpenAiImageProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Points the provider at another API root (e.g. a proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for OpenAiImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn spec(&self) -> &'static ServiceSpec {
        &OPENAI_SERVICE
    }

    async fn verify(&self, api_key: &str) -> Verification {
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
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
        let body = Arc::new(build_request(model, prompt, parameters)?);
        let client = self.client.clone();
        let url = Arc::new(format!("{}/images/generations", self.base_url));
        let api_key = Arc::new(api_key.to_string());

        tracing::info!(model = model.name, images = plan.total(), batches = plan.len(), "starting OpenAI generation");

        Ok(batched_stream(plan, ImageEncoding::Base64, move |size| {
            let client = client.clone();
            let url = Arc::clone(&url);
            let api_key = Arc::clone(&api_key);
            let body = Arc::clone(&body);
            async move {
                fan_out(size, |_| request_image(&client, &url, &api_key, &body)).await
            }
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ImageGenerationRequest {
    model: &'static str,
    prompt: String,
    n: u32,
    size: &'static str,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[allow(dead_code)]
    r#type: Option<String>,
    code: Option<String>,
}

/// Builds the per-image request body. Every sub-request asks for one image.
fn build_request(
    model: &ModelSpec,
    prompt: &str,
    parameters: &GenerationParameters,
) -> Result<ImageGenerationRequest> {
    let (api_model, size, quality, style) = match model.name {
        "dalle-3" => (
            "dall-e-3",
            dalle3_size(parameters.get("aspect_ratio").unwrap_or("square"))?,
            Some(parameters.get("quality").unwrap_or("standard").to_string()),
            Some(parameters.get("style").unwrap_or("vivid").to_string()),
        ),
        "dalle-2" => ("dall-e-2", "1024x1024", None, None),
        other => {
            return Err(ImagineError::validation(format!(
                "Model '{other}' is not offered by {SERVICE}."
            )));
        }
    };

    Ok(ImageGenerationRequest {
        model: api_model,
        prompt: prompt.to_string(),
        n: 1,
        size,
        response_format: "b64_json",
        quality,
        style,
    })
}

fn dalle3_size(aspect_ratio: &str) -> Result<&'static str> {
    match aspect_ratio {
        "square" => Ok("1024x1024"),
        "landscape" => Ok("1792x1024"),
        "portrait" => Ok("1024x1792"),
        other => Err(ImagineError::validation(format!(
            "Unsupported aspect ratio '{other}'."
        ))),
    }
}

async fn request_image(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &ImageGenerationRequest,
) -> std::result::Result<String, BatchFailure> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .timeout(GENERATION_TIMEOUT)
        .json(body)
        .send()
        .await
        .map_err(|err| network_failure(SERVICE, &err))?;

    if !response.status().is_success() {
        let (status, body) = error_body(SERVICE, response).await;
        return Err(classify_failure(status, &body));
    }

    let parsed: ImageGenerationResponse = response.json().await.map_err(|err| {
        BatchFailure::new(
            FailureKind::Unknown,
            "Unknown error.",
            format!("Failed to parse {SERVICE} response: {err}"),
        )
    })?;

    parsed
        .data
        .into_iter()
        .next()
        .and_then(|image| image.b64_json)
        .ok_or_else(|| {
            BatchFailure::new(
                FailureKind::Unknown,
                "Unknown error.",
                format!("{SERVICE} returned no image data"),
            )
        })
}

/// Maps an error response onto a batch failure.
fn classify_failure(status: StatusCode, body: &str) -> BatchFailure {
    let (message, code) = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| (wrapper.error.message, wrapper.error.code))
        .unwrap_or_else(|_| (body.to_string(), None));
    let detail = format!("{status}: {message}");

    match status {
        StatusCode::UNAUTHORIZED => BatchFailure::new(
            FailureKind::Authentication,
            "The API key for OpenAI is incorrect.",
            detail,
        ),
        StatusCode::BAD_REQUEST => BatchFailure::new(
            FailureKind::ContentRejected,
            "Provided prompt was rejected by OpenAI.",
            detail,
        ),
        StatusCode::TOO_MANY_REQUESTS
            if message.contains("quota")
                || code.as_deref().is_some_and(|code| code.contains("quota")) =>
        {
            BatchFailure::new(
                FailureKind::InsufficientBalance,
                "Your OpenAI account does not have sufficient credits/balance.",
                detail,
            )
        }
        StatusCode::TOO_MANY_REQUESTS => BatchFailure::new(
            FailureKind::RateLimited,
            "Too many requests sent to OpenAI. Please wait and try again later.",
            detail,
        ),
        _ => BatchFailure::new(FailureKind::Unknown, "Unknown error.", detail),
    }
}
