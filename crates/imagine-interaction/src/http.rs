//! Helpers shared by the HTTP providers.

use imagine_core::credentials::Verification;
use imagine_core::generation::{BatchFailure, FailureKind};
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;

/// Upper bound for a single image request; generation can take a while.
pub(crate) const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);
pub(crate) const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(20);

/// A request that never got a response.
pub(crate) fn network_failure(service: &str, err: &reqwest::Error) -> BatchFailure {
    BatchFailure::new(
        FailureKind::Network,
        format!("Could not reach {service}. Please check your connection."),
        format!("{service} request failed: {err}"),
    )
}

/// Sends an authenticated probe request and interprets the outcome.
pub(crate) async fn verify_with(service: &str, request: RequestBuilder) -> Verification {
    match request.timeout(VERIFICATION_TIMEOUT).send().await {
        Ok(response) if response.status().is_success() => Verification::Valid,
        Ok(response) => {
            tracing::debug!(service, status = %response.status(), "API key rejected");
            Verification::Invalid
        }
        Err(err) => {
            tracing::debug!(service, error = %err, "API key verification could not reach the service");
            Verification::NetworkUnreachable
        }
    }
}

/// Reads an error body, falling back to a placeholder.
pub(crate) async fn error_body(service: &str, response: reqwest::Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| format!("Failed to read {service} error body"));
    (status, body)
}
