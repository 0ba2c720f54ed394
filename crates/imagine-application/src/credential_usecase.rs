//! API key management: which services are usable, verification policy and
//! persistence of keys.

use imagine_core::catalog::{ServiceId, ServiceSpec};
use imagine_core::credentials::{Credentials, Verification};
use imagine_core::generation::MIN_INPUT_LENGTH;
use imagine_core::settings::Settings;
use imagine_core::{ImagineError, Result};
use imagine_infrastructure::CredentialStore;
use imagine_interaction::ProviderRegistry;

pub struct CredentialUseCase {
    registry: ProviderRegistry,
    store: CredentialStore,
}

impl CredentialUseCase {
    pub fn new(registry: ProviderRegistry, store: CredentialStore) -> Self {
        Self { registry, store }
    }

    /// Loads the normalized credential file.
    pub fn load(&self) -> Result<Credentials> {
        self.store.load()
    }

    /// Services that have a stored key, in display order.
    pub fn available_services(&self, credentials: &Credentials) -> Vec<&'static ServiceSpec> {
        self.registry
            .specs()
            .filter(|spec| credentials.contains(spec.id.key()))
            .collect()
    }

    /// Services without a stored key.
    pub fn missing_services(&self, credentials: &Credentials) -> Vec<&'static ServiceSpec> {
        self.registry
            .specs()
            .filter(|spec| !credentials.contains(spec.id.key()))
            .collect()
    }

    /// Missing services the user must configure before using the app.
    pub fn missing_required(&self, credentials: &Credentials) -> Vec<&'static ServiceSpec> {
        self.missing_services(credentials)
            .into_iter()
            .filter(|spec| spec.required)
            .collect()
    }

    /// Whether a new key for `id` must be verified before it is saved.
    pub fn verification_required(&self, id: ServiceId, settings: &Settings) -> Result<bool> {
        Ok(settings.always_verify_keys() || self.spec(id)?.always_verify)
    }

    pub async fn verify(&self, id: ServiceId, api_key: &str) -> Result<Verification> {
        let provider = self
            .registry
            .get(id)
            .ok_or_else(|| ImagineError::not_found("service", id.key()))?;
        let verification = provider.verify(api_key.trim()).await;
        tracing::info!(service = %id, %verification, "API key verified");
        Ok(verification)
    }

    /// Stores `api_key` for `id`.
    pub fn save(&self, id: ServiceId, api_key: &str) -> Result<Credentials> {
        let api_key = validate_api_key(api_key)?;
        self.spec(id)?;
        self.store.upsert(id.key(), Some(&api_key))
    }

    /// Forgets the key for `id`.
    pub fn remove(&self, id: ServiceId) -> Result<Credentials> {
        self.spec(id)?;
        self.store.upsert(id.key(), None)
    }

    /// The stored key for `id`.
    pub fn api_key(&self, credentials: &Credentials, id: ServiceId) -> Result<String> {
        credentials
            .get(id.key())
            .map(str::to_string)
            .ok_or_else(|| {
                ImagineError::credential(format!("No API key stored for {}.", id.key()))
            })
    }

    fn spec(&self, id: ServiceId) -> Result<&'static ServiceSpec> {
        self.registry
            .get(id)
            .map(|provider| provider.spec())
            .ok_or_else(|| ImagineError::not_found("service", id.key()))
    }
}

/// Trims a user-entered key and checks its minimum length.
pub fn validate_api_key(input: &str) -> Result<String> {
    let key = input.trim();
    if key.chars().count() < MIN_INPUT_LENGTH {
        return Err(ImagineError::validation(format!(
            "API keys must be a minimum of length {MIN_INPUT_LENGTH}!"
        )));
    }
    Ok(key.to_string())
}
