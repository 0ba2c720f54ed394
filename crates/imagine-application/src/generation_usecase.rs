//! Runs a generation request end to end: plans batches, creates the record,
//! drives the provider's event stream and saves every returned image.

use chrono::Local;
use futures::StreamExt;
use imagine_core::batch::BatchPlan;
use imagine_core::catalog::{ModelSpec, ServiceId};
use imagine_core::generation::{
    GenerationEvent, GenerationParameters, GenerationSummary, Severity, format_timestamp,
};
use imagine_core::settings::Settings;
use imagine_core::{ImagineError, Result};
use imagine_infrastructure::{BatchSaveReport, GenerationStore, write_batch};
use imagine_interaction::ProviderRegistry;
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to start a run. Inputs are already validated.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub service: ServiceId,
    pub model: &'static ModelSpec,
    pub prompt: String,
    pub image_count: u32,
    /// Record title, see [`GenerationStore::validate_title`].
    pub title: String,
    pub parameters: GenerationParameters,
}

/// Progress callbacks for the front end.
pub trait GenerationObserver {
    fn on_log(&mut self, message: &str);

    fn on_recoverable_error(&mut self, message: &str, detail: &str);

    /// A batch succeeded and its images were written.
    fn on_images_saved(&mut self, message: &str, report: &BatchSaveReport);

    /// The run pauses for `delay` before the next batch.
    fn on_waiting(&mut self, _delay: Duration) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Every batch was attempted.
    Completed {
        record: PathBuf,
        saved: usize,
        failed_batches: usize,
    },
    /// A fatal error stopped the run; the record may be incomplete.
    Aborted {
        record: PathBuf,
        saved: usize,
        message: String,
        detail: String,
    },
}

impl GenerationOutcome {
    pub fn record(&self) -> &PathBuf {
        match self {
            GenerationOutcome::Completed { record, .. } => record,
            GenerationOutcome::Aborted { record, .. } => record,
        }
    }

    pub fn saved(&self) -> usize {
        match self {
            GenerationOutcome::Completed { saved, .. } => *saved,
            GenerationOutcome::Aborted { saved, .. } => *saved,
        }
    }
}

pub struct GenerationUseCase {
    registry: ProviderRegistry,
    store: GenerationStore,
}

impl GenerationUseCase {
    pub fn new(registry: ProviderRegistry, store: GenerationStore) -> Self {
        Self { registry, store }
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// Runs `request` to completion or to its first fatal error.
    ///
    /// The provider stream is validated before the record directory is
    /// created, so a rejected request leaves nothing behind. Between batches
    /// the run sleeps for the configured batch timeout; no sleep follows the
    /// last batch.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        api_key: &str,
        settings: &Settings,
        observer: &mut dyn GenerationObserver,
    ) -> Result<GenerationOutcome> {
        let provider = self
            .registry
            .get(request.service)
            .ok_or_else(|| ImagineError::not_found("service", request.service.key()))?;
        let plan = BatchPlan::new(request.image_count, settings.batch_size())?;
        let batch_count = plan.len();
        let delay = settings.batch_timeout();

        let mut stream = provider.generate(
            api_key,
            request.model,
            &request.prompt,
            plan,
            &request.parameters,
        )?;

        let summary = GenerationSummary {
            prompt: request.prompt.clone(),
            timestamp: format_timestamp(Local::now()),
            model_alias: request.model.alias.to_string(),
            image_count: request.image_count,
            parameters: request.parameters.clone(),
        };
        let record = self.store.create(&request.title, &summary)?;

        tracing::info!(
            title = %request.title,
            service = %request.service,
            model = request.model.name,
            images = request.image_count,
            batches = batch_count,
            "generation started"
        );

        let mut finished_batches = 0;
        let mut failed_batches = 0;
        let mut next_index = 1;
        let mut saved = 0;

        while let Some(event) = stream.next().await {
            match event {
                GenerationEvent::Log { message } => {
                    observer.on_log(&message);
                    continue;
                }
                GenerationEvent::Error {
                    severity,
                    message,
                    detail,
                } => {
                    if severity == Severity::Fatal {
                        tracing::error!(%message, %detail, "generation aborted");
                        return Ok(GenerationOutcome::Aborted {
                            record,
                            saved,
                            message,
                            detail,
                        });
                    }
                    observer.on_recoverable_error(&message, &detail);
                    failed_batches += 1;
                }
                GenerationEvent::Images {
                    message,
                    encoding,
                    images,
                } => {
                    let report = write_batch(&images, encoding, &record, next_index).await;
                    next_index += images.len();
                    saved += report.saved;
                    observer.on_images_saved(&message, &report);
                }
            }

            finished_batches += 1;
            if finished_batches < batch_count && !delay.is_zero() {
                observer.on_waiting(delay);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(title = %request.title, saved, failed_batches, "generation finished");
        Ok(GenerationOutcome::Completed {
            record,
            saved,
            failed_batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use imagine_core::catalog::ServiceSpec;
    use imagine_core::credentials::Verification;
    use imagine_core::generation::{
        BatchFailure, FailureKind, GenerationStream, ImageEncoding, batched_stream,
    };
    use imagine_core::provider::ImageProvider;
    use imagine_core::settings::{BATCH_SIZE, BATCH_TIMEOUT, SettingValue, SettingsSchema};
    use imagine_interaction::OPENAI_SERVICE;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// Scripted provider: batch `n` (1-based) fails with `failures[n]` if set.
    struct ScriptedProvider {
        failures: Vec<(usize, FailureKind)>,
        started: Arc<Mutex<Vec<Instant>>>,
        corrupt_first_image: bool,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                failures: Vec::new(),
                started: Arc::new(Mutex::new(Vec::new())),
                corrupt_first_image: false,
            }
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        fn spec(&self) -> &'static ServiceSpec {
            &OPENAI_SERVICE
        }

        async fn verify(&self, _api_key: &str) -> Verification {
            Verification::Valid
        }

        fn generate(
            &self,
            _api_key: &str,
            _model: &'static ModelSpec,
            _prompt: &str,
            plan: BatchPlan,
            _parameters: &GenerationParameters,
        ) -> Result<GenerationStream> {
            let failures = self.failures.clone();
            let started = Arc::clone(&self.started);
            let corrupt_first_image = self.corrupt_first_image;
            let mut batch = 0;
            Ok(batched_stream(plan, ImageEncoding::Base64, move |size| {
                batch += 1;
                started.lock().unwrap().push(Instant::now());
                let failure = failures
                    .iter()
                    .find(|(n, _)| *n == batch)
                    .map(|(_, kind)| BatchFailure::new(*kind, "scripted failure", "detail"));
                async move {
                    match failure {
                        Some(failure) => Err(failure),
                        None => Ok((0..size)
                            .map(|i| {
                                if corrupt_first_image && i == 0 {
                                    "!!!".to_string()
                                } else {
                                    BASE64_STANDARD.encode(format!("image {i}"))
                                }
                            })
                            .collect()),
                    }
                }
            }))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        logs: Vec<String>,
        errors: Vec<String>,
        reports: Vec<BatchSaveReport>,
        waits: Vec<Duration>,
    }

    impl GenerationObserver for RecordingObserver {
        fn on_log(&mut self, message: &str) {
            self.logs.push(message.to_string());
        }

        fn on_recoverable_error(&mut self, message: &str, _detail: &str) {
            self.errors.push(message.to_string());
        }

        fn on_images_saved(&mut self, _message: &str, report: &BatchSaveReport) {
            self.reports.push(*report);
        }

        fn on_waiting(&mut self, delay: Duration) {
            self.waits.push(delay);
        }
    }

    fn settings(batch_size: i64, timeout_secs: i64) -> Settings {
        SettingsSchema::canonical()
            .default_settings()
            .with_value(BATCH_SIZE, SettingValue::Integer(batch_size))
            .with_value(BATCH_TIMEOUT, SettingValue::Integer(timeout_secs))
    }

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            service: ServiceId::OpenAi,
            model: &OPENAI_SERVICE.models[1],
            prompt: "a paper boat".into(),
            image_count: count,
            title: "boats".into(),
            parameters: GenerationParameters::default(),
        }
    }

    fn usecase(dir: &TempDir, provider: ScriptedProvider) -> GenerationUseCase {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(provider));
        GenerationUseCase::new(registry, GenerationStore::new(dir.path().to_path_buf()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_run_saves_all_images_and_waits_between_batches() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new();
        let started = Arc::clone(&provider.started);
        let usecase = usecase(&temp_dir, provider);
        let mut observer = RecordingObserver::default();

        let outcome = usecase
            .run(&request(5), "sk-test", &settings(2, 45), &mut observer)
            .await
            .unwrap();

        assert_eq!(outcome.saved(), 5);
        assert!(matches!(outcome, GenerationOutcome::Completed { failed_batches: 0, .. }));
        assert_eq!(usecase.store().image_count("boats").unwrap(), 5);
        assert_eq!(observer.logs.len(), 3);
        assert_eq!(observer.waits, vec![Duration::from_secs(45); 2]);

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 3);
        for pair in started.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(45));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_aborts_without_further_batches() {
        let temp_dir = TempDir::new().unwrap();
        let mut provider = ScriptedProvider::new();
        provider.failures = vec![(2, FailureKind::Authentication)];
        let started = Arc::clone(&provider.started);
        let usecase = usecase(&temp_dir, provider);
        let mut observer = RecordingObserver::default();

        let outcome = usecase
            .run(&request(8), "sk-test", &settings(2, 10), &mut observer)
            .await
            .unwrap();

        match &outcome {
            GenerationOutcome::Aborted { saved, message, .. } => {
                assert_eq!(*saved, 2);
                assert_eq!(message, "scripted failure");
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(started.lock().unwrap().len(), 2);
        assert!(outcome.record().join("settings.txt").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_error_skips_batch() {
        let temp_dir = TempDir::new().unwrap();
        let mut provider = ScriptedProvider::new();
        provider.failures = vec![(1, FailureKind::RateLimited)];
        let usecase = usecase(&temp_dir, provider);
        let mut observer = RecordingObserver::default();

        let outcome = usecase
            .run(&request(4), "sk-test", &settings(2, 5), &mut observer)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GenerationOutcome::Completed {
                record: temp_dir.path().join("boats"),
                saved: 2,
                failed_batches: 1,
            }
        );
        assert_eq!(observer.errors, vec!["scripted failure".to_string()]);
        assert_eq!(observer.waits.len(), 1);
        // numbering restarts at 1 for the first saved batch
        assert!(temp_dir.path().join("boats").join("1.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_save_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let mut provider = ScriptedProvider::new();
        provider.corrupt_first_image = true;
        let usecase = usecase(&temp_dir, provider);
        let mut observer = RecordingObserver::default();

        let outcome = usecase
            .run(&request(3), "sk-test", &settings(3, 5), &mut observer)
            .await
            .unwrap();

        assert_eq!(outcome.saved(), 2);
        assert_eq!(
            observer.reports,
            vec![BatchSaveReport {
                saved: 2,
                failed: 1,
                total: 3
            }]
        );
        assert!(observer.waits.is_empty());
        assert!(!temp_dir.path().join("boats").join("1.png").exists());
    }

    #[tokio::test]
    async fn test_unknown_service_is_rejected_before_record_creation() {
        let temp_dir = TempDir::new().unwrap();
        let usecase = GenerationUseCase::new(
            ProviderRegistry::new(),
            GenerationStore::new(temp_dir.path().to_path_buf()),
        );
        let mut observer = RecordingObserver::default();

        let err = usecase
            .run(&request(1), "sk-test", &settings(1, 5), &mut observer)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(usecase.store().list().unwrap().is_empty());
    }
}
