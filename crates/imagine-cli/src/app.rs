//! Menu flow of the console front end.

use anyhow::Result;
use chrono::Local;
use imagine_application::credential_usecase::validate_api_key;
use imagine_application::{
    CredentialUseCase, GenerationOutcome, GenerationRequest, GenerationUseCase,
};
use imagine_core::catalog::{ModelSpec, ParameterSpec, ServiceSpec};
use imagine_core::credentials::{Verification, mask_secret};
use imagine_core::generation::{
    GenerationParameters, ResolvedParameter, validate_image_count, validate_prompt,
};
use imagine_core::settings::{Setting, SettingValue, Settings, SettingsSchema};
use imagine_infrastructure::{CredentialStore, GenerationStore, ImaginePaths, SettingsService};
use imagine_interaction::ProviderRegistry;

use crate::console::{BACK, Console};
use crate::observer::ConsoleObserver;

pub struct App {
    console: Console,
    settings: SettingsService,
    credentials: CredentialUseCase,
    generation: GenerationUseCase,
}

impl App {
    pub fn new(paths: &ImaginePaths, console: Console) -> Self {
        let registry = ProviderRegistry::with_defaults();
        let store = CredentialStore::new(paths.credentials_file(), registry.known_keys());
        Self {
            console,
            settings: SettingsService::new(paths.settings_file(), SettingsSchema::canonical()),
            credentials: CredentialUseCase::new(registry.clone(), store),
            generation: GenerationUseCase::new(
                registry,
                GenerationStore::new(paths.generations_dir()),
            ),
        }
    }

    pub async fn run(&mut self, first_start: bool) -> Result<()> {
        self.console.clear();
        self.console.title("=== Imagine ===");
        if first_start {
            self.console
                .info("Welcome! Add an image generation service in the 'settings/services' menu to get started.");
        }

        self.settings.load()?;
        if !self.add_required_services().await? {
            return Ok(());
        }

        loop {
            self.console.title("Home");
            let Some(choice) = self
                .console
                .choose("What would you like to do", &["generate", "view", "settings", "quit"])?
            else {
                break;
            };
            let result = match choice.as_str() {
                "generate" => self.generate_menu().await,
                "view" => self.view_menu(),
                "settings" => self.settings_menu().await,
                _ => break,
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "menu action failed");
                self.console.error(&format!("{e}"));
                self.console.pause()?;
            }
            self.console.clear();
        }

        self.console.success("Goodbye!");
        Ok(())
    }

    /// Asks for every required service without a key. Returns `false` when the
    /// user quit instead.
    async fn add_required_services(&mut self) -> Result<bool> {
        let credentials = self.credentials.load()?;
        let missing = self.credentials.missing_required(&credentials);
        for (i, spec) in missing.iter().copied().enumerate() {
            self.console.warning(&format!(
                "You are currently missing {} required service(s)!",
                missing.len() - i
            ));
            if !self.ask_key(spec).await? {
                return Ok(false);
            }
        }
        if !missing.is_empty() {
            self.console
                .success("You have successfully added all required services!");
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Generate
    // ------------------------------------------------------------------

    async fn generate_menu(&mut self) -> Result<()> {
        self.console.clear();
        self.console.title("Generate");

        let credentials = self.credentials.load()?;
        let services = self.credentials.available_services(&credentials);
        if services.is_empty() {
            self.console.error("No added services found!");
            self.console
                .info("Missing services can be added in the 'settings/services' menu.");
            return self.console.pause();
        }

        self.console.numbered(
            services
                .iter()
                .map(|spec| format!("{}: {}", spec.alias, spec.model_aliases())),
        );
        let Some(index) = self.console.select("Select a service", services.len())? else {
            return Ok(());
        };
        let service = services[index];

        self.console.numbered(
            service
                .models
                .iter()
                .map(|model| format!("{}: {}", model.alias, model.description)),
        );
        let Some(index) = self.console.select("Select a model", service.models.len())? else {
            return Ok(());
        };
        let model = &service.models[index];

        let settings = self.settings.load()?.settings;

        let Some(prompt) = self.ask_validated("Enter your prompt", validate_prompt)? else {
            return Ok(());
        };
        let max_images = settings.max_images();
        let Some(image_count) = self.ask_validated(
            &format!("How many images would you like to generate (1-{max_images})"),
            |input| validate_image_count(input, max_images),
        )?
        else {
            return Ok(());
        };
        let store = self.generation.store();
        let Some(title) = ask_validated(
            &mut self.console,
            "Enter a title for this generation (blank for the current time)",
            |input| store.validate_title(input, Local::now()),
        )?
        else {
            return Ok(());
        };
        let Some(parameters) = self.ask_parameters(model)? else {
            return Ok(());
        };

        let api_key = self.credentials.api_key(&credentials, service.id)?;
        let request = GenerationRequest {
            service: service.id,
            model,
            prompt,
            image_count,
            title,
            parameters,
        };
        self.run_generation(&request, &api_key, &settings).await
    }

    fn ask_parameters(&mut self, model: &ModelSpec) -> Result<Option<GenerationParameters>> {
        let mut resolved = Vec::with_capacity(model.parameters.len());
        for spec in model.parameters {
            let Some(parameter) = self.ask_parameter(spec)? else {
                return Ok(None);
            };
            resolved.push(parameter);
        }
        Ok(Some(GenerationParameters::new(resolved)))
    }

    fn ask_parameter(&mut self, spec: &ParameterSpec) -> Result<Option<ResolvedParameter>> {
        self.console.info(&format!("{}: {}", spec.alias, spec.description));
        self.console
            .debug(&format!("Options: {}", spec.options.join(", ")));
        ask_validated(
            &mut self.console,
            &format!("{} (blank for '{}')", spec.alias, spec.default),
            |input| spec.resolve(Some(input)),
        )
    }

    async fn run_generation(
        &mut self,
        request: &GenerationRequest,
        api_key: &str,
        settings: &Settings,
    ) -> Result<()> {
        self.console.clear();
        self.console.info(&format!(
            "Generating {} image(s) with {}...",
            request.image_count, request.model.alias
        ));

        let mut observer = ConsoleObserver;
        let outcome = self
            .generation
            .run(request, api_key, settings, &mut observer)
            .await?;

        match outcome {
            GenerationOutcome::Completed { record, saved, .. } => {
                self.console.success(&format!(
                    "Generation finished! Saved {saved} image(s) to {}.",
                    record.display()
                ));
            }
            GenerationOutcome::Aborted {
                message, detail, ..
            } => {
                self.console.error("Critical Error Occured!");
                self.console.info(&format!("Description: {message}"));
                self.console.debug(&format!("Developer Info: {detail}"));
                if self
                    .console
                    .confirm("Would you like to delete the generation folder?")?
                {
                    self.generation.store().delete(&request.title)?;
                    self.console.success("Generation folder deleted.");
                }
            }
        }
        self.console.pause()
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    fn view_menu(&mut self) -> Result<()> {
        loop {
            self.console.clear();
            self.console.title("Generations");

            let store = self.generation.store();
            let titles = store.list()?;
            if titles.is_empty() {
                self.console.error("No generations found!");
                return self.console.pause();
            }

            let rows: Vec<String> = titles
                .iter()
                .map(|title| {
                    let count = store.image_count(title).unwrap_or(0);
                    format!("{title} ({count} image(s))")
                })
                .collect();
            self.console.numbered(rows);

            let Some(index) = self.console.select("Select a generation", titles.len())? else {
                return Ok(());
            };
            self.view_record(&titles[index])?;
        }
    }

    fn view_record(&mut self, title: &str) -> Result<()> {
        let store = self.generation.store();
        if store.image_count(title)? == 0 {
            self.console
                .warning("This generation does not contain any images.");
            if self.console.confirm("Would you like to delete it?")? {
                store.delete(title)?;
                self.console.success("Generation deleted.");
                self.console.pause()?;
            }
            return Ok(());
        }

        loop {
            let Some(choice) = self
                .console
                .choose("What would you like to do", &["settings", "delete", BACK])?
            else {
                return Ok(());
            };
            match choice.as_str() {
                "settings" => {
                    let summary = store.read_summary(title)?;
                    self.console.info(&summary);
                    println!();
                }
                "delete" => {
                    if self
                        .console
                        .confirm(&format!("Delete '{title}' and all of its images?"))?
                    {
                        store.delete(title)?;
                        self.console.success("Generation deleted.");
                        return self.console.pause();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    async fn settings_menu(&mut self) -> Result<()> {
        loop {
            self.console.clear();
            self.console.title("Settings");
            let Some(choice) = self
                .console
                .choose("What would you like to change", &["config", "services", BACK])?
            else {
                return Ok(());
            };
            match choice.as_str() {
                "config" => self.config_menu()?,
                "services" => self.services_menu().await?,
                _ => return Ok(()),
            }
        }
    }

    fn config_menu(&mut self) -> Result<()> {
        loop {
            self.console.clear();
            self.console.title("Config");

            let settings = self.settings.load()?.settings;
            let keys: Vec<String> = settings.iter().map(|(key, _)| key.to_string()).collect();
            self.console
                .numbered(settings.iter().map(|(key, setting)| describe_setting(key, setting)));

            let Some(index) = self.console.select("Select a config rule to edit", keys.len())?
            else {
                return Ok(());
            };
            let key = &keys[index];
            let Some(setting) = settings.get(key) else {
                continue;
            };
            let kind = setting.kind();

            let Some(input) = self
                .console
                .prompt(&format!("Enter a new {kind} value for {key} ({BACK} to cancel)"))?
            else {
                continue;
            };
            if input.eq_ignore_ascii_case(BACK) {
                continue;
            }

            match SettingValue::parse_as(kind, &input)
                .and_then(|value| self.settings.update(key, value))
            {
                Ok(_) => self.console.success(&format!("Updated {key}.")),
                Err(e) => self.console.error(&e.to_string()),
            }
            self.console.pause()?;
        }
    }

    async fn services_menu(&mut self) -> Result<()> {
        loop {
            self.console.clear();
            self.console.title("Services");
            let Some(choice) = self.console.choose(
                "What would you like to do with image generation services",
                &["add", "edit", "remove", BACK],
            )?
            else {
                return Ok(());
            };

            let credentials = self.credentials.load()?;
            match choice.as_str() {
                "add" => {
                    let missing = self.credentials.missing_services(&credentials);
                    if missing.is_empty() {
                        self.console.success("No missing services!");
                        self.console.pause()?;
                        continue;
                    }
                    if let Some(spec) = self.pick_service(&missing, "Select a service to add")? {
                        self.ask_key(spec).await?;
                    }
                }
                "edit" | "remove" => {
                    let available = self.credentials.available_services(&credentials);
                    if available.is_empty() {
                        self.console.error("No added services found!");
                        self.console.pause()?;
                        continue;
                    }
                    self.console.numbered(available.iter().map(|spec| {
                        let key = credentials.get(spec.id.key()).unwrap_or_default();
                        format!("{}: {}", spec.alias, mask_secret(key))
                    }));
                    let Some(index) = self.console.select("Select a service", available.len())?
                    else {
                        continue;
                    };
                    let spec = available[index];
                    if choice == "edit" {
                        self.ask_key(spec).await?;
                    } else if self
                        .console
                        .confirm(&format!("Remove the {} API key?", spec.alias))?
                    {
                        self.credentials.remove(spec.id)?;
                        self.console.success(&format!("Removed the {} API key.", spec.alias));
                        self.console.pause()?;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn pick_service(
        &mut self,
        services: &[&'static ServiceSpec],
        message: &str,
    ) -> Result<Option<&'static ServiceSpec>> {
        self.console
            .numbered(services.iter().map(|spec| spec.alias.to_string()));
        Ok(self
            .console
            .select(message, services.len())?
            .map(|index| services[index]))
    }

    /// Prompts for, optionally verifies and stores an API key. Returns `false`
    /// when the user backed out.
    async fn ask_key(&mut self, spec: &'static ServiceSpec) -> Result<bool> {
        let settings = self.settings.load()?.settings;
        let required = self.credentials.verification_required(spec.id, &settings)?;

        loop {
            self.console.clear();
            self.console
                .info(&format!("Currently asking for: {} API key.", spec.alias));
            self.console.info(&format!(
                "Description: {} You can get your API key at {}.",
                spec.description, spec.link
            ));

            let Some(input) = self.console.prompt(&format!(
                "Enter your {} API key ({BACK} to go back)",
                spec.alias
            ))?
            else {
                return Ok(false);
            };
            if input.eq_ignore_ascii_case(BACK) {
                return Ok(false);
            }
            let api_key = match validate_api_key(&input) {
                Ok(api_key) => api_key,
                Err(e) => {
                    self.console.error(&e.to_string());
                    self.console.pause()?;
                    continue;
                }
            };

            let verify = required
                || self
                    .console
                    .confirm("Would you like to verify the validity of this key")?;
            if verify {
                self.console
                    .info(&format!("Verifying {} API key...", spec.alias));
                match self.credentials.verify(spec.id, &api_key).await? {
                    Verification::Valid => self.console.success(&format!(
                        "Successfully validated the {} API key!",
                        spec.alias
                    )),
                    Verification::Invalid => {
                        self.console
                            .error(&format!("Oops! The entered {} API key was invalid!", spec.alias));
                        self.console.info("Try again!");
                        self.console.pause()?;
                        continue;
                    }
                    Verification::NetworkUnreachable => {
                        self.console.error(&format!(
                            "Oops! We failed to connect to {} servers!",
                            spec.alias
                        ));
                        self.console
                            .info("Check your internet connection and try again!");
                        self.console.pause()?;
                        continue;
                    }
                }
            } else {
                self.console.debug(&format!(
                    "Continuing without verifying {} API key...",
                    spec.alias
                ));
            }

            self.credentials.save(spec.id, &api_key)?;
            self.console
                .success(&format!("Saved the {} API key.", spec.alias));
            self.console.pause()?;
            return Ok(true);
        }
    }

    fn ask_validated<T>(
        &mut self,
        message: &str,
        validate: impl Fn(&str) -> imagine_core::Result<T>,
    ) -> Result<Option<T>> {
        ask_validated(&mut self.console, message, validate)
    }
}

/// Prompts until `validate` accepts the input. `None` when the user backs out.
fn ask_validated<T>(
    console: &mut Console,
    message: &str,
    validate: impl Fn(&str) -> imagine_core::Result<T>,
) -> Result<Option<T>> {
    loop {
        let Some(input) = console.prompt(&format!("{message} ({BACK} to cancel)"))? else {
            return Ok(None);
        };
        if input.eq_ignore_ascii_case(BACK) {
            return Ok(None);
        }
        match validate(&input) {
            Ok(value) => return Ok(Some(value)),
            Err(e) => console.error(&e.to_string()),
        }
    }
}

fn describe_setting(key: &str, setting: &Setting) -> String {
    let bounds = match (&setting.min_value, &setting.max_value) {
        (Some(min), Some(max)) => format!(" [{min}..{max}]"),
        _ => String::new(),
    };
    format!(
        "{key} = {}{bounds}\n      {}",
        setting.value, setting.description
    )
}
