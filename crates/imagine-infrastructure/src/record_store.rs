//! Generation records: one directory per request under `{data}/generations`.

use chrono::{DateTime, Local};
use imagine_core::generation::{GenerationSummary, MIN_INPUT_LENGTH, format_timestamp};
use imagine_core::{ImagineError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File holding the rendered [`GenerationSummary`] of a record.
pub const SUMMARY_FILE: &str = "settings.txt";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct GenerationStore {
    root: PathBuf,
}

impl GenerationStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn record_dir(&self, title: &str) -> PathBuf {
        self.root.join(title)
    }

    /// Turns user input into a usable record title.
    ///
    /// A blank title becomes the formatted `now`. The title must not name an
    /// existing record and must be creatable as a directory; creatability is
    /// probed by creating and removing the directory.
    pub fn validate_title(&self, input: &str, now: DateTime<Local>) -> Result<String> {
        let title = match input.trim() {
            "" => format_timestamp(now),
            title => title.to_string(),
        };

        if title.chars().count() < MIN_INPUT_LENGTH {
            return Err(ImagineError::validation(format!(
                "Title must have a length of at least {MIN_INPUT_LENGTH}."
            )));
        }
        if title.contains(['/', '\\']) || title.starts_with('.') {
            return Err(ImagineError::validation(format!(
                "'{title}' cannot be used as a folder name."
            )));
        }

        let dir = self.record_dir(&title);
        if dir.exists() {
            return Err(ImagineError::validation(format!(
                "A generation named '{title}' already exists."
            )));
        }
        fs::create_dir_all(&self.root)?;
        fs::create_dir(&dir)
            .and_then(|_| fs::remove_dir(&dir))
            .map_err(|e| {
                ImagineError::validation(format!("'{title}' cannot be used as a folder name: {e}"))
            })?;

        Ok(title)
    }

    /// Creates the record directory and writes its summary before any image.
    pub fn create(&self, title: &str, summary: &GenerationSummary) -> Result<PathBuf> {
        let dir = self.record_dir(title);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(SUMMARY_FILE), summary.render())?;
        tracing::info!(title, path = %dir.display(), "generation record created");
        Ok(dir)
    }

    /// Record titles, sorted. Hidden entries (leading `.`) are not records.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut titles = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                titles.push(name);
            }
        }
        titles.sort();
        Ok(titles)
    }

    /// Number of image files in a record.
    pub fn image_count(&self, title: &str) -> Result<usize> {
        let dir = self.existing_dir(title)?;
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            if is_image(&entry?.path()) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn read_summary(&self, title: &str) -> Result<String> {
        let dir = self.existing_dir(title)?;
        let path = dir.join(SUMMARY_FILE);
        if !path.exists() {
            return Err(ImagineError::not_found("generation summary", title));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Removes the record directory and everything in it.
    pub fn delete(&self, title: &str) -> Result<()> {
        let dir = self.existing_dir(title)?;
        fs::remove_dir_all(&dir)?;
        tracing::info!(title, "generation record deleted");
        Ok(())
    }

    fn existing_dir(&self, title: &str) -> Result<PathBuf> {
        let dir = self.record_dir(title);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(ImagineError::not_found("generation", title))
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use imagine_core::generation::GenerationParameters;
    use tempfile::TempDir;

    fn summary() -> GenerationSummary {
        GenerationSummary {
            prompt: "a red fox in snow".into(),
            timestamp: "2024-01-02 03-04-05".into(),
            model_alias: "Dall-E 2".into(),
            image_count: 2,
            parameters: GenerationParameters::default(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_blank_title_becomes_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::new(temp_dir.path().to_path_buf());

        let title = store.validate_title("   ", now()).unwrap();
        assert_eq!(title, "2024-01-02 03-04-05");
        assert!(!store.record_dir(&title).exists());
    }

    #[test]
    fn test_title_rules() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::new(temp_dir.path().to_path_buf());

        assert!(store.validate_title("ab", now()).unwrap_err().is_validation());
        assert!(store.validate_title("a/b/c", now()).unwrap_err().is_validation());
        assert!(store.validate_title(".cache", now()).unwrap_err().is_validation());

        store.create("foxes", &summary()).unwrap();
        assert!(store.validate_title(" foxes ", now()).unwrap_err().is_validation());
        assert_eq!(store.validate_title("owls", now()).unwrap(), "owls");
    }

    #[test]
    fn test_create_writes_summary_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::new(temp_dir.path().to_path_buf());

        let dir = store.create("foxes", &summary()).unwrap();
        assert!(dir.join(SUMMARY_FILE).exists());
        assert_eq!(store.image_count("foxes").unwrap(), 0);
        assert!(
            store
                .read_summary("foxes")
                .unwrap()
                .starts_with("Generation Settings\n\nPrompt: a red fox in snow")
        );
    }

    #[test]
    fn test_list_count_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::new(temp_dir.path().to_path_buf());

        let dir = store.create("foxes", &summary()).unwrap();
        store.create("birds", &summary()).unwrap();
        fs::create_dir(temp_dir.path().join(".hidden")).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.join("1.png"), b"png").unwrap();
        fs::write(dir.join("2.JPG"), b"jpg").unwrap();

        assert_eq!(store.list().unwrap(), vec!["birds", "foxes"]);
        assert_eq!(store.image_count("foxes").unwrap(), 2);

        store.delete("foxes").unwrap();
        assert_eq!(store.list().unwrap(), vec!["birds"]);
        assert!(store.image_count("foxes").unwrap_err().is_not_found());
    }

    #[test]
    fn test_accepted_title_with_dot_is_listed() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::new(temp_dir.path().to_path_buf());

        let title = store.validate_title("cats v1.5", now()).unwrap();
        store.create(&title, &summary()).unwrap();

        assert_eq!(store.list().unwrap(), vec!["cats v1.5"]);
        store.delete(&title).unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
