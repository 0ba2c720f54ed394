//! API credentials as stored in the flat `KEY=VALUE` credential file.

use std::fmt;

/// Outcome of checking an API key against its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
    /// The provider could not be reached; the key's validity is unknown.
    NetworkUnreachable,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Valid => write!(f, "valid"),
            Verification::Invalid => write!(f, "invalid"),
            Verification::NetworkUnreachable => write!(f, "network unreachable"),
        }
    }
}

/// Ordered credential entries.
///
/// Iteration follows insertion order; updating an existing key keeps its
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    entries: Vec<(String, String)>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses raw file contents, keeping only non-empty entries whose key is in
    /// `known_keys`.
    ///
    /// Lines starting with `#` are dropped, trailing `#` comments are stripped,
    /// and values lose surrounding quote characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagine_core::credentials::Credentials;
    ///
    /// let raw = "# keys\n\nOPENAI=sk-123 # personal\nOTHER=x\n";
    /// let credentials = Credentials::normalize(raw, &["OPENAI"]);
    /// assert_eq!(credentials.render(), "OPENAI=sk-123\n");
    /// ```
    pub fn normalize(raw: &str, known_keys: &[&str]) -> Self {
        let mut credentials = Self::new();
        for line in raw.lines() {
            let mut line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.find('#') {
                if comment == 0 {
                    continue;
                }
                line = line[..comment].trim();
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            if !key.is_empty() && !value.is_empty() && known_keys.contains(&key) {
                credentials.set(key, value);
            }
        }
        credentials
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key`, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File contents, one `KEY=VALUE` line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect()
    }
}

/// Masks a secret for display, keeping a short prefix and suffix.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
