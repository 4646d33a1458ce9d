use crate::error::{InsightsError, Result};
use crate::store::{KeyValueStore, API_KEY_KEY, MODEL_KEY};
use log::info;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Environment variable supplying the built-in API key on first run.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// User settings persisted next to the month data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
}

impl Settings {
    /// Loads settings, seeding the API key from `GEMINI_API_KEY` when none is stored.
    pub fn load<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<Self> {
        let default_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::load_with_default(store, &default_key)
    }

    /// Loads settings, persisting `default_key` if the store has no key yet.
    pub fn load_with_default<S: KeyValueStore + ?Sized>(
        store: &mut S,
        default_key: &str,
    ) -> Result<Self> {
        let api_key = match store.get(API_KEY_KEY)? {
            Some(key) => key,
            None => {
                store.set(API_KEY_KEY, default_key.to_string())?;
                default_key.to_string()
            }
        };

        let model = store
            .get(MODEL_KEY)?
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self { api_key, model })
    }

    pub fn save_api_key<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
        api_key: impl Into<String>,
    ) -> Result<()> {
        self.api_key = api_key.into();
        store.set(API_KEY_KEY, self.api_key.clone())?;
        info!("API key updated");
        Ok(())
    }

    pub fn save_model<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
        model: impl Into<String>,
    ) -> Result<()> {
        self.model = model.into();
        store.set(MODEL_KEY, self.model.clone())?;
        info!("Model set to {}", self.model);
        Ok(())
    }

    /// The API key, or [`InsightsError::MissingApiKey`] if it is blank.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(InsightsError::MissingApiKey);
        }
        Ok(key)
    }

    /// Key with everything but the last four characters hidden, for display.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_first_run_persists_default_key() {
        let mut store = MemoryStore::new();
        let settings = Settings::load_with_default(&mut store, "builtin").unwrap();

        assert_eq!(settings.api_key, "builtin");
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(store.get(API_KEY_KEY).unwrap().as_deref(), Some("builtin"));
    }

    #[test]
    fn test_stored_key_wins_over_default() {
        let mut store = MemoryStore::new();
        store.set(API_KEY_KEY, "mine".to_string()).unwrap();

        let settings = Settings::load_with_default(&mut store, "builtin").unwrap();
        assert_eq!(settings.api_key, "mine");
    }

    #[test]
    fn test_save_and_reload() {
        let mut store = MemoryStore::new();
        let mut settings = Settings::load_with_default(&mut store, "").unwrap();
        assert!(matches!(
            settings.require_api_key(),
            Err(InsightsError::MissingApiKey)
        ));

        settings.save_api_key(&mut store, "  abc123  ").unwrap();
        settings.save_model(&mut store, "gemini-2.5-flash").unwrap();

        let reloaded = Settings::load_with_default(&mut store, "other").unwrap();
        assert_eq!(reloaded.require_api_key().unwrap(), "abc123");
        assert_eq!(reloaded.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_masked_api_key() {
        let settings = Settings {
            api_key: "AIzaSyABCD1234".to_string(),
            model: DEFAULT_MODEL.to_string(),
        };
        assert_eq!(settings.masked_api_key(), "**********1234");

        let short = Settings {
            api_key: "ab".to_string(),
            ..settings
        };
        assert_eq!(short.masked_api_key(), "**");
    }
}
