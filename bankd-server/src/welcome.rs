//! Localized welcome messages.
//!
//! Messages live at `<dir>/<lang>/welcome_message.txt`. Only the first line of
//! the file is sent.

use crate::error::ServerError;
use std::path::PathBuf;

/// File name inside each language directory.
pub const WELCOME_FILE: &str = "welcome_message.txt";

/// Longest accepted language code.
pub const MAX_LANGUAGE_LEN: usize = 16;

/// Loads welcome messages from a directory tree.
#[derive(Debug, Clone)]
pub struct WelcomeMessages {
    dir: PathBuf,
}

impl WelcomeMessages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Loads the first line of the welcome message for `lang`.
    pub async fn load(&self, lang: &str) -> Result<String, ServerError> {
        validate_language(lang)?;

        let path = self.dir.join(lang).join(WELCOME_FILE);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            tracing::warn!("Welcome message {} unavailable: {}", path.display(), e);
            ServerError::WelcomeMessage(format!("no message for language '{}'", lang))
        })?;

        Ok(content
            .lines()
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r')
            .to_string())
    }
}

/// Checks that a language code is safe to use as a path component.
pub fn validate_language(lang: &str) -> Result<(), ServerError> {
    let valid = !lang.is_empty()
        && lang.len() <= MAX_LANGUAGE_LEN
        && lang
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ServerError::InvalidLanguage(lang.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_message(dir: &Path, lang: &str, content: &str) {
        let lang_dir = dir.join(lang);
        std::fs::create_dir_all(&lang_dir).unwrap();
        std::fs::write(lang_dir.join(WELCOME_FILE), content).unwrap();
    }

    #[test]
    fn test_validate_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("pt-BR").is_ok());
        assert!(validate_language("zh_Hant").is_ok());

        assert!(validate_language("").is_err());
        assert!(validate_language("..").is_err());
        assert!(validate_language("../etc").is_err());
        assert!(validate_language("en/../../x").is_err());
        assert!(validate_language("a".repeat(17).as_str()).is_err());
    }

    #[tokio::test]
    async fn test_load_first_line() {
        let dir = TempDir::new().unwrap();
        write_message(dir.path(), "en", "Welcome to the bank!\nSecond line\n");

        let messages = WelcomeMessages::new(dir.path());
        assert_eq!(messages.load("en").await.unwrap(), "Welcome to the bank!");
    }

    #[tokio::test]
    async fn test_load_crlf() {
        let dir = TempDir::new().unwrap();
        write_message(dir.path(), "de", "Willkommen!\r\n");

        let messages = WelcomeMessages::new(dir.path());
        assert_eq!(messages.load("de").await.unwrap(), "Willkommen!");
    }

    #[tokio::test]
    async fn test_load_empty_file() {
        let dir = TempDir::new().unwrap();
        write_message(dir.path(), "en", "");

        let messages = WelcomeMessages::new(dir.path());
        assert_eq!(messages.load("en").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_language() {
        let dir = TempDir::new().unwrap();
        let messages = WelcomeMessages::new(dir.path());

        let err = messages.load("fr").await.unwrap_err();
        assert!(matches!(err, ServerError::WelcomeMessage(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let messages = WelcomeMessages::new(dir.path().join("files"));
        write_message(dir.path(), "secret", "do not read");

        let err = messages.load("../secret").await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidLanguage(_)));
    }
}
