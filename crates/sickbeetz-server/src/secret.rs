//! Secret reference resolver.
//!
//! Credential values in `config.toml` can point outside the file:
//!
//! - `env::VAR_NAME` - reads `$VAR_NAME` from the environment
//! - `file::/path/to/secret` - reads the first line of the file
//! - anything else - returned as-is (plain text)

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, String> {
    if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else if let Some(path) = value.strip_prefix("file::") {
        resolve_file(path)
    } else {
        Ok(value.to_string())
    }
}

/// Reads an environment variable.
fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}

/// Reads the first line of a file.
fn resolve_file(path: &str) -> Result<String, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read secret file `{}`: {}", path, e))?;
    content
        .lines()
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("secret file `{}` is empty", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert_eq!(resolve("xoxb-123-456").unwrap(), "xoxb-123-456");
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_SICKBEETZ_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(
            resolve("env::_SICKBEETZ_TEST_SECRET").unwrap(),
            "my-secret-value"
        );
        unsafe {
            std::env::remove_var("_SICKBEETZ_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let result = resolve("env::_SICKBEETZ_NONEXISTENT_VAR_12345");
        assert!(result.unwrap_err().contains("not set"));
    }

    #[test]
    fn file_prefix_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slack-token");
        std::fs::write(&path, "xoxb-from-file\nsecond line\n").unwrap();

        let value = resolve(&format!("file::{}", path.display())).unwrap();
        assert_eq!(value, "xoxb-from-file");
    }

    #[test]
    fn file_prefix_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(resolve(&format!("file::{}", missing.display())).is_err());

        let empty = dir.path().join("empty");
        std::fs::write(&empty, "\n").unwrap();
        assert!(
            resolve(&format!("file::{}", empty.display()))
                .unwrap_err()
                .contains("empty")
        );
    }
}
