//! Runtime configuration (C7, ambient): request timeout and logging targets,
//! loaded from an optional JSON file with environment overrides.
//!
//! File discovery follows the credentials-file search pattern: look in the
//! current directory and its ancestors, bounded to prevent a runaway search.
//! Ported in spirit from `credentials::find_credentials` and
//! `eventlogger::read_config` in the original implementation.

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Error};
use serde::{Deserialize, Serialize};

/// Name of the config file this crate looks for in the directory tree.
pub const CONFIG_FILE_NAME: &str = "minifcgi.json";

const SEARCH_DEPTH_LIMIT: u32 = 100;

/// Runtime tunables for a FastCGI server process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout, in milliseconds, passed to [`crate::driver::handle`] for each
    /// accepted connection.
    pub request_timeout_ms: u64,
    /// Minimum log level; one of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
    /// When set, logs go to this file instead of stderr.
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            request_timeout_ms: 5000,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings: built-in defaults, overridden by a discovered config
    /// file, overridden by environment variables of the same name upper-cased
    /// and prefixed with `MINIFCGI_`.
    ///
    /// A missing config file is not an error -- it just means defaults apply,
    /// which is logged at `warn`. A config file that exists but fails to
    /// parse is returned as an error.
    pub fn load() -> Result<Settings, Error> {
        let mut settings = match find_config_file(CONFIG_FILE_NAME) {
            Ok(path) => read_config(&path)?,
            Err(_) => {
                log::warn!("no {} found in directory tree, using defaults", CONFIG_FILE_NAME);
                Settings::default()
            }
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MINIFCGI_REQUEST_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse() {
                self.request_timeout_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("MINIFCGI_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("MINIFCGI_LOG_FILE") {
            self.log_file = Some(v);
        }
    }
}

/// Look for `filename` in the current directory, then successive parents.
fn find_config_file(filename: &str) -> Result<PathBuf, Error> {
    let mut wd = std::env::current_dir()?;
    for _ in 0..SEARCH_DEPTH_LIMIT {
        if !wd.exists() {
            return Err(anyhow!("tried all parent directories without finding {}", filename));
        }
        let mut candidate = wd.clone();
        candidate.push(filename);
        if candidate.exists() {
            return Ok(candidate);
        }
        wd = wd
            .parent()
            .ok_or_else(|| anyhow!("could not find {} in directory tree", filename))?
            .to_path_buf();
    }
    Err(anyhow!("link loop in directory tree above {:?}", wd))
}

fn read_config(path: &PathBuf) -> Result<Settings, Error> {
    let data = std::fs::read_to_string(path).with_context(|| format!("reading config file {:?}", path))?;
    let settings: Settings = serde_json::from_str(&data).with_context(|| format!("parsing config file {:?}", path))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout_ms, 5000);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn parses_partial_json_with_field_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"log_level": "debug"}"#).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.request_timeout_ms, 5000);
    }

    #[test]
    fn env_overrides_apply_on_top_of_parsed_values() {
        // SAFETY: test-only, no other thread in this process touches this var.
        unsafe {
            std::env::set_var("MINIFCGI_REQUEST_TIMEOUT_MS", "1234");
        }
        let mut settings = Settings::default();
        settings.apply_env_overrides();
        unsafe {
            std::env::remove_var("MINIFCGI_REQUEST_TIMEOUT_MS");
        }
        assert_eq!(settings.request_timeout_ms, 1234);
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let result = find_config_file("a-file-name-nothing-will-ever-create.json");
        assert!(result.is_err());
    }
}
