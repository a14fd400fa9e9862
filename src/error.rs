//! All error types for the i18n-patch crate.
//!
//! Every fatal failure of a run (configuration, compilation, glob or file I/O) is reported
//! through [`Error`]. Condition evaluation has its own [`crate::condition::ConditionError`],
//! which is logged and never propagated.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on `{path}`: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported regular expression flag `{flag}` in `{flags}`")]
    UnsupportedFlag { flag: char, flags: String },

    #[error("translation.src must be a string: {0}")]
    InvalidSource(String),

    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("missing locale key `{key}` required by {context}")]
    MissingLocaleKey { key: String, context: String },

    #[error("could not determine locale")]
    MissingLocale,

    #[error("no config file named `{name}` in `{}`", dir.display())]
    ConfigNotFound { name: String, dir: PathBuf },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Wraps an I/O error with the path it happened on.
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Creates a missing-locale-key error for the given context.
    pub fn missing_key(key: impl Into<String>, context: impl Into<String>) -> Self {
        Error::MissingLocaleKey {
            key: key.into(),
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = Error::Io(io_error);
        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_file_io_error_names_path() {
        let error = Error::file_io(
            "out/a.js",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.to_string(), "I/O error on `out/a.js`: denied");
    }

    #[test]
    fn test_invalid_pattern_error() {
        let source = regex::Regex::new("(").unwrap_err();
        let error = Error::InvalidPattern {
            pattern: "(".to_string(),
            source,
        };
        assert!(error.to_string().starts_with("invalid pattern `(`"));
    }

    #[test]
    fn test_unsupported_flag_error() {
        let error = Error::UnsupportedFlag {
            flag: 'y',
            flags: "gy".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "unsupported regular expression flag `y` in `gy`"
        );
    }

    #[test]
    fn test_invalid_source_error() {
        let error = Error::InvalidSource("[1,2]".to_string());
        assert_eq!(error.to_string(), "translation.src must be a string: [1,2]");
    }

    #[test]
    fn test_missing_key_error() {
        let error = Error::missing_key("readme", "add directive `README.md`");
        assert_eq!(
            error.to_string(),
            "missing locale key `readme` required by add directive `README.md`"
        );
    }

    #[test]
    fn test_config_not_found_error() {
        let error = Error::ConfigNotFound {
            name: "i18n".to_string(),
            dir: PathBuf::from("config"),
        };
        assert_eq!(error.to_string(), "no config file named `i18n` in `config`");
    }

    #[test]
    fn test_error_debug() {
        let error = Error::MissingLocale;
        let debug = format!("{:?}", error);
        assert!(debug.contains("MissingLocale"));
    }
}
