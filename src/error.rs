use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHub(Box<octocrab::Error>),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("process `{command}` failed ({}): args {args:?}, options {options}", exit_label(.code))]
    ProcessFailed {
        command: String,
        code: Option<i32>,
        args: Vec<String>,
        options: ScrubbedOptions,
    },

    #[error("failed to spawn `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("target specification is empty or has no name")]
    MissingTargetSpec,

    #[error("unknown target `{0}`")]
    UnknownTarget(String),

    #[error("unknown artifact store `{0}`")]
    UnknownStore(String),

    #[error("artifact store error: {0}")]
    Store(String),

    #[error("asset upload failed: {0}")]
    AssetUpload(String),

    #[error("build trigger failed: {0}")]
    TriggerFailed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Error::GitHub(Box::new(err))
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Spawn options as they may appear in error output: the environment map is
/// reduced to the sorted list of its key names so secret values never leak
/// into logs or error chains.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScrubbedOptions {
    pub env: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ScrubbedOptions {
    pub fn new(env: &HashMap<String, String>, cwd: Option<&PathBuf>) -> Self {
        let mut keys: Vec<String> = env.keys().cloned().collect();
        keys.sort();
        Self {
            env: keys,
            cwd: cwd.cloned(),
        }
    }
}

impl fmt::Display for ScrubbedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ env: {:?}", self.env)?;
        if let Some(cwd) = &self.cwd {
            write!(f, ", cwd: {}", cwd.display())?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrubbed_options_lists_keys_only() {
        let mut env = HashMap::new();
        env.insert("PASSWORD".to_string(), "hunter2".to_string());
        env.insert("API_TOKEN".to_string(), "secret".to_string());

        let scrubbed = ScrubbedOptions::new(&env, None);
        assert_eq!(scrubbed.env, vec!["API_TOKEN", "PASSWORD"]);

        let rendered = scrubbed.to_string();
        assert!(rendered.contains("PASSWORD"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_process_failed_display_scrubs_env() {
        let mut env = HashMap::new();
        env.insert("PASSWORD".to_string(), "x".to_string());

        let err = Error::ProcessFailed {
            command: "test".to_string(),
            code: Some(1),
            args: vec![],
            options: ScrubbedOptions::new(&env, None),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("exit code 1"));
        assert!(rendered.contains("PASSWORD"));
        assert!(!rendered.contains("\"x\""));
    }
}
