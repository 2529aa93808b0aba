use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Release aborted: {0}")]
    Release(#[from] ReleaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx answer; `message` is the body text when the server sent one.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Malformed response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(ApiError::from(err))
    }
}

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("working tree has {0} changes; commit or stash them first")]
    DirtyWorkingTree(&'static str),

    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("invalid manifest {path}: {source}")]
    ManifestInvalid {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("build output missing: {0}")]
    BuildOutputMissing(PathBuf),

    #[error("build output {0} is excluded from version control")]
    BuildOutputIgnored(PathBuf),

    #[error("command `{0}` failed")]
    CommandFailed(String),

    #[error("could not read answer: {0}")]
    Prompt(String),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("not valid TOML: {0}")]
    Syntax(#[from] toml_edit::TomlError),

    #[error("no [package] table")]
    NoPackage,

    #[error("[package] has no name")]
    MissingName,

    #[error("[package] version is inherited from the workspace")]
    InheritedVersion,

    #[error("[package] version is not a string")]
    VersionNotString,
}

pub type Result<T> = std::result::Result<T, AppError>;
