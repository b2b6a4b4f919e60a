// Error types shared by the library modules. The binary and the UI loop wrap
// these in `anyhow::Error` with extra context.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the three startup secrets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret `{0}` (set it in secrets.toml or the environment)")]
    Missing(&'static str),

    #[error("failed to read secrets file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse secrets file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures talking to the prediction service. Nothing here is retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API token is not a valid HTTP header value")]
    InvalidToken,

    #[error("request to prediction service failed")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures turning an uploaded file into feature rows.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to open {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV")]
    Csv(#[from] csv::Error),
}
