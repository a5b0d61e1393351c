//! Error types shared by the cloud adapter, discovery and probing code.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("authentication against {url} failed: {status}: {body}")]
    Auth {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("no {service_type} endpoint in the service catalog for region {region}")]
    Catalog {
        service_type: String,
        region: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("instance {instance} has no addresses on network {network}")]
    MissingNetwork { instance: String, network: String },

    #[error("network {0} not found")]
    NetworkNotFound(String),

    #[error("cache file {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
