// src/error.rs
use std::{io, path::PathBuf, process::ExitCode};
use thiserror::Error;

/// Failures reading or writing the kubeconfig document. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "it seems you have a Kubernetes config file at {}, but it is not valid yaml, or unreadable: {source}",
        .path.display()
    )]
    Unreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(
        "error creating the {} folder, you can try manually creating it: {source}",
        .path.display()
    )]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize kubeconfig: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Problems with an inbound callback. These are reported to the requester only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("error parsing data: {0}")]
    Malformed(String),

    #[error("Kube config is missing data: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid registration host {host}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("callback listener error: {0}")]
    Serve(#[source] io::Error),

    #[error("callback listener stopped before receiving credentials")]
    Abandoned,

    #[error("interrupted while waiting for the registration callback")]
    Interrupted,
}

impl Error {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Interrupted => ExitCode::from(130),
            _ => ExitCode::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
