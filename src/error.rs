// Copyright 2025 Martin Pool

use thiserror::Error;

use crate::namespace::Namespace;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cluster error: {0}")]
    Cluster(Box<kube::Error>),

    #[error("Job {name} not found in namespace {namespace}")]
    JobNotFound { name: String, namespace: Namespace },

    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Unexpected resource format: {0}")]
    Format(&'static str),
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::Cluster(Box::new(err))
    }
}
