// Copyright 2025 Martin Pool

//! Kubernetes namespaces that load tests can run in.

use std::fmt::{Display, Formatter};

use clap::ValueEnum;

/// The isolation domain for a run.
///
/// Every cluster call is scoped to exactly one namespace; nothing here
/// operates across namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum Namespace {
    #[default]
    #[value(name = "dev")]
    Development,
    #[value(name = "valid")]
    Validation,
    #[value(name = "prod")]
    Production,
}

impl Namespace {
    /// The name of the namespace on the cluster.
    pub fn label(self) -> &'static str {
        match self {
            Namespace::Development => "dev",
            Namespace::Validation => "valid",
            Namespace::Production => "prod",
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
