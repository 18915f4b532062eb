// Copyright 2025 Martin Pool

//! Labels attached to jobs and pods.
//!
//! These strings are seen by other tools and by `teardown`'s label selectors,
//! so they must not change.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::run::RunId;

/// The label naming the role of a job or pod.
pub static TYPE_LABEL: &str = "type";

/// The label holding the run ID, attached to both jobs and pods of a run.
pub static SIMULATION_ID_LABEL: &str = "simulation_id";

/// The two kinds of job in a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, derive_more::Display,
)]
pub enum Role {
    /// Runs the Gatling injectors against the target.
    #[display("load generator")]
    LoadGenerator,
    /// Waits for the injectors and aggregates their results.
    #[display("watcher")]
    Watcher,
}

impl Role {
    /// Value of the `type` label on the job, also used as its name prefix.
    pub fn job_type(self) -> &'static str {
        match self {
            Role::LoadGenerator => "batch-job",
            Role::Watcher => "batch-watcher",
        }
    }

    /// Value of the `type` label on the pods created by the job.
    pub fn pod_type(self) -> &'static str {
        match self {
            Role::LoadGenerator => "batch-job-pod",
            Role::Watcher => "batch-watcher-pod",
        }
    }

    pub fn from_job_type(value: &str) -> Option<Role> {
        [Role::LoadGenerator, Role::Watcher]
            .into_iter()
            .find(|role| role.job_type() == value)
    }

    pub fn job_labels(self, run_id: &RunId) -> BTreeMap<String, String> {
        labels(self.job_type(), run_id)
    }

    pub fn pod_labels(self, run_id: &RunId) -> BTreeMap<String, String> {
        labels(self.pod_type(), run_id)
    }

    /// Selector matching every pod of this role, from any run.
    pub fn pod_selector(self) -> String {
        label_selector(TYPE_LABEL, self.pod_type())
    }
}

fn labels(type_value: &str, run_id: &RunId) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TYPE_LABEL.to_owned(), type_value.to_owned()),
        (SIMULATION_ID_LABEL.to_owned(), run_id.to_string()),
    ])
}

/// Format an equality-based label selector.
pub fn label_selector(key: &str, value: &str) -> String {
    format!("{key}={value}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn pod_selectors() {
        assert_eq!(Role::Watcher.pod_selector(), "type=batch-watcher-pod");
        assert_eq!(Role::LoadGenerator.pod_selector(), "type=batch-job-pod");
    }

    #[test]
    fn job_labels_carry_run_id() {
        let run_id = RunId::from_str("ab12z").unwrap();
        let labels = Role::Watcher.job_labels(&run_id);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["type"], "batch-watcher");
        assert_eq!(labels["simulation_id"], "ab12z");
        assert_eq!(
            Role::LoadGenerator.pod_labels(&run_id)["type"],
            "batch-job-pod"
        );
    }

    #[test]
    fn role_from_job_type() {
        assert_eq!(Role::from_job_type("batch-job"), Some(Role::LoadGenerator));
        assert_eq!(Role::from_job_type("batch-watcher"), Some(Role::Watcher));
        assert_eq!(Role::from_job_type("batch-job-pod"), None);
    }
}
