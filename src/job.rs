// Copyright 2025 Martin Pool

//! Job names and summaries of jobs and pods listed from the cluster.

use std::str::FromStr;

use jiff::Timestamp;
use k8s_openapi::api::batch::v1::{Job as K8sJob, JobStatus as K8sJobStatus};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::labels::{Role, SIMULATION_ID_LABEL, TYPE_LABEL};
use crate::run::RunId;

/// Name assigned by us to a job, including the run id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct JobName {
    pub role: Role,
    pub run_id: RunId,
}

impl JobName {
    pub fn new(role: Role, run_id: &RunId) -> Self {
        JobName {
            role,
            run_id: run_id.clone(),
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.role.job_type(), self.run_id)
    }
}

impl FromStr for JobName {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        for role in [Role::LoadGenerator, Role::Watcher] {
            if let Some(rest) = s
                .strip_prefix(role.job_type())
                .and_then(|r| r.strip_prefix('-'))
            {
                let run_id = RunId::from_str(rest).map_err(|_| "Invalid run ID")?;
                return Ok(JobName { role, run_id });
            }
        }
        Err("Job name doesn't look like batch-job-{run_id} or batch-watcher-{run_id}")
    }
}

/// Coarse lifecycle state of a job, derived from its Kubernetes status.
#[derive(Debug, Copy, derive_more::Display, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobPhase {
    pub fn from_status(status: Option<&K8sJobStatus>) -> JobPhase {
        let Some(status) = status else {
            return JobPhase::Unknown;
        };
        let condition_true = |type_: &str| {
            status
                .conditions
                .iter()
                .flatten()
                .any(|c| c.type_ == type_ && c.status == "True")
        };
        if condition_true("Failed") {
            JobPhase::Failed
        } else if condition_true("Complete") {
            JobPhase::Succeeded
        } else if status.active.unwrap_or(0) > 0 {
            JobPhase::Running
        } else {
            JobPhase::Pending
        }
    }

    pub fn is_dead(&self) -> bool {
        match self {
            JobPhase::Succeeded | JobPhase::Failed => true,
            JobPhase::Pending | JobPhase::Running | JobPhase::Unknown => false,
        }
    }
}

/// Description of a job listed from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Raw job name as returned by the cluster.
    pub name: String,
    /// Run this job belongs to, from its `simulation_id` label or else its name.
    pub run_id: Option<RunId>,
    /// Role of the job, from its `type` label or else its name.
    pub role: Option<Role>,
    pub created_at: Option<Timestamp>,
    pub phase: JobPhase,
}

impl JobSummary {
    /// If the job is still running or pending, return the time since it was created.
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        if !self.phase.is_dead() {
            self.created_at
                .and_then(|t| (Timestamp::now() - t).try_into().ok())
        } else {
            None
        }
    }
}

impl TryFrom<K8sJob> for JobSummary {
    type Error = Error;

    fn try_from(value: K8sJob) -> Result<Self> {
        let name = value
            .metadata
            .name
            .ok_or(Error::Format("no name in k8s Job"))?;
        let labels = value.metadata.labels.unwrap_or_default();
        let parsed_name = JobName::from_str(&name).ok();
        let run_id = labels
            .get(SIMULATION_ID_LABEL)
            .and_then(|id| RunId::from_str(id).ok())
            .or_else(|| parsed_name.as_ref().map(|n| n.run_id.clone()));
        let role = labels
            .get(TYPE_LABEL)
            .and_then(|t| Role::from_job_type(t))
            .or(parsed_name.map(|n| n.role));
        // k8s-openapi times are chrono, not jiff.
        let created_at = value
            .metadata
            .creation_timestamp
            .and_then(|Time(t)| {
                Timestamp::new(t.timestamp(), t.timestamp_subsec_nanos() as i32).ok()
            });
        Ok(JobSummary {
            run_id,
            role,
            created_at,
            phase: JobPhase::from_status(value.status.as_ref()),
            name,
        })
    }
}

/// A pod listed from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodSummary {
    pub name: String,
}

impl TryFrom<Pod> for PodSummary {
    type Error = Error;

    fn try_from(value: Pod) -> Result<Self> {
        let name = value
            .metadata
            .name
            .ok_or(Error::Format("no name in k8s Pod"))?;
        Ok(PodSummary { name })
    }
}
