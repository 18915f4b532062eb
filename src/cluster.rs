// Copyright 2025 Martin Pool

//! Cluster abstraction: the few Kubernetes calls that launching, inspecting,
//! and tearing down a run need.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job as K8sJob, JobStatus as K8sJobStatus};
use tracing::error;

use crate::Result;
use crate::job::{JobSummary, PodSummary};
use crate::namespace::Namespace;

pub mod k8s;

pub use k8s::KubeCluster;

/// Operations on jobs and pods, each scoped to one namespace.
///
/// Calls are awaited one at a time; implementations apply whatever timeouts
/// their transport has.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Submit a job, returning the name the cluster gave it.
    async fn create_job(&self, namespace: Namespace, job: &K8sJob) -> Result<String>;

    /// List jobs, optionally restricted by a label selector.
    async fn list_jobs(
        &self,
        namespace: Namespace,
        label_selector: Option<&str>,
    ) -> Result<Vec<JobSummary>>;

    async fn delete_job(&self, namespace: Namespace, name: &str) -> Result<()>;

    async fn list_pods(&self, namespace: Namespace, label_selector: &str)
    -> Result<Vec<PodSummary>>;

    async fn delete_pod(&self, namespace: Namespace, name: &str) -> Result<()>;

    /// Fetch the status of one job.
    ///
    /// Returns [crate::Error::JobNotFound] if there's no such job.
    async fn get_job(&self, namespace: Namespace, name: &str) -> Result<K8sJobStatus>;
}

/// Connect to the cluster, using the given kubeconfig or the ambient default.
pub async fn open_cluster(kubeconfig: Option<&Path>) -> Result<KubeCluster> {
    KubeCluster::new(kubeconfig)
        .await
        .inspect_err(|err| error!("Failed to connect to cluster: {err}"))
}
