// Copyright 2025 Martin Pool

//! Run jobs on Kubernetes through the API server.

use std::{fmt::Debug, path::Path};

use async_trait::async_trait;
use k8s_openapi::api::{
    batch::v1::{Job as K8sJob, JobStatus as K8sJobStatus},
    core::v1::Pod,
};
use kube::{
    Client,
    api::{Api, DeleteParams, ListParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use tracing::{debug, error, info};

use crate::{
    cluster::Cluster,
    error::{Error, Result},
    job::{JobSummary, PodSummary},
    namespace::Namespace,
};

/// Kubernetes cluster reached through a `kube` client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using an explicit kubeconfig file, or the default configuration
    /// (`$KUBECONFIG`, `~/.kube/config`, or in-cluster service account).
    pub async fn new(kubeconfig: Option<&Path>) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                debug!(?path, "Loading kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path)?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };
        Ok(KubeCluster { client })
    }

    fn jobs_api(&self, namespace: Namespace) -> Api<K8sJob> {
        Api::namespaced(self.client.clone(), namespace.label())
    }

    fn pods_api(&self, namespace: Namespace) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace.label())
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn create_job(&self, namespace: Namespace, job: &K8sJob) -> Result<String> {
        debug!(?job, %namespace, "Creating job");
        let created = self
            .jobs_api(namespace)
            .create(&PostParams::default(), job)
            .await
            .inspect_err(|err| error!("Failed to create job: {err}"))?;
        created
            .metadata
            .name
            .ok_or(Error::Format("no name in created k8s Job"))
    }

    async fn list_jobs(
        &self,
        namespace: Namespace,
        label_selector: Option<&str>,
    ) -> Result<Vec<JobSummary>> {
        let params = ListParams {
            label_selector: label_selector.map(ToOwned::to_owned),
            ..Default::default()
        };
        debug!(?params, %namespace, "List jobs");
        let jobs = self.jobs_api(namespace).list(&params).await?;
        debug!("Listed {} jobs", jobs.items.len());
        jobs.items.into_iter().map(JobSummary::try_from).collect()
    }

    async fn delete_job(&self, namespace: Namespace, name: &str) -> Result<()> {
        debug!(%namespace, name, "Delete job");
        self.jobs_api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .inspect_err(|err| error!("Failed to delete job {name}: {err}"))?;
        info!("Deleted job {name}");
        Ok(())
    }

    async fn list_pods(
        &self,
        namespace: Namespace,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>> {
        let params = ListParams::default().labels(label_selector);
        debug!(?params, %namespace, "List pods");
        let pods = self.pods_api(namespace).list(&params).await?;
        pods.items.into_iter().map(PodSummary::try_from).collect()
    }

    async fn delete_pod(&self, namespace: Namespace, name: &str) -> Result<()> {
        debug!(%namespace, name, "Delete pod");
        self.pods_api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .inspect_err(|err| error!("Failed to delete pod {name}: {err}"))?;
        info!("Deleted pod {name}");
        Ok(())
    }

    async fn get_job(&self, namespace: Namespace, name: &str) -> Result<K8sJobStatus> {
        debug!(%namespace, name, "Get job");
        let job = self
            .jobs_api(namespace)
            .get(name)
            .await
            .map_err(|err| get_job_error(err, namespace, name))?;
        Ok(job.status.unwrap_or_default())
    }
}

/// A 404 from the API server means there's no such job; anything else is a
/// cluster error.
fn get_job_error(err: kube::Error, namespace: Namespace, name: &str) -> Error {
    match err {
        kube::Error::Api(response) if response.code == 404 => Error::JobNotFound {
            name: name.to_owned(),
            namespace,
        },
        err => err.into(),
    }
}

impl Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}
