// Copyright 2025 Martin Pool

//! Launch, inspect, and tear down runs.
//!
//! Every operation stops at the first failed cluster call and returns that
//! error. Nothing is retried and nothing already submitted is rolled back.

use k8s_openapi::api::batch::v1::JobStatus as K8sJobStatus;
use tracing::{debug, info};

use crate::cluster::Cluster;
use crate::config::Config;
use crate::descriptor::{self, RunJobs};
use crate::error::Result;
use crate::job::{JobName, JobSummary};
use crate::labels::{Role, SIMULATION_ID_LABEL};
use crate::namespace::Namespace;
use crate::run::{RunConfiguration, RunId, RunIdGenerator};

/// Drives runs on one cluster.
///
/// The image configuration is only needed by `launch`, which takes it as an
/// argument.
#[derive(Debug)]
pub struct Orchestrator<C, G> {
    cluster: C,
    run_ids: G,
}

impl<C: Cluster, G: RunIdGenerator> Orchestrator<C, G> {
    pub fn new(cluster: C, run_ids: G) -> Self {
        Orchestrator { cluster, run_ids }
    }

    /// Start a new run using the images in `config`, and return its ID.
    ///
    /// The load generator is submitted before the watcher. If the watcher
    /// can't be submitted, the load generator is left running.
    pub async fn launch(
        &mut self,
        run: &RunConfiguration,
        config: &Config,
        namespace: Namespace,
    ) -> Result<RunId> {
        let run_id = self.run_ids.generate();
        info!(%run_id, %namespace, "Launching run");
        debug!(?run);
        let RunJobs {
            load_generator,
            watcher,
        } = descriptor::build(run, &run_id, namespace, config);

        let name = self.cluster.create_job(namespace, &load_generator).await?;
        info!("Created job {name}");
        let name = self.cluster.create_job(namespace, &watcher).await?;
        info!("Created job {name}");
        Ok(run_id)
    }

    /// Fetch the Kubernetes status of the run's load-generator job.
    pub async fn status(&self, run_id: &RunId, namespace: Namespace) -> Result<K8sJobStatus> {
        let job_name = JobName::new(Role::LoadGenerator, run_id);
        self.cluster
            .get_job(namespace, &job_name.to_string())
            .await
    }

    /// List the jobs of all runs in the namespace, oldest first.
    pub async fn list(&self, namespace: Namespace) -> Result<Vec<JobSummary>> {
        let mut jobs = self
            .cluster
            .list_jobs(namespace, Some(SIMULATION_ID_LABEL))
            .await?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(jobs)
    }

    /// Delete every job in the namespace, then the watcher pods, then the
    /// load-generator pods.
    ///
    /// This stops at the first failed deletion.
    pub async fn teardown(&self, namespace: Namespace) -> Result<()> {
        info!(%namespace, "Tearing down all runs");
        let jobs = self.cluster.list_jobs(namespace, None).await?;
        info!("Found {} jobs to delete", jobs.len());
        for job in &jobs {
            self.cluster.delete_job(namespace, &job.name).await?;
        }
        for role in [Role::Watcher, Role::LoadGenerator] {
            self.delete_pods(namespace, role).await?;
        }
        Ok(())
    }

    async fn delete_pods(&self, namespace: Namespace, role: Role) -> Result<()> {
        let pods = self
            .cluster
            .list_pods(namespace, &role.pod_selector())
            .await?;
        info!("Found {} {role} pods to delete", pods.len());
        for pod in &pods {
            self.cluster.delete_pod(namespace, &pod.name).await?;
        }
        Ok(())
    }
}
