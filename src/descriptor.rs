// Copyright 2025 Martin Pool

//! Build the Kubernetes Job descriptions for one run.
//!
//! A run is two jobs sharing a run ID:
//!
//! * The load generator (`batch-job-<id>`) runs one Gatling injector per pod.
//!   Before Gatling starts, init containers create the run's results directory
//!   on the shared volume and clone the simulations repository.
//! * The watcher (`batch-watcher-<id>`) reads the injectors' results from the
//!   same directory and writes an aggregated report.
//!
//! Nothing here talks to the cluster.

use k8s_openapi::api::batch::v1::{Job as K8sJob, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::config::Config;
use crate::job::JobName;
use crate::labels::Role;
use crate::namespace::Namespace;
use crate::run::{RunConfiguration, RunId};

/// Added to the test duration to bound how long a job may stay active.
pub const ACTIVE_DEADLINE_GRACE_SECONDS: i64 = 3600;

/// Name of the persistent volume claim shared by all runs.
static SHARED_VOLUME: &str = "nfs";
static SHARED_VOLUME_MOUNT: &str = "/exports";

/// Scratch volume holding the cloned simulations repository.
static SOURCE_VOLUME: &str = "git-repo";
static SOURCE_MOUNT: &str = "/repo";

/// Secret holding credentials for the simulations repository.
static GIT_SECRET: &str = "git-secret";

static GATLING_HOME: &str = "/gatling-charts-highcharts-bundle-3.0.2";

static RESTART_NEVER: &str = "Never";

/// The pair of jobs making up one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunJobs {
    pub load_generator: K8sJob,
    pub watcher: K8sJob,
}

/// Describe both jobs of a run.
///
/// This is deterministic: the same inputs always give the same jobs.
pub fn build(
    run: &RunConfiguration,
    run_id: &RunId,
    namespace: Namespace,
    config: &Config,
) -> RunJobs {
    RunJobs {
        load_generator: load_generator_job(run, run_id, namespace, config),
        watcher: watcher_job(run, run_id, namespace, config),
    }
}

/// Path of the run's results directory, relative to the root of the shared volume.
pub fn results_subpath(run_id: &RunId) -> String {
    format!("results/{run_id}")
}

fn active_deadline_seconds(run: &RunConfiguration) -> i64 {
    run.duration + ACTIVE_DEADLINE_GRACE_SECONDS
}

fn load_generator_job(
    run: &RunConfiguration,
    run_id: &RunId,
    namespace: Namespace,
    config: &Config,
) -> K8sJob {
    let role = Role::LoadGenerator;
    let prepare_results = Container {
        name: "prepare-test".to_owned(),
        image: Some("busybox".to_owned()),
        command: Some(strings(&[
            "sh",
            "-c",
            &format!(
                "mkdir -p {SHARED_VOLUME_MOUNT}/{};",
                results_subpath(run_id)
            ),
        ])),
        volume_mounts: Some(vec![mount(SHARED_VOLUME, SHARED_VOLUME_MOUNT)]),
        ..Default::default()
    };
    let clone_source = Container {
        name: "git-clone".to_owned(),
        image: Some("alpine/git".to_owned()),
        args: Some(strings(&[
            "clone",
            "--single-branch",
            "--branch",
            &run.revision,
            &run.git_repo,
            SOURCE_MOUNT,
        ])),
        env: Some(vec![
            secret_env("GIT_USERNAME", GIT_SECRET, "username"),
            secret_env("GIT_PASSWORD", GIT_SECRET, "password"),
        ]),
        volume_mounts: Some(vec![mount(SOURCE_VOLUME, SOURCE_MOUNT)]),
        ..Default::default()
    };
    let main = Container {
        name: "main".to_owned(),
        image: Some(config.perf_image.clone()),
        env: Some(vec![
            env("SIMULATION_NAME", &run.simulation_name),
            env("DATA", &run.data),
            env("NBUSERS", &run.virtual_users.to_string()),
            env("RAMP", &run.ramp.to_string()),
            env("DURATION", &run.duration.to_string()),
            env("SIMULATION_ID", run_id.as_str()),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                sub_path: Some(results_subpath(run_id)),
                ..mount(SHARED_VOLUME, &format!("{GATLING_HOME}/results"))
            },
            VolumeMount {
                read_only: Some(true),
                ..mount(SOURCE_VOLUME, &format!("{GATLING_HOME}/user-files"))
            },
        ]),
        ..Default::default()
    };
    let pod_spec = PodSpec {
        volumes: Some(vec![
            shared_volume(),
            Volume {
                name: SOURCE_VOLUME.to_owned(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        ]),
        init_containers: Some(vec![prepare_results, clone_source]),
        containers: vec![main],
        restart_policy: Some(RESTART_NEVER.to_owned()),
        ..Default::default()
    };
    job(
        role,
        run_id,
        namespace,
        JobSettings {
            parallelism: run.injectors,
            backoff_limit: 1,
            active_deadline_seconds: active_deadline_seconds(run),
        },
        pod_spec,
    )
}

fn watcher_job(
    run: &RunConfiguration,
    run_id: &RunId,
    namespace: Namespace,
    config: &Config,
) -> K8sJob {
    let role = Role::Watcher;
    let watcher = Container {
        name: "watcher".to_owned(),
        image: Some(config.watcher_image.clone()),
        env: Some(vec![
            env("DURATION", &run.duration.to_string()),
            env("SIMULATION_ID", run_id.as_str()),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                sub_path: Some(results_subpath(run_id)),
                ..mount(SHARED_VOLUME, "/results")
            },
            mount(SHARED_VOLUME, "/aggregated-reports"),
        ]),
        ..Default::default()
    };
    let pod_spec = PodSpec {
        volumes: Some(vec![shared_volume()]),
        containers: vec![watcher],
        restart_policy: Some(RESTART_NEVER.to_owned()),
        ..Default::default()
    };
    job(
        role,
        run_id,
        namespace,
        JobSettings {
            parallelism: 1,
            backoff_limit: 0,
            active_deadline_seconds: active_deadline_seconds(run),
        },
        pod_spec,
    )
}

struct JobSettings {
    /// Used for both parallelism and completions.
    parallelism: i32,
    backoff_limit: i32,
    active_deadline_seconds: i64,
}

fn job(
    role: Role,
    run_id: &RunId,
    namespace: Namespace,
    settings: JobSettings,
    pod_spec: PodSpec,
) -> K8sJob {
    K8sJob {
        metadata: ObjectMeta {
            name: Some(JobName::new(role, run_id).to_string()),
            namespace: Some(namespace.label().to_owned()),
            labels: Some(role.job_labels(run_id)),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(settings.parallelism),
            completions: Some(settings.parallelism),
            backoff_limit: Some(settings.backoff_limit),
            active_deadline_seconds: Some(settings.active_deadline_seconds),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(role.pod_labels(run_id)),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn shared_volume() -> Volume {
    Volume {
        name: SHARED_VOLUME.to_owned(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: SHARED_VOLUME.to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_owned(),
        mount_path: path.to_owned(),
        ..Default::default()
    }
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value.to_owned()),
        ..Default::default()
    }
}

/// An environment variable read from a secret in the job's namespace.
fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_owned(),
                key: key.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn sample_run() -> RunConfiguration {
        RunConfiguration {
            git_repo: "https://github.com/sellerin/gatling-cluster.git".to_owned(),
            revision: "master".to_owned(),
            simulation_name: "c2gwebaws.C2gwebSimulation".to_owned(),
            data: "users.csv".to_owned(),
            injectors: 2,
            virtual_users: 50,
            duration: 300,
            ramp: 30,
        }
    }

    fn sample_config() -> Config {
        Config {
            perf_image: "registry/gatling:3.0.2".to_owned(),
            watcher_image: "registry/watcher:1".to_owned(),
        }
    }

    fn run_id() -> RunId {
        RunId::from_str("q7x2m").unwrap()
    }

    fn spec(job: &K8sJob) -> &JobSpec {
        job.spec.as_ref().unwrap()
    }

    fn pod_spec(job: &K8sJob) -> &PodSpec {
        spec(job).template.spec.as_ref().unwrap()
    }

    fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
        container
            .env
            .iter()
            .flatten()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn build_is_deterministic() {
        let a = build(&sample_run(), &run_id(), Namespace::Validation, &sample_config());
        let b = build(&sample_run(), &run_id(), Namespace::Validation, &sample_config());
        assert_eq!(a, b);
    }

    #[test]
    fn names_labels_and_namespace() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Production, &sample_config());
        let lg = &jobs.load_generator.metadata;
        let w = &jobs.watcher.metadata;
        assert_eq!(lg.name.as_deref(), Some("batch-job-q7x2m"));
        assert_eq!(w.name.as_deref(), Some("batch-watcher-q7x2m"));
        assert_eq!(lg.namespace.as_deref(), Some("prod"));
        assert_eq!(w.namespace.as_deref(), Some("prod"));

        let lg_labels = lg.labels.as_ref().unwrap();
        let w_labels = w.labels.as_ref().unwrap();
        assert_eq!(lg_labels["simulation_id"], w_labels["simulation_id"]);
        assert_eq!(lg_labels["type"], "batch-job");
        assert_eq!(w_labels["type"], "batch-watcher");

        let pod_labels = |job: &K8sJob| {
            spec(job)
                .template
                .metadata
                .as_ref()
                .unwrap()
                .labels
                .clone()
                .unwrap()
        };
        assert_eq!(pod_labels(&jobs.load_generator)["type"], "batch-job-pod");
        assert_eq!(pod_labels(&jobs.watcher)["type"], "batch-watcher-pod");
        assert_eq!(pod_labels(&jobs.watcher)["simulation_id"], "q7x2m");
    }

    #[test]
    fn active_deadline_adds_grace_period() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Development, &sample_config());
        assert_eq!(spec(&jobs.load_generator).active_deadline_seconds, Some(3900));
        assert_eq!(spec(&jobs.watcher).active_deadline_seconds, Some(3900));
    }

    #[test]
    fn parallelism_follows_injectors_for_load_generator_only() {
        let mut run = sample_run();
        run.injectors = 7;
        let jobs = build(&run, &run_id(), Namespace::Development, &sample_config());
        let lg = spec(&jobs.load_generator);
        assert_eq!(lg.parallelism, Some(7));
        assert_eq!(lg.completions, Some(7));
        assert_eq!(lg.backoff_limit, Some(1));
        let w = spec(&jobs.watcher);
        assert_eq!(w.parallelism, Some(1));
        assert_eq!(w.completions, Some(1));
        assert_eq!(w.backoff_limit, Some(0));
    }

    #[test]
    fn pods_never_restart() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Development, &sample_config());
        for job in [&jobs.load_generator, &jobs.watcher] {
            assert_eq!(pod_spec(job).restart_policy.as_deref(), Some("Never"));
        }
    }

    #[test]
    fn load_generator_containers() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Development, &sample_config());
        let pod = pod_spec(&jobs.load_generator);

        let init = pod.init_containers.as_ref().unwrap();
        assert_eq!(init.len(), 2);
        assert_eq!(init[0].name, "prepare-test");
        assert_eq!(
            init[0].command.as_ref().unwrap()[2],
            "mkdir -p /exports/results/q7x2m;"
        );
        assert_eq!(init[1].name, "git-clone");
        assert_eq!(
            init[1].args.as_ref().unwrap(),
            &[
                "clone",
                "--single-branch",
                "--branch",
                "master",
                "https://github.com/sellerin/gatling-cluster.git",
                "/repo"
            ]
        );

        assert_eq!(pod.containers.len(), 1);
        let main = &pod.containers[0];
        assert_eq!(main.image.as_deref(), Some("registry/gatling:3.0.2"));
        assert_eq!(env_value(main, "SIMULATION_NAME"), Some("c2gwebaws.C2gwebSimulation"));
        assert_eq!(env_value(main, "DATA"), Some("users.csv"));
        assert_eq!(env_value(main, "NBUSERS"), Some("50"));
        assert_eq!(env_value(main, "RAMP"), Some("30"));
        assert_eq!(env_value(main, "DURATION"), Some("300"));
        assert_eq!(env_value(main, "SIMULATION_ID"), Some("q7x2m"));

        let mounts = main.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].name, "nfs");
        assert_eq!(mounts[0].sub_path.as_deref(), Some("results/q7x2m"));
        assert_eq!(mounts[1].name, "git-repo");
        assert_eq!(mounts[1].read_only, Some(true));
    }

    #[test]
    fn git_credentials_come_from_secret() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Development, &sample_config());
        let clone = &pod_spec(&jobs.load_generator).init_containers.as_ref().unwrap()[1];
        for (var, key) in [("GIT_USERNAME", "username"), ("GIT_PASSWORD", "password")] {
            let env = clone.env.iter().flatten().find(|e| e.name == var).unwrap();
            assert_eq!(env.value, None);
            let secret = env
                .value_from
                .as_ref()
                .unwrap()
                .secret_key_ref
                .as_ref()
                .unwrap();
            assert_eq!(secret.name, "git-secret");
            assert_eq!(secret.key, key);
        }
    }

    #[test]
    fn watcher_container() {
        let jobs = build(&sample_run(), &run_id(), Namespace::Development, &sample_config());
        let pod = pod_spec(&jobs.watcher);
        assert_eq!(pod.init_containers, None);
        let watcher = &pod.containers[0];
        assert_eq!(watcher.image.as_deref(), Some("registry/watcher:1"));
        assert_eq!(watcher.env.as_ref().unwrap().len(), 2);
        assert_eq!(env_value(watcher, "DURATION"), Some("300"));
        assert_eq!(env_value(watcher, "SIMULATION_ID"), Some("q7x2m"));

        let mounts = watcher.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].mount_path, "/results");
        assert_eq!(mounts[0].sub_path.as_deref(), Some("results/q7x2m"));
        assert_eq!(mounts[1].mount_path, "/aggregated-reports");
        assert_eq!(mounts[1].sub_path, None);
    }

    #[test]
    fn values_are_passed_through_unvalidated() {
        let run = RunConfiguration {
            injectors: -3,
            duration: -10,
            ..Default::default()
        };
        let jobs = build(&run, &run_id(), Namespace::Development, &sample_config());
        assert_eq!(spec(&jobs.load_generator).parallelism, Some(-3));
        assert_eq!(spec(&jobs.watcher).active_deadline_seconds, Some(3590));
    }
}
