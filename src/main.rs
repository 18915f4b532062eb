// Copyright 2025 Martin Pool

//! Command-line front end: launch, inspect, and tear down load-test runs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use gcluster::cluster::{KubeCluster, open_cluster};
use gcluster::config::Config;
use gcluster::job::JobPhase;
use gcluster::namespace::Namespace;
use gcluster::orchestrator::Orchestrator;
use gcluster::run::{RunConfiguration, RunId, SeededRunIdGenerator};
use gcluster::{Result, age};
use schemars::schema_for;
use tempfile::TempDir;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::{Layer, filter::filter_fn, fmt, layer::SubscriberExt};

static TOOL_NAME: &str = "gcluster";

#[derive(Parser)]
#[command(name = "gcluster")]
#[command(about = "Run distributed Gatling load tests as Kubernetes jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Namespace to operate in.
    #[arg(long, short = 'n', global = true, value_enum, default_value_t = Namespace::Development)]
    namespace: Namespace,

    /// Path to the image configuration file, read by `launch`.
    ///
    /// If not provided, `conf.json` in the working directory is used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a kubeconfig file.
    ///
    /// If not provided, the default kube configuration is used.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Show debug logs on stderr.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a new load test
    Launch(LaunchArgs),

    /// Show the status of a run's load-generator job
    Status {
        /// Run ID printed by `launch`
        #[arg(long, short = 'i')]
        run_id: RunId,

        /// Print the raw Kubernetes job status as JSON.
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// List the jobs of all runs
    #[command(visible_alias = "ls")]
    List {
        /// Output in JSON format.
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Delete all jobs and load-test pods in the namespace
    Teardown {},

    /// Print the JSON schema for the configuration file.
    ConfigSchema {},
}

#[derive(Args)]
struct LaunchArgs {
    /// Read the run configuration from a JSON file instead of flags.
    #[arg(long, short = 'f', conflicts_with_all = ["git_repo", "simulation"])]
    file: Option<PathBuf>,

    /// Git repository holding the simulations
    #[arg(long, required_unless_present = "file")]
    git_repo: Option<String>,

    /// Branch or tag to check out
    #[arg(long, default_value = "master")]
    revision: String,

    /// Simulation class to run
    #[arg(long, required_unless_present = "file")]
    simulation: Option<String>,

    /// Free-form data passed to the simulation
    #[arg(long, default_value = "")]
    data: String,

    /// Number of injector pods
    #[arg(long, default_value = "1")]
    injectors: i32,

    /// Virtual users per injector
    #[arg(long, default_value = "1")]
    users: i32,

    /// Test duration in seconds
    #[arg(long, default_value = "60")]
    duration: i64,

    /// Ramp-up period in seconds
    #[arg(long, default_value = "0")]
    ramp: i64,
}

impl LaunchArgs {
    fn run_configuration(&self) -> Result<RunConfiguration> {
        if let Some(path) = &self.file {
            return RunConfiguration::from_file(path);
        }
        Ok(RunConfiguration {
            git_repo: self.git_repo.clone().unwrap_or_default(),
            revision: self.revision.clone(),
            simulation_name: self.simulation.clone().unwrap_or_default(),
            data: self.data.clone(),
            injectors: self.injectors,
            virtual_users: self.users,
            duration: self.duration,
            ramp: self.ramp,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match inner_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn inner_main() -> Result<()> {
    let cli = Cli::parse();
    let tempdir = TempDir::with_prefix(format!("{TOOL_NAME}-"))?.keep();
    setup_tracing(&tempdir, cli.debug)?;

    let namespace = cli.namespace;

    match &cli.command {
        Commands::Launch(args) => {
            let run = args.run_configuration()?;
            let config = Config::new(&cli.config)?;
            debug!(?config);
            let mut orchestrator = connect(&cli).await?;
            let run_id = orchestrator
                .launch(&run, &config, namespace)
                .await
                .inspect_err(|err| error!("Failed to launch run: {err}"))?;
            info!("Gatling test started. Id: {run_id}");
            println!("{run_id}");
        }

        Commands::Status { run_id, json } => {
            let orchestrator = connect(&cli).await?;
            let status = orchestrator.status(run_id, namespace).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!(
                    "Run {run_id} status {phase} (active {active}, succeeded {succeeded}, failed {failed})",
                    phase = JobPhase::from_status(Some(&status)),
                    active = status.active.unwrap_or(0),
                    succeeded = status.succeeded.unwrap_or(0),
                    failed = status.failed.unwrap_or(0),
                );
            }
        }

        Commands::List { json } => {
            let orchestrator = connect(&cli).await?;
            let jobs = orchestrator.list(namespace).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                for job in jobs {
                    match (&job.run_id, job.role) {
                        (Some(run_id), Some(role)) => {
                            print!("Run {run_id} {role} status {}", job.phase)
                        }
                        _ => print!("Unrecognized job {} status {}", job.name, job.phase),
                    }
                    if let Some(elapsed) = job.elapsed() {
                        print!(" age {}", age::format(elapsed));
                    }
                    println!();
                }
            }
        }

        Commands::Teardown {} => {
            let orchestrator = connect(&cli).await?;
            orchestrator
                .teardown(namespace)
                .await
                .inspect_err(|err| error!("Teardown stopped: {err}"))?;
            info!("Teardown of namespace {namespace} complete");
        }

        Commands::ConfigSchema {} => {
            println!("{}", serde_json::to_string_pretty(&schema_for!(Config))?);
        }
    };
    Ok(())
}

async fn connect(cli: &Cli) -> Result<Orchestrator<KubeCluster, SeededRunIdGenerator>> {
    let cluster = open_cluster(cli.kubeconfig.as_deref()).await?;
    Ok(Orchestrator::new(cluster, SeededRunIdGenerator::from_clock()))
}

fn setup_tracing(temp_path: &Path, debug: bool) -> Result<()> {
    let log_path = temp_path.join(format!("{TOOL_NAME}-debug.log"));
    let log_file = File::create(&log_path)?;
    let file_layer = fmt::Layer::new()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_writer(log_file)
        .with_filter(filter_fn(|metadata| {
            // kube and hyper are noisy at debug level.
            metadata.target().starts_with(TOOL_NAME)
        }))
        .with_filter(LevelFilter::DEBUG);
    let stderr_layer = fmt::Layer::new()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|metadata| {
            metadata.target().starts_with(TOOL_NAME)
        }))
        .with_filter(if debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        });
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer),
    )
    .expect("Failed to install tracing subscriber");
    debug!("Tracing initialized to file {}", log_path.display());
    Ok(())
}
