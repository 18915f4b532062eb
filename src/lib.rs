// Copyright 2025 Martin Pool

//! Run distributed Gatling load tests as Kubernetes jobs.
//!
//! # Concepts
//!
//! One "run" is a single load test. It's made of two jobs that share a short
//! run ID: a load generator (`batch-job-<id>`) with one pod per injector, and a
//! watcher (`batch-watcher-<id>`) that aggregates the injectors' results from a
//! shared volume.
//!
//! Runs are found again through their labels: `type` names the role and
//! `simulation_id` holds the run ID.

pub mod age;
pub mod cluster;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod job;
pub mod labels;
pub mod namespace;
pub mod orchestrator;
pub mod run;

pub use crate::error::{Error, Result};
