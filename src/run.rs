// Copyright 2025 Martin Pool

//! A "run" is one load test: a load-generator job and a watcher job that
//! share a run ID.

use std::{path::Path, str::FromStr};

use jiff::Timestamp;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Characters used in run IDs.
static RUN_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Number of characters in a generated run ID.
pub const RUN_ID_LEN: usize = 5;

/// Parameters of one load test, supplied by the caller.
///
/// None of these are validated here: they're passed through to the job
/// descriptions as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Git repository holding the Gatling simulations.
    pub git_repo: String,
    /// Branch or tag to check out.
    pub revision: String,
    /// Fully qualified name of the simulation class.
    pub simulation_name: String,
    /// Free-form data passed to the simulation.
    pub data: String,
    /// Number of injector pods.
    #[serde(rename = "nb_injectors")]
    pub injectors: i32,
    /// Number of virtual users per injector.
    #[serde(rename = "nb_vu")]
    pub virtual_users: i32,
    /// Test duration in seconds.
    pub duration: i64,
    /// Ramp-up period in seconds.
    pub ramp: i64,
}

impl RunConfiguration {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(?path, "Loading run configuration");
        let json = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!(
                "Failed to read run configuration {}: {err}",
                path.display()
            ))
        })?;
        serde_json::from_str(&json).map_err(|err| {
            Error::Config(format!(
                "Failed to parse run configuration {}: {err}",
                path.display()
            ))
        })
    }
}

/// Short token correlating all the resources of one run.
///
/// This is meant to be easy for people to read and type, not globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct RunId(String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            Err(Error::InvalidRunId("Run ID cannot be empty".to_string()))
        } else if !s.bytes().all(|c| RUN_ID_ALPHABET.contains(&c)) {
            Err(Error::InvalidRunId(format!("{s:?} must contain only a-z and 0-9")))
        } else {
            Ok(RunId(s.to_string()))
        }
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of new run IDs.
pub trait RunIdGenerator {
    fn generate(&mut self) -> RunId;
}

/// Draws run IDs from a pseudo-random generator.
///
/// Each character is drawn independently and uniformly from `[a-z0-9]`.
/// There's no collision detection.
#[derive(Debug, Clone)]
pub struct SeededRunIdGenerator {
    rng: SmallRng,
}

impl SeededRunIdGenerator {
    /// Seed from the wall clock, so that successive processes don't repeat IDs.
    pub fn from_clock() -> Self {
        let now = Timestamp::now();
        // Nanoseconds fit in the low 30 bits.
        let seed = ((now.as_second() as u64) << 30) ^ (now.subsec_nanosecond() as u64);
        debug!(seed, "Seeding run ID generator");
        Self::with_seed(seed)
    }

    /// A generator that always produces the same sequence for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        SeededRunIdGenerator {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl RunIdGenerator for SeededRunIdGenerator {
    fn generate(&mut self) -> RunId {
        let id = (0..RUN_ID_LEN)
            .map(|_| RUN_ID_ALPHABET[self.rng.gen_range(0..RUN_ID_ALPHABET.len())] as char)
            .collect();
        RunId(id)
    }
}
