//! Post-hoc analysis of persisted runs.
//!
//! Observables replay the snapshot stream of a run and reduce it to summary
//! reports, which are written to a results file next to the run data.

use crate::geometry::{Point, distance};
use crate::record::{RoundSnapshot, read_snapshot_file};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, snapshot: &RoundSnapshot) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

/// How the flock shrinks over the run.
pub struct FlockSurvival {
    alive_frac: Accumulator,
    flock_size: usize,
    last_alive: usize,
    n_rounds: usize,
}

#[derive(Serialize)]
struct FlockSurvivalSummary {
    flock_size: usize,
    n_rounds: usize,
    final_alive: usize,
    alive_frac: AccumulatorReport,
}

impl FlockSurvival {
    pub fn new() -> Self {
        Self {
            alive_frac: Accumulator::new(),
            flock_size: 0,
            last_alive: 0,
            n_rounds: 0,
        }
    }
}

impl Obs for FlockSurvival {
    fn name(&self) -> &'static str {
        "flock_survival"
    }

    fn update(&mut self, snapshot: &RoundSnapshot) -> Result<()> {
        self.flock_size = snapshot.sheep_pos.len();
        let alive = snapshot.sheep_pos.iter().filter(|pos| pos.is_some()).count();
        if self.flock_size > 0 {
            self.alive_frac.add(alive as f64 / self.flock_size as f64);
        }
        self.last_alive = alive;
        self.n_rounds += 1;
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        serde_value::to_value(FlockSurvivalSummary {
            flock_size: self.flock_size,
            n_rounds: self.n_rounds,
            final_alive: self.last_alive,
            alive_frac: self.alive_frac.report(),
        })
        .context("failed to build flock survival report")
    }
}

/// How many sheep the wolf caught, per round and in total.
pub struct CaptureTally {
    n_rounds: usize,
    n_captures: usize,
    prev_alive: Option<usize>,
}

#[derive(Serialize)]
struct CaptureTallySummary {
    n_rounds: usize,
    n_captures: usize,
    captures_per_round: f64,
}

impl CaptureTally {
    pub fn new() -> Self {
        Self {
            n_rounds: 0,
            n_captures: 0,
            prev_alive: None,
        }
    }
}

impl Obs for CaptureTally {
    fn name(&self) -> &'static str {
        "capture_tally"
    }

    fn update(&mut self, snapshot: &RoundSnapshot) -> Result<()> {
        let alive = snapshot.sheep_pos.iter().filter(|pos| pos.is_some()).count();
        // Before the first round the whole flock is alive.
        let prev = self.prev_alive.unwrap_or(snapshot.sheep_pos.len());
        self.n_captures += prev.saturating_sub(alive);
        self.prev_alive = Some(alive);
        self.n_rounds += 1;
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        serde_value::to_value(CaptureTallySummary {
            n_rounds: self.n_rounds,
            n_captures: self.n_captures,
            captures_per_round: if self.n_rounds > 0 {
                self.n_captures as f64 / self.n_rounds as f64
            } else {
                f64::NAN
            },
        })
        .context("failed to build capture tally report")
    }
}

/// Ground the wolf covered between consecutive snapshots.
pub struct WolfTravel {
    step: Accumulator,
    total: f64,
    prev: Point,
}

#[derive(Serialize)]
struct WolfTravelSummary {
    total: f64,
    step: AccumulatorReport,
}

impl WolfTravel {
    pub fn new() -> Self {
        Self {
            step: Accumulator::new(),
            total: 0.0,
            // The wolf starts every run at the origin.
            prev: Point::ORIGIN,
        }
    }
}

impl Obs for WolfTravel {
    fn name(&self) -> &'static str {
        "wolf_travel"
    }

    fn update(&mut self, snapshot: &RoundSnapshot) -> Result<()> {
        let step = distance(self.prev, snapshot.wolf_pos);
        self.step.add(step);
        self.total += step;
        self.prev = snapshot.wolf_pos;
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        serde_value::to_value(WolfTravelSummary {
            total: self.total,
            step: self.step.report(),
        })
        .context("failed to build wolf travel report")
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FlockSurvival::new()),
            Box::new(CaptureTally::new()),
            Box::new(WolfTravel::new()),
        ];
        Self { obs_ptr_vec }
    }

    /// Replay a run's snapshot file through every observable.
    pub fn add_run<P: AsRef<Path>>(&mut self, snapshot_file: P) -> Result<()> {
        let snapshots =
            read_snapshot_file(snapshot_file).context("failed to read snapshot file")?;
        for snapshot in &snapshots {
            for obs in &mut self.obs_ptr_vec {
                obs.update(snapshot).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    /// Write every observable's report to a MessagePack results file.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let mut reports = BTreeMap::new();
        for obs in &self.obs_ptr_vec {
            reports.insert(obs.name(), obs.report()?);
        }

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
