use crate::analysis::Analyzer;
use crate::config::{Config, Overrides};
use crate::engine::Engine;
use crate::gate::{Gate, NoopGate, StdinGate};
use crate::record::{MsgpackCensusStore, MsgpackSnapshotStore};
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Owner of a simulation directory.
///
/// The directory holds `config.toml` and one numbered `run-NNNN` directory
/// per completed run, each with its census, snapshot and results files.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn run_simulation(&self, overrides: Overrides, wait: bool) -> Result<()> {
        let cfg = self.cfg.clone().with_overrides(overrides)?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::generate_initial_condition(cfg)
            .context("failed to generate initial condition")?;

        let mut census = MsgpackCensusStore::create(self.census_file(run_idx))?;
        let mut snapshots = MsgpackSnapshotStore::create(self.snapshot_file(run_idx))?;
        let mut gate: Box<dyn Gate> = if wait {
            Box::new(StdinGate)
        } else {
            Box::new(NoopGate)
        };

        let termination = engine
            .run(&mut snapshots, &mut census, gate.as_mut())
            .context("failed to run simulation")?;
        log::info!("run {run_idx} finished: {termination:?}");

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            analyzer
                .add_run(self.snapshot_file(run_idx))
                .context("failed to add run")?;

            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
            log::info!("analyzed run {run_idx}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for entry in glob(pattern).context("failed to glob run dirs")? {
            let path = entry.context("failed to read glob entry")?;
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to remove {path:?}"))?;
                log::info!("removed {path:?}");
            }
        }
        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|path| path.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn census_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("census.msgpack")
    }

    fn snapshot_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("snapshots.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}
