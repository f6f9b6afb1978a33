use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct Config {
    pub sheep: SheepConfig,
    pub wolf: WolfConfig,
    pub sim: SimConfig,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct SheepConfig {
    /// Half-range of the initial position square: each coordinate is drawn
    /// uniformly from [-init_pos_limit, init_pos_limit].
    pub init_pos_limit: f64,
    /// Distance a sheep moves per round.
    pub move_dist: f64,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct WolfConfig {
    /// Distance the wolf moves per round; also the catch radius.
    pub move_dist: f64,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct SimConfig {
    /// Maximum number of rounds.
    pub max_rounds: u32,
    /// Number of sheep in the flock.
    pub n_sheep: usize,
    /// Seed for the random number generator. Drawn from the OS if absent.
    pub seed: Option<u64>,
}

/// Command-line overrides applied on top of a loaded [`Config`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub max_rounds: Option<u32>,
    pub n_sheep: Option<usize>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML and contain the `[sheep]`, `[wolf]` and `[sim]`
    /// tables. Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(max_rounds) = overrides.max_rounds {
            self.sim.max_rounds = max_rounds;
        }
        if let Some(n_sheep) = overrides.n_sheep {
            self.sim.n_sheep = n_sheep;
        }
        self.validate().context("failed to validate overrides")?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.sheep.init_pos_limit, 0.0..1e9)
            .context("invalid initial position limit")?;
        check_num(self.sheep.move_dist, 0.0..1e9).context("invalid sheep move distance")?;
        check_num_pos(self.wolf.move_dist, 1e9).context("invalid wolf move distance")?;

        check_num(self.sim.max_rounds, 1..1_000_000).context("invalid maximum number of rounds")?;
        check_num(self.sim.n_sheep, 1..100_000).context("invalid number of sheep")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

// A `Range<f64>` cannot express a strictly positive lower bound.
fn check_num_pos(num: f64, max: f64) -> Result<()> {
    if !(num > 0.0 && num < max) {
        bail!("number must be positive and less than {max:?}, but is {num:?}");
    }
    Ok(())
}
