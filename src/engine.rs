use crate::config::Config;
use crate::gate::Gate;
use crate::geometry::{Point, distance};
use crate::model::{Sheep, Wolf};
use crate::record::{CensusRecord, CensusStore, RoundSnapshot, SnapshotStore};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// State of the simulation at a given round.
pub struct State {
    /// Current round number (starts at 1, never exceeds the round limit).
    pub round: u32,
    /// Number of currently-live sheep.
    pub n_alive: usize,
    /// The flock, in creation order; an index is a sheep's identity.
    pub flock: Vec<Sheep>,
    /// The single wolf.
    pub wolf: Wolf,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every sheep has been caught.
    Extinction,
    /// The configured round limit was reached with sheep still alive.
    RoundLimit,
}

/// Result of driving the flock and wolf through one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundOutcome {
    /// No live sheep remained, nothing moved.
    AllDead,
    /// The wolf captured the sheep at this index.
    Capture(usize),
    /// The wolf pursued the sheep at this index.
    Pursuit(usize),
}

/// Simulation engine.
///
/// Holds the configuration, current state, and random number generator,
/// and provides methods to initialize and run a chase.
pub struct Engine {
    cfg: Config,
    state: State,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a randomized
    /// initial flock.
    ///
    /// Sheep coordinates are drawn uniformly from the configured square
    /// around the origin; the wolf starts at the origin. The generator is
    /// seeded from `sim.seed` when present, from the OS otherwise.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.sim.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let limit = cfg.sheep.init_pos_limit;
        let pos_dist = Uniform::new_inclusive(-limit, limit)?;

        let mut flock = Vec::with_capacity(cfg.sim.n_sheep);
        for _ in 0..cfg.sim.n_sheep {
            let pos = Point::new(pos_dist.sample(&mut rng), pos_dist.sample(&mut rng));
            flock.push(Sheep::new(pos));
        }

        let state = State {
            round: 1,
            n_alive: flock.len(),
            flock,
            wolf: Wolf::new(Point::ORIGIN),
        };

        Ok(Self { cfg, state, rng })
    }

    /// Run rounds until extinction or the round limit, emitting one census
    /// record and one positional snapshot per completed round.
    ///
    /// Both stores are flushed before the gate blocks, so every completed
    /// round is durable before the next one may start.
    pub fn run(
        &mut self,
        snapshots: &mut dyn SnapshotStore,
        census: &mut dyn CensusStore,
        gate: &mut dyn Gate,
    ) -> Result<Termination> {
        log::info!("initialized flock positions");
        for (idx, sheep) in self.state.flock.iter().enumerate() {
            let Point { x, y } = sheep.pos();
            log::debug!("sheep {idx} initial position ({x:.3}, {y:.3})");
        }

        loop {
            if self.state.n_alive == 0 {
                log::info!("all sheep have been eaten, simulation over");
                return Ok(Termination::Extinction);
            }

            match self.perform_round() {
                RoundOutcome::AllDead => {
                    log::info!("all sheep have been eaten, simulation over");
                    return Ok(Termination::Extinction);
                }
                RoundOutcome::Capture(idx) => log::info!("wolf caught sheep {idx}"),
                RoundOutcome::Pursuit(idx) => log::info!("wolf chasing sheep {idx}"),
            }

            let Point { x, y } = self.state.wolf.pos();
            log::debug!("wolf moved, position: ({x:.3}, {y:.3})");
            log::info!("number of alive sheep: {}", self.state.n_alive);

            census
                .append(&CensusRecord {
                    round: self.state.round,
                    n_alive: self.state.n_alive,
                })
                .context("failed to append census record")?;
            snapshots
                .append(&self.snapshot())
                .context("failed to append snapshot")?;
            census.flush()?;
            snapshots.flush()?;

            gate.wait(self.state.round)
                .context("failed to wait at the round gate")?;

            if self.state.round == self.cfg.sim.max_rounds {
                log::info!("maximum number of rounds reached, simulation over");
                return Ok(Termination::RoundLimit);
            }
            self.state.round += 1;
        }
    }

    /// One round: move every live sheep, select the nearest, then capture
    /// or pursue.
    fn perform_round(&mut self) -> RoundOutcome {
        let round = self.state.round;
        log::info!("starting round {round}");

        let move_dist = self.cfg.sheep.move_dist;
        for (idx, sheep) in self.state.flock.iter_mut().enumerate() {
            if !sheep.is_alive() {
                continue;
            }
            let direction = sheep.move_randomly(move_dist, &mut self.rng);
            let Point { x, y } = sheep.pos();
            log::debug!("sheep {idx} moved {direction:?} to ({x:.3}, {y:.3})");
        }

        let Some(i_closest) = closest_sheep(&self.state.wolf, &self.state.flock) else {
            return RoundOutcome::AllDead;
        };

        let target = self.state.flock[i_closest].pos();
        let dist = distance(self.state.wolf.pos(), target);
        log::debug!("sheep {i_closest} is closest to the wolf, distance: {dist:.3}");

        // `<=`: the wolf captures without consuming its whole step.
        if dist <= self.cfg.wolf.move_dist {
            self.state.flock[i_closest].kill();
            self.state.wolf.teleport(target);
            self.state.n_alive -= 1;
            RoundOutcome::Capture(i_closest)
        } else {
            self.state.wolf.move_towards(target, self.cfg.wolf.move_dist);
            RoundOutcome::Pursuit(i_closest)
        }
    }

    fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round: self.state.round,
            wolf_pos: self.state.wolf.pos(),
            sheep_pos: self
                .state
                .flock
                .iter()
                .map(|sheep| sheep.is_alive().then(|| sheep.pos()))
                .collect(),
        }
    }
}

/// Index of the live sheep closest to the wolf.
///
/// Scans the flock in order with a strict less-than comparison, so the
/// lowest index wins ties. Returns `None` only when no sheep is alive.
pub fn closest_sheep(wolf: &Wolf, flock: &[Sheep]) -> Option<usize> {
    let mut min_dist = f64::INFINITY;
    let mut closest = None;

    for (idx, sheep) in flock.iter().enumerate() {
        if !sheep.is_alive() {
            continue;
        }
        let dist = distance(wolf.pos(), sheep.pos());
        if dist < min_dist {
            min_dist = dist;
            closest = Some(idx);
        }
    }

    closest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SheepConfig, SimConfig, WolfConfig};
    use crate::gate::NoopGate;

    fn test_config(sheep_step: f64, wolf_step: f64, max_rounds: u32, n_sheep: usize) -> Config {
        Config {
            sheep: SheepConfig {
                init_pos_limit: 10.0,
                move_dist: sheep_step,
            },
            wolf: WolfConfig {
                move_dist: wolf_step,
            },
            sim: SimConfig {
                max_rounds,
                n_sheep,
                seed: Some(0),
            },
        }
    }

    fn engine_with(cfg: Config, sheep: &[Point], wolf: Point) -> Engine {
        let flock: Vec<Sheep> = sheep.iter().copied().map(Sheep::new).collect();
        let state = State {
            round: 1,
            n_alive: flock.len(),
            flock,
            wolf: Wolf::new(wolf),
        };
        let rng = ChaCha12Rng::seed_from_u64(1);
        Engine { cfg, state, rng }
    }

    #[derive(Default)]
    struct MemSnapshots(Vec<RoundSnapshot>);

    impl SnapshotStore for MemSnapshots {
        fn append(&mut self, snapshot: &RoundSnapshot) -> Result<()> {
            self.0.push(snapshot.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemCensus(Vec<CensusRecord>);

    impl CensusStore for MemCensus {
        fn append(&mut self, record: &CensusRecord) -> Result<()> {
            self.0.push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn run_to_end(engine: &mut Engine) -> (Termination, Vec<RoundSnapshot>, Vec<CensusRecord>) {
        let mut snapshots = MemSnapshots::default();
        let mut census = MemCensus::default();
        let termination = engine
            .run(&mut snapshots, &mut census, &mut NoopGate)
            .expect("run should succeed");
        (termination, snapshots.0, census.0)
    }

    #[test]
    fn selector_prefers_lowest_index_on_tie() {
        let wolf = Wolf::new(Point::ORIGIN);
        let flock = vec![
            Sheep::new(Point::new(-2.0, 0.0)),
            Sheep::new(Point::new(2.0, 0.0)),
        ];
        assert_eq!(closest_sheep(&wolf, &flock), Some(0));
    }

    #[test]
    fn selector_skips_dead_sheep() {
        let wolf = Wolf::new(Point::ORIGIN);
        let mut flock = vec![
            Sheep::new(Point::new(1.0, 0.0)),
            Sheep::new(Point::new(5.0, 0.0)),
        ];
        flock[0].kill();
        assert_eq!(closest_sheep(&wolf, &flock), Some(1));
    }

    #[test]
    fn selector_returns_none_for_extinct_flock() {
        let wolf = Wolf::new(Point::ORIGIN);
        let mut flock = vec![Sheep::new(Point::new(1.0, 0.0))];
        flock[0].kill();
        assert_eq!(closest_sheep(&wolf, &flock), None);
        assert_eq!(closest_sheep(&wolf, &[]), None);
    }

    #[test]
    fn capture_at_exactly_the_step_distance() {
        let cfg = test_config(0.0, 1.0, 50, 1);
        let mut engine = engine_with(cfg, &[Point::new(1.0, 0.0)], Point::ORIGIN);

        assert_eq!(engine.perform_round(), RoundOutcome::Capture(0));
        assert_eq!(engine.state.n_alive, 0);
        assert!(!engine.state.flock[0].is_alive());
        // The wolf lands exactly on the captured sheep.
        assert_eq!(engine.state.wolf.pos(), Point::new(1.0, 0.0));
    }

    #[test]
    fn pursuit_just_beyond_the_step_distance() {
        let cfg = test_config(0.0, 1.0, 50, 1);
        let mut engine = engine_with(cfg, &[Point::new(1.0 + 1e-9, 0.0)], Point::ORIGIN);

        assert_eq!(engine.perform_round(), RoundOutcome::Pursuit(0));
        assert_eq!(engine.state.n_alive, 1);
        assert!(engine.state.flock[0].is_alive());
    }

    #[test]
    fn pursuit_closes_the_gap_by_exactly_one_step() {
        let cfg = test_config(0.0, 1.0, 50, 1);
        let target = Point::new(5.0, 0.0);
        let mut engine = engine_with(cfg, &[target], Point::ORIGIN);

        engine.perform_round();
        let dist = distance(engine.state.wolf.pos(), target);
        assert!((dist - 4.0).abs() < 1e-12);
    }

    #[test]
    fn five_unit_gap_takes_four_pursuits_before_capture() {
        let cfg = test_config(0.0, 1.0, 50, 1);
        let mut engine = engine_with(cfg, &[Point::new(5.0, 0.0)], Point::ORIGIN);

        for _ in 0..4 {
            assert_eq!(engine.perform_round(), RoundOutcome::Pursuit(0));
        }
        assert_eq!(engine.perform_round(), RoundOutcome::Capture(0));
    }

    #[test]
    fn live_count_tracks_liveness_flags_every_round() {
        let cfg = test_config(0.5, 1.0, 50, 8);
        let mut engine =
            Engine::generate_initial_condition(cfg).expect("failed to build engine");

        for _ in 0..50 {
            let outcome = engine.perform_round();
            let n_flagged = engine
                .state
                .flock
                .iter()
                .filter(|sheep| sheep.is_alive())
                .count();
            assert_eq!(engine.state.n_alive, n_flagged);
            if outcome == RoundOutcome::AllDead {
                break;
            }
        }
    }

    #[test]
    fn captured_sheep_is_absent_from_the_round_snapshot() {
        let cfg = test_config(0.0, 1.0, 50, 2);
        let sheep = [Point::new(0.5, 0.0), Point::new(8.0, 8.0)];
        let mut engine = engine_with(cfg, &sheep, Point::ORIGIN);

        assert_eq!(engine.perform_round(), RoundOutcome::Capture(0));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.sheep_pos[0], None);
        assert_eq!(snapshot.sheep_pos[1], Some(Point::new(8.0, 8.0)));
        assert_eq!(snapshot.wolf_pos, Point::new(0.5, 0.0));
    }

    #[test]
    fn run_stops_at_the_round_limit() {
        let cfg = test_config(0.0, 1.0, 5, 1);
        let mut engine = engine_with(cfg, &[Point::new(1000.0, 0.0)], Point::ORIGIN);

        let (termination, snapshots, census) = run_to_end(&mut engine);
        assert_eq!(termination, Termination::RoundLimit);
        assert_eq!(census.len(), 5);
        assert_eq!(
            census.iter().map(|rec| rec.round).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(snapshots.last().map(|snap| snap.round), Some(5));
        // The counter itself never exceeds the limit.
        assert_eq!(engine.state.round, 5);
    }

    #[test]
    fn run_stops_early_on_extinction() {
        let cfg = test_config(0.0, 2.0, 50, 2);
        let sheep = [Point::new(1.0, 0.0), Point::new(3.0, 0.0)];
        let mut engine = engine_with(cfg, &sheep, Point::ORIGIN);

        let (termination, _, census) = run_to_end(&mut engine);
        assert_eq!(termination, Termination::Extinction);
        assert!(census.len() < 50);
        assert_eq!(census.last().map(|rec| rec.n_alive), Some(0));
        // At most one capture per round.
        for pair in census.windows(2) {
            assert!(pair[0].n_alive - pair[1].n_alive <= 1);
        }
    }

    #[test]
    fn zero_sheep_step_freezes_the_flock() {
        let cfg = test_config(0.0, 0.5, 6, 3);
        let sheep = [
            Point::new(50.0, 0.0),
            Point::new(0.0, 60.0),
            Point::new(-70.0, 0.0),
        ];
        let mut engine = engine_with(cfg, &sheep, Point::ORIGIN);

        let (_, snapshots, _) = run_to_end(&mut engine);
        for snapshot in &snapshots {
            for (pos, start) in snapshot.sheep_pos.iter().zip(sheep) {
                assert_eq!(*pos, Some(start));
            }
        }
    }

    #[test]
    fn seeded_runs_reproduce_identical_records() {
        let cfg = test_config(0.5, 1.0, 30, 6);

        let mut first = Engine::generate_initial_condition(cfg.clone())
            .expect("failed to build engine");
        let mut second =
            Engine::generate_initial_condition(cfg).expect("failed to build engine");

        let (term_a, snaps_a, census_a) = run_to_end(&mut first);
        let (term_b, snaps_b, census_b) = run_to_end(&mut second);

        assert_eq!(term_a, term_b);
        assert_eq!(snaps_a, snaps_b);
        assert_eq!(census_a, census_b);
    }

    #[test]
    fn initial_flock_fits_the_configured_square() {
        let mut cfg = test_config(0.5, 1.0, 50, 64);
        cfg.sheep.init_pos_limit = 2.5;
        let engine = Engine::generate_initial_condition(cfg).expect("failed to build engine");

        assert_eq!(engine.state.n_alive, 64);
        assert_eq!(engine.state.wolf.pos(), Point::ORIGIN);
        for sheep in &engine.state.flock {
            let Point { x, y } = sheep.pos();
            assert!(x.abs() <= 2.5 && y.abs() <= 2.5);
        }
    }
}
