//! Entities of the chase.

use crate::geometry::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cardinal direction of a random sheep move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// Sheep of the flock.
///
/// Each sheep has a position and a liveness flag. The flag flips to false at
/// most once, when the wolf captures it; dead sheep stay in the flock as
/// inert records so indices remain stable.
#[derive(Debug, Clone)]
pub struct Sheep {
    pos: Point,
    alive: bool,
}

impl Sheep {
    pub fn new(pos: Point) -> Self {
        Self { pos, alive: true }
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Translate the sheep by `step` along a cardinal direction drawn
    /// uniformly at random.
    ///
    /// The direction is drawn and returned even when `step` is zero.
    pub fn move_randomly<R: Rng>(&mut self, step: f64, rng: &mut R) -> Direction {
        let direction = match rng.random_range(0..4u8) {
            0 => Direction::North,
            1 => Direction::South,
            2 => Direction::East,
            _ => Direction::West,
        };
        match direction {
            Direction::North => self.pos.y += step,
            Direction::South => self.pos.y -= step,
            Direction::East => self.pos.x += step,
            Direction::West => self.pos.x -= step,
        }
        direction
    }

    /// Mark the sheep as captured. Irreversible.
    pub fn kill(&mut self) {
        self.alive = false;
    }
}

/// The single wolf.
#[derive(Debug, Clone)]
pub struct Wolf {
    pos: Point,
}

impl Wolf {
    pub fn new(pos: Point) -> Self {
        Self { pos }
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    /// Advance the wolf by `step` along the bearing toward `target`.
    ///
    /// The bearing is the two-argument arctangent of the displacement, so
    /// all four quadrants and the on-axis cases are handled. When the wolf
    /// sits exactly on `target` the displacement is the zero vector and
    /// `f64::atan2(0.0, 0.0)` is `0.0`, so the step goes along +x.
    pub fn move_towards(&mut self, target: Point, step: f64) {
        let angle = (target.y - self.pos.y).atan2(target.x - self.pos.x);
        self.pos.x += step * angle.cos();
        self.pos.y += step * angle.sin();
    }

    /// Place the wolf exactly on `pos` (capture teleport).
    pub fn teleport(&mut self, pos: Point) {
        self.pos = pos;
    }
}
