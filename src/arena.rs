//! Toroidal rink, registered skaters and the round loop.

use crate::agent::{Agent, Behavior, Turn};
use crate::catalog::CanonicalAction;
use crate::error::SimError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point on the rink, normalized into `[0, width) x [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in the unwrapped plane.
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Wrap a coordinate into `[0, bound)`.
///
/// For displacements smaller than `bound` this is the single correction
/// `v - bound` / `v + bound`. Rounding can make `v + bound` land exactly on
/// `bound` for tiny negative `v`; that case maps to `0.0`.
pub fn wrap(v: f64, bound: f64) -> f64 {
    let w = v.rem_euclid(bound);
    if w >= bound { 0.0 } else { w }
}

/// Rectangular surface with opposite edges glued together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    width: f64,
    height: f64,
    collision_radius: f64,
}

impl Torus {
    pub fn new(width: f64, height: f64, collision_radius: f64) -> Result<Self, SimError> {
        for (name, val) in [
            ("width", width),
            ("height", height),
            ("collision radius", collision_radius),
        ] {
            if !val.is_finite() || val <= 0.0 {
                return Err(SimError::configuration(format!(
                    "{name} must be finite and positive, but is {val}"
                )));
            }
        }
        Ok(Self {
            width,
            height,
            collision_radius,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn collision_radius(&self) -> f64 {
        self.collision_radius
    }

    /// Move `distance` from `pos` along `angle` (degrees), wrapping at the edges.
    pub fn advance(&self, pos: Position, angle: u32, distance: f64) -> Position {
        let rad = f64::from(angle).to_radians();
        let x = wrap(pos.x + rad.cos() * distance, self.width);
        let y = wrap(pos.y + rad.sin() * distance, self.height);
        Position::new(x, y)
    }

    /// Whether `pos` is closer than the collision radius to any of `others`.
    ///
    /// Distances are measured in the unwrapped plane, so two skaters facing each
    /// other across a seam are not detected.
    pub fn collides(&self, pos: Position, others: &[Position]) -> bool {
        others
            .iter()
            .any(|other| pos.distance(other) < self.collision_radius)
    }
}

/// Population-mean payoff of one angle after a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub round: usize,
    pub mean_payoff: f64,
}

/// Cumulated payoffs of one skater right after its turn.
///
/// Payoffs are ordered by ascending angle.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffRow {
    pub round: usize,
    pub agent: usize,
    pub cum_payoffs: Vec<u64>,
}

/// Outcome of a call to [`Arena::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub rounds: usize,
    pub n_turns: usize,
    pub n_skipped: usize,
}

/// Skating rink holding the surface, the skaters and the per-angle series.
#[derive(Serialize, Deserialize)]
pub struct Arena {
    torus: Torus,
    agents: Vec<Agent>,
    series: BTreeMap<u32, Vec<SeriesPoint>>,
    round: usize,

    #[serde(skip)]
    others: Vec<Position>,
    #[serde(skip)]
    payoff_rows: Vec<PayoffRow>,
}

impl Arena {
    /// Create an empty arena.
    ///
    /// # Errors
    /// Returns [`SimError::Configuration`] unless all dimensions are finite and positive.
    pub fn new(width: f64, height: f64, collision_radius: f64) -> Result<Self, SimError> {
        let torus = Torus::new(width, height, collision_radius)?;
        Ok(Self {
            torus,
            agents: Vec::new(),
            series: BTreeMap::new(),
            round: 0,
            others: Vec::new(),
            payoff_rows: Vec::new(),
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Number of completed rounds.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Current positions of all skaters in registration order.
    pub fn positions(&self) -> Vec<Position> {
        self.agents.iter().map(|agt| agt.position()).collect()
    }

    /// Angles of the canonical actions of the registered skaters, ascending.
    pub fn angles(&self) -> Vec<u32> {
        self.agents
            .first()
            .map(|agt| agt.angles().collect())
            .unwrap_or_default()
    }

    /// Append a skater to the activation order.
    ///
    /// # Errors
    /// Returns [`SimError::Configuration`] if the skater's actions differ in shape
    /// from those of the skaters already registered.
    pub fn register(&mut self, agent: Agent) -> Result<(), SimError> {
        if let Some(first) = self.agents.first() {
            if !first.angles().eq(agent.angles()) {
                return Err(SimError::configuration(format!(
                    "agent {} does not share the action catalog of agent {}",
                    agent.id(),
                    first.id()
                )));
            }
        }
        self.agents.push(agent);
        Ok(())
    }

    /// Place a new skater at a collision-free random position and register it.
    ///
    /// Returns the index of the new skater.
    pub fn place_agent<R: Rng>(
        &mut self,
        catalog: &[CanonicalAction],
        max_attempts: usize,
        rng: &mut R,
    ) -> Result<usize, SimError> {
        let id = self.agents.len();
        let occupied = self.positions();
        let agent = Agent::place(id, catalog, &self.torus, &occupied, max_attempts, rng)?;
        self.register(agent)?;
        Ok(id)
    }

    /// Run `rounds` more rounds.
    ///
    /// Skaters act in registration order, so each one sees the positions of the
    /// skaters that already moved this round and the previous positions of the rest.
    ///
    /// Every turn appends one [`PayoffRow`] to a buffer that only
    /// [`Arena::drain_payoff_rows`] empties, so callers must drain it after each run.
    pub fn run<R: Rng>(&mut self, rounds: usize, behavior: &Behavior, rng: &mut R) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..rounds {
            let n_skipped = self.step(behavior, rng);
            if n_skipped > 0 && n_skipped == self.agents.len() {
                log::warn!("every agent skipped round {}", self.round);
            }
            summary.rounds += 1;
            summary.n_turns += self.agents.len();
            summary.n_skipped += n_skipped;
        }
        summary
    }

    /// Per-angle series of `(round, population-mean payoff)`, ascending by angle.
    pub fn angle_series(&self) -> &BTreeMap<u32, Vec<SeriesPoint>> {
        &self.series
    }

    /// Take the payoff rows recorded since the last call.
    pub fn drain_payoff_rows(&mut self) -> Vec<PayoffRow> {
        std::mem::take(&mut self.payoff_rows)
    }

    fn step<R: Rng>(&mut self, behavior: &Behavior, rng: &mut R) -> usize {
        self.round += 1;
        let round = self.round;

        let mut n_skipped = 0;
        for i_agt in 0..self.agents.len() {
            self.others.clear();
            self.others.extend(
                self.agents
                    .iter()
                    .enumerate()
                    .filter(|&(j_agt, _)| j_agt != i_agt)
                    .map(|(_, agt)| agt.position()),
            );

            let agent = &mut self.agents[i_agt];
            let turn = agent.take_turn(round, &self.torus, &self.others, behavior, rng);
            if turn == Turn::Skipped {
                n_skipped += 1;
            }

            self.payoff_rows.push(PayoffRow {
                round,
                agent: i_agt,
                cum_payoffs: agent.states().iter().map(|s| s.cum_payoff()).collect(),
            });
        }

        self.aggregate();

        n_skipped
    }

    fn aggregate(&mut self) {
        let n_agt = self.agents.len();
        if n_agt == 0 {
            return;
        }

        let n_act = self.agents[0].states().len();
        for i_act in 0..n_act {
            let angle = self.agents[0].states()[i_act].angle();
            let sum: f64 = self
                .agents
                .iter()
                .map(|agt| agt.states()[i_act].mean_payoff())
                .sum();
            self.series.entry(angle).or_default().push(SeriesPoint {
                round: self.round,
                mean_payoff: sum / n_agt as f64,
            });
        }
    }
}
