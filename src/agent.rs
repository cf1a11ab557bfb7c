//! Skaters and their epsilon-greedy movement policy.

use crate::arena::{Position, Torus};
use crate::catalog::CanonicalAction;
use crate::error::SimError;
use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Learning and movement parameters shared by all skaters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Behavior {
    /// Probability of exploring (random order) instead of exploiting.
    pub prob_explore: f64,
    /// Number of increments a step is divided into for collision checks.
    pub n_fragments: usize,
    /// Reward for the action that moved the skater.
    pub high_reward: u32,
    /// Reward for every action that was tried and blocked.
    pub low_reward: u32,
}

/// Payoff statistics of one canonical action, owned by a single skater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    action: CanonicalAction,
    cum_payoff: u64,
    mean_payoff: f64,
}

impl ActionState {
    fn new(action: CanonicalAction) -> Self {
        Self {
            action,
            cum_payoff: 0,
            mean_payoff: 0.0,
        }
    }

    pub fn angle(&self) -> u32 {
        self.action.angle()
    }

    pub fn cum_payoff(&self) -> u64 {
        self.cum_payoff
    }

    pub fn mean_payoff(&self) -> f64 {
        self.mean_payoff
    }

    fn reward(&mut self, amount: u32) {
        self.cum_payoff += u64::from(amount);
    }

    fn update_mean_payoff(&mut self, round: usize) {
        self.mean_payoff = self.cum_payoff as f64 / round as f64;
    }
}

/// Result of one turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Turn {
    /// The skater moved along the action with this angle.
    Moved { angle: u32 },
    /// Every action was blocked and the skater stayed in place.
    Skipped,
}

/// Priority order of actions for one round, as indices into `states`.
///
/// Explores (uniformly random order) in the first round and whenever
/// `draw < prob_explore`; otherwise exploits, ordering by descending cumulated
/// payoff with ties kept in ascending angle order.
pub fn ordered_actions<R: Rng>(
    states: &[ActionState],
    round: usize,
    draw: f64,
    prob_explore: f64,
    rng: &mut R,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..states.len()).collect();
    if round <= 1 || draw < prob_explore {
        order.shuffle(rng);
    } else {
        order.sort_by(|&a, &b| states[b].cum_payoff.cmp(&states[a].cum_payoff));
    }
    order
}

/// Skater of the simulation.
///
/// Each skater has its own copy of the action catalog with its own payoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: usize,
    pos: Position,
    states: Vec<ActionState>,
    round: usize,
    n_skips: usize,
}

impl Agent {
    /// Create a skater at `pos` with zeroed payoffs for every action in `catalog`.
    pub fn new(id: usize, catalog: &[CanonicalAction], pos: Position) -> Self {
        Self {
            id,
            pos,
            states: catalog.iter().copied().map(ActionState::new).collect(),
            round: 0,
            n_skips: 0,
        }
    }

    /// Create a skater at a uniformly random position that does not collide with
    /// any of `occupied`.
    ///
    /// # Errors
    /// Returns [`SimError::Placement`] if no free position is found within
    /// `max_attempts` draws.
    pub fn place<R: Rng>(
        id: usize,
        catalog: &[CanonicalAction],
        torus: &Torus,
        occupied: &[Position],
        max_attempts: usize,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let x_dist = Uniform::new(0.0, torus.width())
            .map_err(|err| SimError::configuration(format!("invalid width: {err}")))?;
        let y_dist = Uniform::new(0.0, torus.height())
            .map_err(|err| SimError::configuration(format!("invalid height: {err}")))?;

        for _ in 0..max_attempts {
            let pos = Position::new(x_dist.sample(rng), y_dist.sample(rng));
            if !torus.collides(pos, occupied) {
                return Ok(Self::new(id, catalog, pos));
            }
        }

        Err(SimError::Placement {
            agent: id,
            attempts: max_attempts,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// Action states in ascending angle order.
    pub fn states(&self) -> &[ActionState] {
        &self.states
    }

    pub fn angles(&self) -> impl Iterator<Item = u32> + '_ {
        self.states.iter().map(|s| s.angle())
    }

    /// State of the action with the given angle.
    pub fn state(&self, angle: u32) -> Option<&ActionState> {
        self.states
            .binary_search_by_key(&angle, |s| s.angle())
            .ok()
            .map(|i_act| &self.states[i_act])
    }

    /// Last round this skater played.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Number of rounds in which every action was blocked.
    pub fn n_skips(&self) -> usize {
        self.n_skips
    }

    /// Play one round.
    ///
    /// Tries actions in policy order until one reaches a collision-free
    /// destination. Blocked attempts earn the low reward and the successful one
    /// the high reward. Mean payoffs of all actions are then recomputed for
    /// `round`.
    pub fn take_turn<R: Rng>(
        &mut self,
        round: usize,
        torus: &Torus,
        others: &[Position],
        behavior: &Behavior,
        rng: &mut R,
    ) -> Turn {
        debug_assert!(round > self.round, "rounds must increase");
        self.round = round;

        let draw: f64 = rng.random();
        let order = ordered_actions(&self.states, round, draw, behavior.prob_explore, rng);

        let mut turn = Turn::Skipped;
        for i_act in order {
            let action = self.states[i_act].action;
            match self.attempt(&action, torus, others, behavior.n_fragments) {
                Some(dest) => {
                    self.pos = dest;
                    self.states[i_act].reward(behavior.high_reward);
                    turn = Turn::Moved {
                        angle: action.angle(),
                    };
                    break;
                }
                None => self.states[i_act].reward(behavior.low_reward),
            }
        }

        if turn == Turn::Skipped {
            self.n_skips += 1;
            log::debug!(
                "agent {} found no free position in round {round}, skipping",
                self.id
            );
        }

        for state in &mut self.states {
            state.update_mean_payoff(round);
        }

        turn
    }

    /// Walk the step along `action` increment by increment.
    ///
    /// Returns the destination, or `None` if any increment collides.
    fn attempt(
        &self,
        action: &CanonicalAction,
        torus: &Torus,
        others: &[Position],
        n_fragments: usize,
    ) -> Option<Position> {
        let n_fragments = n_fragments.max(1);
        let increment = action.step_distance() / n_fragments as f64;
        let mut pos = self.pos;
        for _ in 0..n_fragments {
            pos = torus.advance(pos, action.angle(), increment);
            if torus.collides(pos, others) {
                return None;
            }
        }
        Some(pos)
    }

    #[cfg(test)]
    pub(crate) fn set_cum_payoff(&mut self, angle: u32, cum_payoff: u64) {
        if let Ok(i_act) = self.states.binary_search_by_key(&angle, |s| s.angle()) {
            self.states[i_act].cum_payoff = cum_payoff;
        }
    }
}
