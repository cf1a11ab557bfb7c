use crate::agent::Behavior;
use crate::catalog::build_catalog;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Learning and movement parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Angle between neighbouring canonical actions, in degrees.
    pub base_angle: u32,
    /// Distance covered by one unblocked move.
    pub step_distance: f64,
    /// Number of increments a step is checked at.
    pub n_fragments: usize,
    /// Probability of exploring instead of exploiting.
    pub prob_explore: f64,
    /// Reward for the action that moved the skater.
    pub high_reward: u32,
    /// Reward for each blocked action.
    pub low_reward: u32,
}

impl ModelConfig {
    pub fn behavior(&self) -> Behavior {
        Behavior {
            prob_explore: self.prob_explore,
            n_fragments: self.n_fragments,
            high_reward: self.high_reward,
            low_reward: self.low_reward,
        }
    }
}

/// Rink dimensions.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
    /// Minimum distance between any two skaters.
    pub collision_radius: f64,
}

/// Population parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Number of skaters.
    pub n_agents: usize,
    /// Random positions drawn per skater before placement fails.
    pub max_placement_attempts: usize,
    /// Seed of the random number generator (drawn from the OS if absent).
    pub seed: Option<u64>,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of rounds between progress reports and CSV flushes.
    pub rounds_per_save: usize,
    /// Number of saves per invocation.
    pub saves_per_file: usize,
}

impl OutputConfig {
    /// Rounds simulated by each `create` or `resume`.
    pub fn rounds_per_file(&self) -> usize {
        self.rounds_per_save * self.saves_per_file
    }
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub arena: ArenaConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
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

    fn validate(&self) -> Result<()> {
        let model = &self.model;
        build_catalog(model.base_angle, model.step_distance).context("invalid action catalog")?;
        check_num(model.n_fragments, 1..=10_000).context("invalid number of fragments")?;
        check_num(model.prob_explore, 0.0..=1.0).context("invalid exploration probability")?;
        check_num(model.high_reward, 0..=1_000_000).context("invalid high reward")?;
        check_num(model.low_reward, 0..=1_000_000).context("invalid low reward")?;

        let arena = &self.arena;
        check_pos(arena.width).context("invalid width")?;
        check_pos(arena.height).context("invalid height")?;
        check_pos(arena.collision_radius).context("invalid collision radius")?;

        // Wrapping corrects a coordinate by one bound at most.
        let increment = model.step_distance / model.n_fragments as f64;
        let min_side = arena.width.min(arena.height);
        if increment >= min_side {
            bail!("step increment {increment} must be smaller than the shortest side {min_side}");
        }

        check_num(self.init.n_agents, 1..100_000).context("invalid number of agents")?;
        check_num(self.init.max_placement_attempts, 1..=100_000_000)
            .context("invalid number of placement attempts")?;

        check_num(self.output.rounds_per_save, 1..100_000)
            .context("invalid number of rounds per save")?;
        check_num(self.output.saves_per_file, 1..10_000)
            .context("invalid number of saves per file")?;

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

fn check_pos(num: f64) -> Result<()> {
    if !num.is_finite() || num <= 0.0 {
        bail!("number must be finite and positive, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[model]
base_angle = 60
step_distance = 1.0
n_fragments = 10
prob_explore = 0.1
high_reward = 10
low_reward = 1

[arena]
width = 15.0
height = 15.0
collision_radius = 3.0

[init]
n_agents = 3
max_placement_attempts = 10000
seed = 42

[output]
rounds_per_save = 20
saves_per_file = 10
"#;

    fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn parses_valid_config() {
        let config = parse(CONFIG).unwrap();
        assert_eq!(config.model.base_angle, 60);
        assert_eq!(config.init.seed, Some(42));
        assert_eq!(config.output.rounds_per_file(), 200);
        assert_eq!(config.model.behavior().n_fragments, 10);
    }

    #[test]
    fn seed_is_optional() {
        let config = parse(&CONFIG.replace("seed = 42\n", "")).unwrap();
        assert_eq!(config.init.seed, None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse(&CONFIG.replace("prob_explore = 0.1", "prob_explore = 1.5")).is_err());
        assert!(parse(&CONFIG.replace("n_fragments = 10", "n_fragments = 0")).is_err());
        assert!(parse(&CONFIG.replace("width = 15.0", "width = -15.0")).is_err());
        assert!(parse(&CONFIG.replace("n_agents = 3", "n_agents = 0")).is_err());
    }

    #[test]
    fn rejects_base_angle_not_dividing_full_turn() {
        let err = parse(&CONFIG.replace("base_angle = 60", "base_angle = 50")).unwrap_err();
        assert!(format!("{err:#}").contains("base angle 50"));
        assert!(parse(&CONFIG.replace("base_angle = 60", "base_angle = 0")).is_err());
    }

    #[test]
    fn rejects_increment_longer_than_rink() {
        let contents = CONFIG
            .replace("step_distance = 1.0", "step_distance = 40.0")
            .replace("n_fragments = 10", "n_fragments = 2");
        let err = parse(&contents).unwrap_err();
        assert!(err.to_string().contains("shortest side"));
    }
}
