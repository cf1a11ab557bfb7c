use crate::arena::Arena;
use crate::catalog::build_catalog;
use crate::config::Config;
use crate::export;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, the arena with its skaters, and the random number
/// generator, and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    arena: Arena,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and randomly placed skaters.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let catalog = build_catalog(cfg.model.base_angle, cfg.model.step_distance)
            .context("failed to build action catalog")?;

        let mut arena = Arena::new(
            cfg.arena.width,
            cfg.arena.height,
            cfg.arena.collision_radius,
        )
        .context("failed to create arena")?;

        for _ in 0..cfg.init.n_agents {
            arena
                .place_agent(&catalog, cfg.init.max_placement_attempts, &mut rng)
                .context("failed to populate arena")?;
        }
        log::info!(
            "placed {} agents with {} actions each",
            cfg.init.n_agents,
            catalog.len()
        );

        Ok(Self { cfg, arena, rng })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Perform the simulation and write the per-skater payoffs to a CSV file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        export::write_payoff_header(&mut writer, &self.arena.angles())
            .context("failed to write payoff header")?;

        let behavior = self.cfg.model.behavior();
        for i_save in 0..self.cfg.output.saves_per_file {
            let summary = self
                .arena
                .run(self.cfg.output.rounds_per_save, &behavior, &mut self.rng);

            export::write_payoff_rows(&mut writer, &self.arena.drain_payoff_rows())
                .context("failed to write payoff rows")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!(
                "completed {progress:06.2}% (round {}, {} of {} turns skipped)",
                self.arena.round(),
                summary.n_skipped,
                summary.n_turns
            );
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaConfig, InitConfig, ModelConfig, OutputConfig};
    use crate::error::SimError;
    use std::{env, fs};

    fn config() -> Config {
        Config {
            model: ModelConfig {
                base_angle: 45,
                step_distance: 1.0,
                n_fragments: 4,
                prob_explore: 0.1,
                high_reward: 10,
                low_reward: 1,
            },
            arena: ArenaConfig {
                width: 15.0,
                height: 15.0,
                collision_radius: 2.0,
            },
            init: InitConfig {
                n_agents: 3,
                max_placement_attempts: 10_000,
                seed: Some(1234),
            },
            output: OutputConfig {
                rounds_per_save: 5,
                saves_per_file: 4,
            },
        }
    }

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(format!("skatesim-engine-{name}"));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn same_seed_same_trajectory() {
        let dir = test_dir("seed");
        let mut a = Engine::generate_initial_condition(config()).unwrap();
        let mut b = Engine::generate_initial_condition(config()).unwrap();
        a.perform_simulation(dir.join("a.csv")).unwrap();
        b.perform_simulation(dir.join("b.csv")).unwrap();

        assert_eq!(a.arena().positions(), b.arena().positions());
        assert_eq!(a.arena().angle_series(), b.arena().angle_series());
        assert!(a.arena.drain_payoff_rows().is_empty());
        assert_eq!(
            fs::read_to_string(dir.join("a.csv")).unwrap(),
            fs::read_to_string(dir.join("b.csv")).unwrap()
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn resumed_run_matches_uninterrupted_run() {
        let dir = test_dir("resume");
        let checkpoint = dir.join("checkpoint.msgpack");

        let mut whole = Engine::generate_initial_condition(config()).unwrap();
        whole.perform_simulation(dir.join("whole-0.csv")).unwrap();
        whole.perform_simulation(dir.join("whole-1.csv")).unwrap();

        let mut split = Engine::generate_initial_condition(config()).unwrap();
        split.perform_simulation(dir.join("split-0.csv")).unwrap();
        split.save_checkpoint(&checkpoint).unwrap();
        let mut split = Engine::load_checkpoint(&checkpoint).unwrap();
        assert_eq!(split.cfg(), &config());
        split.perform_simulation(dir.join("split-1.csv")).unwrap();

        assert_eq!(split.arena().round(), 40);
        assert_eq!(whole.arena().positions(), split.arena().positions());
        assert_eq!(whole.arena().angle_series(), split.arena().angle_series());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn crowded_rink_fails_placement() {
        let mut cfg = config();
        cfg.arena = ArenaConfig {
            width: 5.0,
            height: 5.0,
            collision_radius: 3.0,
        };
        cfg.init.n_agents = 2;
        cfg.init.max_placement_attempts = 1;
        // A single draw per agent; the first always fits, so retry seeds until
        // the second lands within reach of the first.
        let err = (0..100)
            .find_map(|seed| {
                cfg.init.seed = Some(seed);
                Engine::generate_initial_condition(cfg.clone()).err()
            })
            .unwrap();
        let sim_err = err.downcast_ref::<SimError>().unwrap();
        assert_eq!(
            sim_err,
            &SimError::Placement {
                agent: 1,
                attempts: 1
            }
        );
    }

    #[test]
    fn invalid_base_angle_is_fatal() {
        let mut cfg = config();
        cfg.model.base_angle = 50;
        let err = Engine::generate_initial_condition(cfg).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SimError>(),
            Some(SimError::Configuration { .. })
        ));
    }
}
