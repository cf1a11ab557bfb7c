use crate::engine::Engine;
use crate::stats::{Accumulator, AccumulatorReport, TimeSeriesReport, analyze_time_series};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct AngleReport {
    pub angle: u32,
    pub mean_payoff: TimeSeriesReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_idx: usize,
    pub rounds: usize,
    pub skip_rate: f64,
    pub angles: Vec<AngleReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalPayoffReport {
    pub angle: u32,
    pub across_runs: AccumulatorReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Results {
    pub runs: Vec<RunReport>,
    pub final_mean_payoff: Vec<FinalPayoffReport>,
    pub skip_rate: AccumulatorReport,
}

/// Collects per-run and across-run statistics of the per-angle series.
pub struct Analyzer {
    angles: Vec<u32>,
    final_acc_vec: Vec<Accumulator>,
    skip_acc: Accumulator,
    runs: Vec<RunReport>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            angles: Vec::new(),
            final_acc_vec: Vec::new(),
            skip_acc: Accumulator::new(),
            runs: Vec::new(),
        }
    }

    pub fn add_run(&mut self, run_idx: usize, engine: &Engine) -> Result<()> {
        let arena = engine.arena();
        let series = arena.angle_series();
        let angles: Vec<u32> = series.keys().copied().collect();

        if self.runs.is_empty() {
            self.final_acc_vec.resize_with(angles.len(), Accumulator::new);
            self.angles = angles;
        } else if angles != self.angles {
            bail!("run {run_idx} has angles {angles:?}, expected {:?}", self.angles);
        }

        let mut angle_reports = Vec::with_capacity(series.len());
        for (acc, (&angle, points)) in self.final_acc_vec.iter_mut().zip(series) {
            let vals: Vec<f64> = points.iter().map(|pt| pt.mean_payoff).collect();
            if let Some(&last) = vals.last() {
                acc.add(last);
            }
            angle_reports.push(AngleReport {
                angle,
                mean_payoff: analyze_time_series(&vals),
            });
        }

        let n_turns = arena.round() * arena.agents().len();
        let n_skips: usize = arena.agents().iter().map(|agt| agt.n_skips()).sum();
        let skip_rate = if n_turns > 0 {
            n_skips as f64 / n_turns as f64
        } else {
            f64::NAN
        };
        if n_turns > 0 {
            self.skip_acc.add(skip_rate);
        }

        log::info!("run {run_idx}: {} rounds, skip rate {skip_rate:.4}", arena.round());

        self.runs.push(RunReport {
            run_idx,
            rounds: arena.round(),
            skip_rate,
            angles: angle_reports,
        });

        Ok(())
    }

    pub fn into_results(self) -> Results {
        let final_mean_payoff = self
            .angles
            .iter()
            .zip(&self.final_acc_vec)
            .map(|(&angle, acc)| FinalPayoffReport {
                angle,
                across_runs: acc.report(),
            })
            .collect();
        Results {
            runs: self.runs,
            final_mean_payoff,
            skip_rate: self.skip_acc.report(),
        }
    }

    pub fn save_results<P: AsRef<Path>>(self, file: P) -> Result<()> {
        let results = self.into_results();
        for report in &results.final_mean_payoff {
            log::info!(
                "angle {:>3}: final mean payoff {:.4} +- {:.4}",
                report.angle,
                report.across_runs.mean,
                report.across_runs.std_dev
            );
        }

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &results).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
