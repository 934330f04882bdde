//! Memetic monitoring: PIP-origin meme tracking, acceptance rates, drift
//! alarms, and the dashboard aggregation panels.
//!
//! The monitor keeps an in-memory record of every meme (a genome offered to
//! long-term memory) and mirrors each record to an append-only JSONL log.
//! The dashboard computes population-health panels on demand; it holds no
//! state of its own.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use qube_core::AuditLog;

use crate::genome::Genome;

/// One tracked meme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemeRecord {
    pub id: String,
    pub origin_pip: bool,
    pub accepted: bool,
    pub adapters_len: usize,
}

/// Tracks meme lineage and acceptance, persisting each record as it arrives.
pub struct MemeticMonitor<'a> {
    audit: &'a AuditLog,
    memes: Vec<MemeRecord>,
}

impl<'a> MemeticMonitor<'a> {
    pub fn new(audit: &'a AuditLog) -> Self {
        MemeticMonitor {
            audit,
            memes: Vec::new(),
        }
    }

    /// Record one meme outcome.
    pub fn record_meme(
        &mut self,
        id: &str,
        origin_pip: bool,
        accepted: bool,
        adapters_len: usize,
    ) -> Result<()> {
        let record = MemeRecord {
            id: id.to_string(),
            origin_pip,
            accepted,
            adapters_len,
        };
        self.audit.record(
            "meme",
            json!({
                "id": record.id,
                "origin_pip": record.origin_pip,
                "accepted": record.accepted,
                "adapters_len": record.adapters_len,
            }),
        )?;
        self.memes.push(record);
        Ok(())
    }

    /// Acceptance rate among PIP-origin memes (0 when none recorded).
    pub fn pip_acceptance_rate(&self) -> f64 {
        let pip: Vec<&MemeRecord> = self.memes.iter().filter(|m| m.origin_pip).collect();
        if pip.is_empty() {
            return 0.0;
        }
        pip.iter().filter(|m| m.accepted).count() as f64 / pip.len() as f64
    }

    /// Acceptance rate over all memes (0 when none recorded).
    pub fn overall_acceptance_rate(&self) -> f64 {
        if self.memes.is_empty() {
            return 0.0;
        }
        self.memes.iter().filter(|m| m.accepted).count() as f64 / self.memes.len() as f64
    }

    /// When `entropy` reaches the drift threshold, append an alarm record
    /// and return the alarm message.
    pub fn alarm_if_drift(&self, entropy: f64, drift_thresh: f64) -> Result<Option<String>> {
        if entropy >= drift_thresh {
            let msg = format!(
                "ALARM: drift entropy {:.3} exceeds threshold {}",
                entropy, drift_thresh
            );
            self.audit.record("alarm", json!({"message": msg}))?;
            return Ok(Some(msg));
        }
        Ok(None)
    }

    pub fn memes(&self) -> &[MemeRecord] {
        &self.memes
    }
}

/// Population-health panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationHealth {
    pub average_fitness: f32,
    pub best_fitness: f32,
    /// Mean per-dimension standard deviation of adapter vectors.
    pub diversity: f32,
    pub size: usize,
}

/// PIP-activity panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipActivity {
    pub pip_percent: f64,
    pub pip_acceptance_rate: f64,
}

/// Stateless aggregator over a population for monitoring panels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dashboard;

impl Dashboard {
    pub fn new() -> Self {
        Dashboard
    }

    /// Average/best fitness, adapter diversity, and size of a population.
    pub fn population_health(&self, population: &[(Genome, f32)]) -> PopulationHealth {
        if population.is_empty() {
            return PopulationHealth {
                average_fitness: 0.0,
                best_fitness: 0.0,
                diversity: 0.0,
                size: 0,
            };
        }
        let fits: Vec<f32> = population.iter().map(|(_, f)| *f).collect();
        let average = fits.iter().sum::<f32>() / fits.len() as f32;
        let best = fits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        let dim = population[0].0.adapters.len();
        let diversity = if dim == 0 {
            std_dev(&fits)
        } else {
            // mean over dimensions of the per-dimension std across members
            let mut total = 0.0f32;
            for d in 0..dim {
                let column: Vec<f32> = population
                    .iter()
                    .map(|(g, _)| g.adapters.get(d).copied().unwrap_or(0.0))
                    .collect();
                total += std_dev(&column);
            }
            total / dim as f32
        };

        PopulationHealth {
            average_fitness: average,
            best_fitness: best,
            diversity,
            size: population.len(),
        }
    }

    /// Share of PIP genomes plus the monitor's PIP acceptance rate.
    pub fn pip_activity(
        &self,
        population: &[(Genome, f32)],
        monitor: Option<&MemeticMonitor<'_>>,
    ) -> PipActivity {
        if population.is_empty() {
            return PipActivity {
                pip_percent: 0.0,
                pip_acceptance_rate: 0.0,
            };
        }
        let pip_count = population.iter().filter(|(g, _)| g.meta.pip).count();
        PipActivity {
            pip_percent: pip_count as f64 / population.len() as f64,
            pip_acceptance_rate: monitor.map(|m| m.pip_acceptance_rate()).unwrap_or(0.0),
        }
    }

    /// Alarm lines for the given entropy against named thresholds.
    pub fn alarms(&self, entropy: f64, thresholds: &HashMap<String, f64>) -> Vec<String> {
        let mut out = Vec::new();
        let drift = thresholds.get("drift").copied().unwrap_or(0.7);
        if entropy >= drift {
            out.push(format!(
                "DRIFT alarm: entropy {:.3} >= {}",
                entropy, drift
            ));
        }
        out
    }
}

fn std_dev(xs: &[f32]) -> f32 {
    if xs.len() < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f32>() / xs.len() as f32;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / xs.len() as f32;
    var.sqrt()
}

/// Shannon entropy over vertex visit frequencies, normalized to [0, 1] by
/// the maximum entropy over the distinct vertices seen. A proxy for routing
/// drift: higher means visits are spread thin over many vertices.
pub fn hypercube_path_entropy(paths: &[Vec<u32>]) -> f64 {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for path in paths {
        for &v in path {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    let total: usize = counts.values().sum();
    if counts.len() <= 1 || total == 0 {
        return 0.0;
    }
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    entropy / (counts.len() as f64).ln()
}
