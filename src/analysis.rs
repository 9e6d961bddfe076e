use crate::config::Config;
use crate::model::{Agent, Frame};
use crate::stats::{RunningStats, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Quantity measured on every saved frame.
pub trait Obs {
    fn update(&mut self, frame: &Frame) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Fraction of neighbors of type `kind`, `None` without neighbors.
fn same_type_fraction(kind: usize, neighbor_types: &[usize]) -> Option<f64> {
    if neighbor_types.is_empty() {
        return None;
    }
    let n_same = neighbor_types.iter().filter(|&&nbr| nbr == kind).count();
    Some(n_same as f64 / neighbor_types.len() as f64)
}

/// Average same-type neighbor fraction over all agents with neighbors.
pub struct Similarity {
    time_series: TimeSeries,
}

impl Similarity {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::default(),
        }
    }
}

impl Obs for Similarity {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        let type_map = &frame.type_map;
        let mut stats = RunningStats::default();
        for (coord, kind) in type_map.occupied() {
            let neighbor_types = type_map.neighbor_types(coord);
            if let Some(fraction) = same_type_fraction(kind, &neighbor_types) {
                stats.add(fraction);
            }
        }
        self.time_series.push(stats.report().mean);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "similarity": self.time_series.report() })
    }
}

/// Same-type neighbor fraction resolved by agent type.
pub struct TypeSimilarity {
    stats_vec: Vec<RunningStats>,
}

impl TypeSimilarity {
    pub fn new(cfg: &Config) -> Self {
        let mut stats_vec = Vec::new();
        stats_vec.resize_with(cfg.model.number_types, RunningStats::default);
        Self { stats_vec }
    }
}

impl Obs for TypeSimilarity {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        let type_map = &frame.type_map;
        let mut frame_stats: Vec<RunningStats> = Vec::new();
        frame_stats.resize_with(self.stats_vec.len(), RunningStats::default);

        for (coord, kind) in type_map.occupied() {
            let neighbor_types = type_map.neighbor_types(coord);
            let stats = frame_stats
                .get_mut(kind)
                .with_context(|| format!("unexpected agent type {kind} at {coord}"))?;
            if let Some(fraction) = same_type_fraction(kind, &neighbor_types) {
                stats.add(fraction);
            }
        }

        for (stats, frame_stats) in self.stats_vec.iter_mut().zip(&frame_stats) {
            let mean = frame_stats.report().mean;
            if !mean.is_nan() {
                stats.add(mean);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.stats_vec.iter().map(RunningStats::report).collect();
        serde_json::json!({ "type_similarity": reports })
    }
}

/// Fraction of agents unhappy where they stand.
pub struct UnhappyFraction {
    happiness_threshold: f64,
    time_series: TimeSeries,
}

impl UnhappyFraction {
    pub fn new(cfg: &Config) -> Self {
        Self {
            happiness_threshold: cfg.model.happiness_threshold,
            time_series: TimeSeries::default(),
        }
    }
}

impl Obs for UnhappyFraction {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        let type_map = &frame.type_map;
        let mut n_agt = 0;
        let mut n_unhappy = 0;
        for (coord, kind) in type_map.occupied() {
            n_agt += 1;
            let agent = Agent::new(kind, self.happiness_threshold);
            if !agent.is_happy(&type_map.neighbor_types(coord)) {
                n_unhappy += 1;
            }
        }
        let fraction = if n_agt == 0 {
            0.0
        } else {
            n_unhappy as f64 / n_agt as f64
        };
        self.time_series.push(fraction);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "unhappy_fraction": self.time_series.report() })
    }
}

/// Relocations between consecutive frames.
pub struct NMoves {
    time_series: TimeSeries,
}

impl NMoves {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::default(),
        }
    }
}

impl Obs for NMoves {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        // The initial frame carries no moves and would bias the series.
        if frame.step > 0 {
            self.time_series.push(frame.n_moves as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "n_moves": self.time_series.report() })
    }
}

/// Runs every observable over the frames of a trajectory file.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Similarity::new()),
            Box::new(TypeSimilarity::new(&cfg)),
            Box::new(UnhappyFraction::new(&cfg)),
            Box::new(NMoves::new()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    /// Read the initial frame and `frames_per_run` more from `file`.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for i_frame in 0..=self.cfg.output.frames_per_run {
            let frame: Frame = decode::from_read(&mut reader)
                .with_context(|| format!("failed to read frame {i_frame}"))?;
            self.add_frame(&frame)?;
        }
        Ok(())
    }

    pub fn add_frame(&mut self, frame: &Frame) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(frame).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn report(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.report())
            .context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeMap;

    fn frame(step: usize, n_moves: usize, rows: &[&str]) -> Frame {
        let width = rows[0].len();
        let cells = rows
            .iter()
            .flat_map(|row| row.chars().map(|symbol| symbol.to_digit(10).map(|d| d as usize)))
            .collect();
        Frame {
            step,
            n_moves,
            type_map: TypeMap::new(width, rows.len(), cells),
        }
    }

    #[test]
    fn segregated_frame_is_fully_similar() {
        let mut analyzer = Analyzer::new(Config::default());
        for step in 0..4 {
            analyzer
                .add_frame(&frame(step * 10, 0, &["00..11", "00..11"]))
                .unwrap();
        }
        let report = analyzer.report();
        assert_eq!(report[0]["similarity"]["mean"], 1.0);
        assert_eq!(report[1]["type_similarity"][0]["mean"], 1.0);
        assert_eq!(report[1]["type_similarity"][1]["mean"], 1.0);
        assert_eq!(report[2]["unhappy_fraction"]["mean"], 0.0);
    }

    #[test]
    fn isolated_agents_count_as_unhappy() {
        let mut obs = UnhappyFraction::new(&Config::default());
        obs.update(&frame(0, 0, &["0..", "...", "011"])).unwrap();
        obs.update(&frame(1, 0, &["0..", "...", "011"])).unwrap();
        // (0, 0) is alone, (0, 2) sits next to a single type 1 agent.
        let report = obs.report();
        assert_eq!(report["unhappy_fraction"]["mean"], 0.5);
    }

    #[test]
    fn initial_frame_moves_are_skipped() {
        let mut obs = NMoves::new();
        obs.update(&frame(0, 99, &["0."])).unwrap();
        obs.update(&frame(10, 4, &["0."])).unwrap();
        obs.update(&frame(20, 4, &["0."])).unwrap();
        assert_eq!(obs.report()["n_moves"]["mean"], 4.0);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let mut obs = TypeSimilarity::new(&Config::default());
        assert!(obs.update(&frame(0, 0, &["05"])).is_err());
    }
}
