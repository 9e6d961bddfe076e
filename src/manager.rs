use crate::analysis::Analyzer;
use crate::config::Config;
use crate::model::Frame;
use crate::simulation::Simulation;
use anyhow::{Context, Result, bail};
use glob::glob;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Simulate a new run and save its frames in the next free run dir.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.run_dirs().context("failed to list run dirs")?.len();

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let rng = self.run_rng(run_idx).context("failed to seed rng")?;
        let mut sim =
            Simulation::new(&self.cfg.model, rng).context("failed to construct simulation")?;

        self.perform_simulation(&mut sim, self.trajectory_file(run_idx))
            .context("failed to perform simulation")?;

        let final_file = self.final_file(run_idx);
        fs::write(&final_file, sim.type_map().to_string())
            .with_context(|| format!("failed to write {final_file:?}"))?;
        log::info!("wrote {final_file:?}");

        Ok(())
    }

    /// Load frame `frame_idx` of a run, the last frame if `None`.
    pub fn load_frame(&self, run_idx: usize, frame_idx: Option<usize>) -> Result<Frame> {
        let frames_per_run = self.cfg.output.frames_per_run;
        let frame_idx = frame_idx.unwrap_or(frames_per_run);
        if frame_idx > frames_per_run {
            bail!("frame index must be at most {frames_per_run}, but is {frame_idx}");
        }

        let file = self.trajectory_file(run_idx);
        let file = File::open(&file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let mut frame: Frame = decode::from_read(&mut reader).context("failed to read frame 0")?;
        for i_frame in 1..=frame_idx {
            frame = decode::from_read(&mut reader)
                .with_context(|| format!("failed to read frame {i_frame}"))?;
        }
        Ok(frame)
    }

    /// Analyze the trajectory of every run.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.run_dirs().context("failed to list run dirs")?.len();
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new(self.cfg.clone());

            let trajectory_file = self.trajectory_file(run_idx);
            analyzer
                .add_file(&trajectory_file)
                .with_context(|| format!("failed to analyze {trajectory_file:?}"))?;

            let results_file = self.results_file(run_idx);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("wrote {results_file:?}");
        }

        Ok(())
    }

    /// Remove every run dir.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn perform_simulation<P: AsRef<Path>>(&self, sim: &mut Simulation, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let output = &self.cfg.output;

        let initial = Frame {
            step: 0,
            n_moves: 0,
            type_map: sim.type_map(),
        };
        encode::write(&mut writer, &initial).context("failed to serialize frame")?;

        for i_frame in 0..output.frames_per_run {
            let mut n_moves = 0;
            for _ in 0..output.steps_per_frame {
                if sim.update().context("failed to update simulation")?.is_some() {
                    n_moves += 1;
                }
            }

            let frame = Frame {
                step: (i_frame + 1) * output.steps_per_frame,
                n_moves,
                type_map: sim.type_map(),
            };
            encode::write(&mut writer, &frame).context("failed to serialize frame")?;

            let progress = 100.0 * (i_frame + 1) as f64 / output.frames_per_run as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Seeded runs share the seed and differ in their ChaCha stream.
    fn run_rng(&self, run_idx: usize) -> Result<ChaCha12Rng> {
        let rng = match self.cfg.init.seed {
            Some(seed) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(run_idx as u64);
                rng
            }
            None => ChaCha12Rng::try_from_os_rng()?,
        };
        Ok(rng)
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn final_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("final.txt")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.json")
    }
}
