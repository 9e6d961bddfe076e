use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Parameters of the segregation model.
///
/// Ranges are checked by [`crate::simulation::Simulation::new`].
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of grid columns.
    pub width: usize,
    /// Number of grid rows.
    pub height: usize,

    /// Fraction of cells initially occupied, in `(0, 1)`.
    pub population_density: f64,
    /// Minimum fraction of same-type neighbors an agent needs, in `[0, 1]`.
    pub happiness_threshold: f64,

    /// Number of agent types.
    pub number_types: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            population_density: 0.9,
            happiness_threshold: 0.5,
            number_types: 2,
        }
    }
}

/// Initialization parameters.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Seed of the random number generator, OS entropy if absent.
    pub seed: Option<u64>,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of updates between saved frames.
    pub steps_per_frame: usize,
    /// Number of frames saved per run, besides the initial one.
    pub frames_per_run: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            steps_per_frame: 100,
            frames_per_run: 64,
        }
    }
}

/// Simulation configuration.
///
/// Loaded from a TOML file. See [`Config::from_file`].
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub init: InitConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed,
    /// or if the output parameters are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.output.steps_per_frame, 1..1_000_000)
            .context("invalid number of steps per frame")?;
        check_num(self.output.frames_per_run, 1..100_000)
            .context("invalid number of frames per run")?;
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

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[model]
width = 20
height = 10
population_density = 0.8
happiness_threshold = 0.3
number_types = 3

[init]
seed = 42

[output]
steps_per_frame = 50
frames_per_run = 8
"#;

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml(CONFIG).unwrap();
        assert_eq!(config.model.width, 20);
        assert_eq!(config.model.height, 10);
        assert_eq!(config.model.number_types, 3);
        assert_eq!(config.init.seed, Some(42));
        assert_eq!(config.output.steps_per_frame, 50);
        assert_eq!(config.output.frames_per_run, 8);
    }

    #[test]
    fn init_section_is_optional() {
        let contents = CONFIG.replace("[init]\nseed = 42\n", "");
        let config = Config::from_toml(&contents).unwrap();
        assert_eq!(config.init.seed, None);
    }

    #[test]
    fn rejects_zero_steps_per_frame() {
        let contents = CONFIG.replace("steps_per_frame = 50", "steps_per_frame = 0");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn rejects_missing_model() {
        let contents = "[output]\nsteps_per_frame = 1\nframes_per_run = 1\n";
        assert!(Config::from_toml(contents).is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().model.width, 50);
    }
}
