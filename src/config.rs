use crate::error::{NBackError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const DEFAULT_TARGET_PROBABILITY: f64 = 0.3;

/// How the engine moves from one number to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Advances only on a forced "next" submission
    SelfPaced,
    /// Advances every `tick_interval_ms`, optionally showing a focus marker
    /// for `focus_duration_ms` between numbers
    Timed {
        tick_interval_ms: u64,
        focus_duration_ms: u64,
    },
}

impl Pacing {
    pub fn is_timed(&self) -> bool {
        matches!(self, Pacing::Timed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pacing::SelfPaced => "self-paced",
            Pacing::Timed { .. } => "timed",
        }
    }
}

/// Validated, immutable settings for one task run
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    pub n: usize,
    pub sequence_length: usize,
    pub number_range: RangeInclusive<u32>,
    pub pacing: Pacing,
    /// Chance that a position at or after `n` is drawn as a target
    pub target_probability: f64,
    /// Judgment recorded when a timed tick runs out without a response
    pub timeout_response: bool,
}

impl TaskConfig {
    pub fn new(n: usize, sequence_length: usize, number_range: RangeInclusive<u32>) -> Result<Self> {
        let cfg = Self {
            n,
            sequence_length,
            number_range,
            pacing: Pacing::SelfPaced,
            target_probability: DEFAULT_TARGET_PROBABILITY,
            timeout_response: false,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Result<Self> {
        self.pacing = pacing;
        self.validate()?;
        Ok(self)
    }

    pub fn with_target_probability(mut self, p: f64) -> Result<Self> {
        self.target_probability = p;
        self.validate()?;
        Ok(self)
    }

    pub fn with_timeout_response(mut self, is_target: bool) -> Self {
        self.timeout_response = is_target;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n < 1 {
            return Err(invalid("n must be at least 1"));
        }
        if self.sequence_length <= self.n {
            return Err(invalid(format!(
                "sequence length {} must be greater than n ({})",
                self.sequence_length, self.n
            )));
        }
        if self.number_range.is_empty() {
            return Err(invalid(format!(
                "number range {}..={} is empty",
                self.number_range.start(),
                self.number_range.end()
            )));
        }
        if !(0.0..=1.0).contains(&self.target_probability) {
            return Err(invalid(format!(
                "target probability {} is outside 0..=1",
                self.target_probability
            )));
        }
        if let Pacing::Timed {
            tick_interval_ms: 0,
            ..
        } = self.pacing
        {
            return Err(invalid("timed tick interval must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> NBackError {
    NBackError::InvalidConfiguration(msg.into())
}

/// Settings as stored on disk and edited from the command line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub n: usize,
    pub sequence_length: usize,
    pub min_number: u32,
    pub max_number: u32,
    pub timed: bool,
    pub tick_interval_ms: u64,
    pub focus_duration_ms: u64,
    pub target_probability: f64,
    pub timeout_response: bool,
    pub subject: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n: 2,
            sequence_length: 20,
            min_number: 1,
            max_number: 9,
            timed: false,
            tick_interval_ms: 2000,
            focus_duration_ms: 500,
            target_probability: DEFAULT_TARGET_PROBABILITY,
            timeout_response: false,
            subject: "anonymous".to_string(),
        }
    }
}

impl Config {
    pub fn pacing(&self) -> Pacing {
        if self.timed {
            Pacing::Timed {
                tick_interval_ms: self.tick_interval_ms,
                focus_duration_ms: self.focus_duration_ms,
            }
        } else {
            Pacing::SelfPaced
        }
    }

    pub fn task_config(&self) -> Result<TaskConfig> {
        let cfg = TaskConfig {
            n: self.n,
            sequence_length: self.sequence_length,
            number_range: self.min_number..=self.max_number,
            pacing: self.pacing(),
            target_probability: self.target_probability,
            timeout_response: self.timeout_response,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "nback") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("nback_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable config {}: {}", self.path.display(), e);
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
