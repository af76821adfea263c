use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

pub const DEFAULT_CTC_SCORING_RATIO: f64 = 1.5;
pub const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Beam,
    /// Attention-only argmax decoding.
    Greedy,
}

impl std::str::FromStr for SearchMode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beam" => Ok(Self::Beam),
            "greedy" => Ok(Self::Greedy),
            other => Err(DecodeError::InvalidConfig(format!(
                "unknown search mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub beam_size: usize,
    /// Added to an ended hypothesis once per emitted step.
    pub penalty: f64,
    pub ctc_weight: f64,
    pub lm_weight: f64,
    /// Zero means "as many steps as encoder frames" and enables end detection.
    pub maxlenratio: f64,
    pub minlenratio: f64,
    pub ctc_scoring_ratio: f64,
    pub max_retries: usize,
    pub nbest: Option<usize>,
    pub num_threads: Option<usize>,
    pub mode: SearchMode,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            beam_size: 1,
            penalty: 0.0,
            ctc_weight: 0.0,
            lm_weight: 0.0,
            maxlenratio: 0.0,
            minlenratio: 0.0,
            ctc_scoring_ratio: DEFAULT_CTC_SCORING_RATIO,
            max_retries: DEFAULT_MAX_RETRIES,
            nbest: None,
            num_threads: None,
            mode: SearchMode::Beam,
        }
    }
}

impl DecodeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides("DECODE_");
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    fn apply_env_overrides(&mut self, prefix: &str) {
        let parse_env = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();
        let apply = |suffix: &str, target: &mut f64| {
            if let Some(v) = parse_env(suffix).and_then(|s| s.parse().ok()) {
                *target = v;
            }
        };

        apply("PENALTY", &mut self.penalty);
        apply("CTC_WEIGHT", &mut self.ctc_weight);
        apply("LM_WEIGHT", &mut self.lm_weight);
        apply("MAXLENRATIO", &mut self.maxlenratio);
        apply("MINLENRATIO", &mut self.minlenratio);
        apply("CTC_SCORING_RATIO", &mut self.ctc_scoring_ratio);

        if let Some(v) = parse_env("BEAM_SIZE").and_then(|s| s.parse::<usize>().ok()) {
            self.beam_size = v.max(1);
        }
        if let Some(v) = parse_env("MAX_RETRIES").and_then(|s| s.parse().ok()) {
            self.max_retries = v;
        }
        if let Some(v) = parse_env("NBEST").and_then(|s| s.parse::<usize>().ok()) {
            self.nbest = Some(v).filter(|n| *n > 0);
        }
        if let Some(v) = parse_env("THREADS").and_then(|s| s.parse::<usize>().ok()) {
            self.num_threads = Some(v.max(1));
        }
        if let Some(mode) = parse_env("MODE").and_then(|s| s.parse().ok()) {
            self.mode = mode;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DecodeError::InvalidConfig(msg));

        if self.beam_size == 0 {
            return invalid("beam_size must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.ctc_weight) {
            return invalid(format!("ctc_weight must be in [0, 1], got {}", self.ctc_weight));
        }
        if !(self.lm_weight >= 0.0) {
            return invalid(format!("lm_weight must be non-negative, got {}", self.lm_weight));
        }
        if !(self.maxlenratio >= 0.0) {
            return invalid(format!(
                "maxlenratio must be non-negative, got {}",
                self.maxlenratio
            ));
        }
        if !(0.0..1.0).contains(&self.minlenratio) {
            return invalid(format!(
                "minlenratio must be in [0, 1), got {}",
                self.minlenratio
            ));
        }
        if !(self.ctc_scoring_ratio > 0.0) {
            return invalid(format!(
                "ctc_scoring_ratio must be positive, got {}",
                self.ctc_scoring_ratio
            ));
        }
        if !self.penalty.is_finite() {
            return invalid("penalty must be finite".into());
        }
        if self.mode == SearchMode::Greedy && self.ctc_weight > 0.0 {
            return Err(DecodeError::Unsupported(
                "joint CTC scoring is not available in greedy mode",
            ));
        }
        if self.mode == SearchMode::Greedy && self.lm_weight > 0.0 {
            return Err(DecodeError::Unsupported(
                "language model fusion is not available in greedy mode",
            ));
        }
        Ok(())
    }

    /// Maximum number of decoding steps for an utterance of `frames` encoder frames.
    pub fn max_len(&self, frames: usize) -> usize {
        if self.maxlenratio == 0.0 {
            frames
        } else {
            ((self.maxlenratio * frames as f64).floor() as usize).max(1)
        }
    }

    pub fn min_len(&self, frames: usize) -> usize {
        (self.minlenratio * frames as f64).floor() as usize
    }

    pub fn ctc_beam(&self, vocab_size: usize) -> usize {
        if self.ctc_weight < 1.0 {
            let scaled = (self.beam_size as f64 * self.ctc_scoring_ratio).floor() as usize;
            vocab_size.min(scaled.max(1))
        } else {
            vocab_size
        }
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get_physical).max(1)
    }
}
