use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};

use super::{log_add_exp, LOG_ZERO};
use crate::error::{DecodeError, Result};
use crate::model::TokenId;

/// Forward variables of one output prefix.
///
/// `r[[t, 0]]` holds paths that end in the prefix's last label at frame `t`,
/// `r[[t, 1]]` paths that end in blank.
#[derive(Debug, Clone, PartialEq)]
pub struct CtcState {
    pub r: Array2<f64>,
    pub log_psi: f64,
}

/// Scores and forward variables for one batch of candidate extensions.
#[derive(Debug)]
pub struct CtcPrefixScores {
    scores: Array1<f64>,
    states: Array3<f64>,
}

impl CtcPrefixScores {
    pub fn scores(&self) -> ArrayView1<'_, f64> {
        self.scores.view()
    }

    pub fn score(&self, index: usize) -> f64 {
        self.scores[index]
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Copies out the state of one candidate; pruned candidates are never copied.
    pub fn state(&self, index: usize) -> CtcState {
        CtcState {
            r: self.states.index_axis(Axis(0), index).to_owned(),
            log_psi: self.scores[index],
        }
    }
}

/// Incremental CTC prefix scorer over one utterance's log-posteriors.
#[derive(Debug)]
pub struct CtcPrefixScorer {
    x: Array2<f64>,
    eos: TokenId,
    blank_col: Array1<f64>,
    blank_cumsum: Array1<f64>,
}

impl CtcPrefixScorer {
    pub fn new(log_posteriors: ArrayView2<f32>, blank: TokenId, eos: TokenId) -> Result<Self> {
        let (frames, vocab) = log_posteriors.dim();
        if frames == 0 || vocab == 0 {
            return Err(DecodeError::InvalidConfig(format!(
                "CTC posteriors must be non-empty, got {frames}x{vocab}"
            )));
        }
        if blank >= vocab || eos >= vocab {
            return Err(DecodeError::InvalidConfig(format!(
                "blank ({blank}) and eos ({eos}) must be below vocabulary size {vocab}"
            )));
        }

        let x = log_posteriors.mapv(f64::from);
        let blank_col = x.column(blank).to_owned();
        let mut acc = 0.0;
        let blank_cumsum = blank_col
            .iter()
            .map(|&v| {
                acc += v;
                acc
            })
            .collect();

        Ok(Self {
            x,
            eos,
            blank_col,
            blank_cumsum,
        })
    }

    pub fn frames(&self) -> usize {
        self.x.nrows()
    }

    pub fn vocab_size(&self) -> usize {
        self.x.ncols()
    }

    /// State of the empty prefix: only blanks have been emitted.
    pub fn initial_state(&self) -> CtcState {
        let mut r = Array2::from_elem((self.frames(), 2), LOG_ZERO);
        r.column_mut(1).assign(&self.blank_cumsum);
        let log_psi = self.blank_cumsum[self.frames() - 1];
        CtcState { r, log_psi }
    }

    /// Prefix log-probabilities of `prefix + [c]` for each candidate `c`.
    ///
    /// `prefix` starts with SOS, which never consumes a frame. Scores are
    /// cumulative; a hypothesis gains `score - previous score`.
    pub fn score(
        &self,
        prefix: &[TokenId],
        candidates: &[TokenId],
        prev: &CtcState,
    ) -> CtcPrefixScores {
        let frames = self.frames();
        let output_len = prefix.len().saturating_sub(1);
        let last = prefix.last().copied();

        let r_sum: Array1<f64> = prev
            .r
            .outer_iter()
            .map(|row| log_add_exp(row[0], row[1]))
            .collect();
        let eos_score = r_sum[frames - 1];

        let mut scores = Array1::from_elem(candidates.len(), LOG_ZERO);
        let mut states = Array3::from_elem((candidates.len(), frames, 2), LOG_ZERO);

        // Frames before `start` cannot hold the extended prefix.
        let start = output_len.max(1);

        for (j, &c) in candidates.iter().enumerate() {
            let mut r = states.index_axis_mut(Axis(0), j);
            // A repeated label is only reachable through a blank.
            let repeat = output_len > 0 && last == Some(c);
            let phi = |t: usize| {
                if repeat {
                    prev.r[[t, 1]]
                } else {
                    r_sum[t]
                }
            };

            if output_len == 0 {
                r[[0, 0]] = self.x[[0, c]];
            }

            let mut log_psi = if start <= frames {
                r[[start - 1, 0]]
            } else {
                LOG_ZERO
            };
            for t in start..frames {
                let x_c = self.x[[t, c]];
                let label = r[[t - 1, 0]];
                let blank = r[[t - 1, 1]];
                r[[t, 0]] = log_add_exp(label, phi(t - 1)) + x_c;
                r[[t, 1]] = log_add_exp(label, blank) + self.blank_col[t];
                log_psi = log_add_exp(log_psi, phi(t - 1) + x_c);
            }

            scores[j] = if c == self.eos { eos_score } else { log_psi };
        }

        CtcPrefixScores { scores, states }
    }
}
