use serde::{Deserialize, Serialize};

use crate::ctc::CtcState;
use crate::model::TokenId;

#[derive(Debug, Clone)]
pub struct CtcExtra {
    pub state: CtcState,
    /// Cumulative CTC prefix score of `tokens`; per-step scores are deltas against it.
    pub score_prev: f64,
}

#[derive(Debug, Clone)]
pub struct LmExtra<S> {
    pub state: S,
}

#[derive(Debug, Clone)]
pub struct Hypothesis<S = ()> {
    pub score: f64,
    pub tokens: Vec<TokenId>,
    pub ctc: Option<CtcExtra>,
    pub lm: Option<LmExtra<S>>,
}

impl<S> Hypothesis<S> {
    pub fn initial(sos: TokenId) -> Self {
        Self {
            score: 0.0,
            tokens: vec![sos],
            ctc: None,
            lm: None,
        }
    }

    pub fn last_token(&self) -> TokenId {
        // `tokens` always starts with SOS.
        self.tokens[self.tokens.len() - 1]
    }

    pub fn ends_with(&self, token: TokenId) -> bool {
        self.tokens.last() == Some(&token)
    }
}

/// The parts of an ended hypothesis that end detection looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndedHyp {
    pub score: f64,
    pub len: usize,
}

impl<S> From<&Hypothesis<S>> for EndedHyp {
    fn from(hyp: &Hypothesis<S>) -> Self {
        Self {
            score: hyp.score,
            len: hyp.tokens.len(),
        }
    }
}

/// One decoding result; `token_sequence` includes SOS and EOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NBest {
    pub score: f64,
    pub token_sequence: Vec<TokenId>,
}

impl NBest {
    pub fn normalized_score(&self) -> f64 {
        self.score / self.token_sequence.len().max(1) as f64
    }
}

impl<S> From<Hypothesis<S>> for NBest {
    fn from(hyp: Hypothesis<S>) -> Self {
        Self {
            score: hyp.score,
            token_sequence: hyp.tokens,
        }
    }
}

pub(crate) fn sort_by_score_desc<S>(hyps: &mut [Hypothesis<S>]) {
    hyps.sort_by(|a, b| b.score.total_cmp(&a.score));
}
