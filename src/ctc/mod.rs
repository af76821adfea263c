pub(crate) mod prefix_score;

pub use prefix_score::{CtcPrefixScorer, CtcPrefixScores, CtcState};

use ndarray::{Array2, ArrayView2, Axis};

use crate::model::TokenId;

/// Finite stand-in for log(0); keeps prefix recursions free of `-inf - -inf`.
pub const LOG_ZERO: f64 = -1e10;

pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Row-wise log-softmax, turning CTC head logits into log-posteriors.
pub fn log_softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>();
        let norm = max + sum.ln();
        row.mapv_inplace(|v| v - norm);
    }
    logits
}

/// Best-path CTC transcript: frame argmax, repeats merged, blanks removed.
pub fn greedy_collapse(log_posteriors: ArrayView2<f32>, blank: TokenId) -> Vec<TokenId> {
    let mut out = Vec::new();
    let mut prev = None;
    for frame in log_posteriors.outer_iter() {
        let best = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        if let Some(token) = best {
            if prev != Some(token) && token != blank {
                out.push(token);
            }
        }
        prev = best;
    }
    out
}
