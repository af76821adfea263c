//! Interfaces to the neural collaborators the decoder drives.
//!
//! The decoder never looks inside encoder memory; it only threads it back into
//! the attention decoder and the CTC head.

use ndarray::{Array1, Array2};

use crate::error::{DecodeError, Result};

pub type TokenId = usize;

pub trait Encoder {
    type Input;
    type Memory;

    /// Returns the encoder memory and its length in output frames.
    fn encode(&self, input: &Self::Input) -> Result<(Self::Memory, usize)>;
}

/// Attention decoder producing next-token log-probabilities.
///
/// Calls must be deterministic for a given prefix and memory: the search
/// reorders hypotheses freely and never replays hidden decoder state.
pub trait AttentionDecoder {
    type Memory;

    fn vocab_size(&self) -> usize;

    fn log_probs(&self, prefix: &[TokenId], memory: &Self::Memory) -> Result<Array1<f32>>;

    /// Scores every live prefix at once, one row per prefix.
    fn batch_log_probs(
        &self,
        prefixes: &[&[TokenId]],
        memory: &Self::Memory,
    ) -> Result<Array2<f32>> {
        let vocab = self.vocab_size();
        let mut out = Array2::zeros((prefixes.len(), vocab));
        for (mut row, prefix) in out.outer_iter_mut().zip(prefixes) {
            let scores = self.log_probs(prefix, memory)?;
            if scores.len() != vocab {
                return Err(DecodeError::VocabMismatch {
                    expected: vocab,
                    actual: scores.len(),
                });
            }
            row.assign(&scores);
        }
        Ok(out)
    }
}

/// CTC output layer over encoder memory.
pub trait CtcHead {
    type Memory;

    /// Frame-level log-posteriors of shape `(frames, vocab_size)`.
    fn log_posteriors(&self, memory: &Self::Memory, frames: usize) -> Result<Array2<f32>>;
}

pub trait LanguageModel {
    type State: Clone;

    fn initial_state(&self) -> Self::State;

    fn predict(&self, state: &Self::State, last_token: TokenId)
        -> Result<(Self::State, Array1<f32>)>;

    /// Bonus for closing the sequence with EOS.
    fn final_score(&self, state: &Self::State) -> f32;
}

/// Stand-in for decodes that run without an external language model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLanguageModel;

impl LanguageModel for NoLanguageModel {
    type State = ();

    fn initial_state(&self) -> Self::State {}

    fn predict(
        &self,
        _state: &Self::State,
        _last_token: TokenId,
    ) -> Result<(Self::State, Array1<f32>)> {
        Err(DecodeError::Unsupported("no language model is configured"))
    }

    fn final_score(&self, _state: &Self::State) -> f32 {
        0.0
    }
}
