#![allow(dead_code)]

use std::sync::Mutex;

use joint_decode_lib::error::Result;
use joint_decode_lib::{AttentionDecoder, CtcHead, Encoder, LanguageModel, TokenId};
use ndarray::{Array1, Array2};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Decoder memory is just the number of encoder frames.
pub type Frames = usize;

/// Same distribution for every prefix.
pub struct UniformDecoder {
    pub vocab: usize,
}

impl AttentionDecoder for UniformDecoder {
    type Memory = Frames;

    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn log_probs(&self, _prefix: &[TokenId], _memory: &Frames) -> Result<Array1<f32>> {
        Ok(Array1::from_elem(self.vocab, -(self.vocab as f32).ln()))
    }
}

/// Puts `peak` mass on `script[step]` (EOS once the script runs out), the
/// rest spread evenly. Depends only on the prefix length.
pub struct ScriptedDecoder {
    pub vocab: usize,
    pub eos: TokenId,
    pub script: Vec<TokenId>,
    pub peak: f32,
}

impl ScriptedDecoder {
    pub fn new(vocab: usize, script: Vec<TokenId>, peak: f32) -> Self {
        Self {
            vocab,
            eos: vocab - 1,
            script,
            peak,
        }
    }

    pub fn target(&self, prefix: &[TokenId]) -> TokenId {
        self.script
            .get(prefix.len() - 1)
            .copied()
            .unwrap_or(self.eos)
    }
}

impl AttentionDecoder for ScriptedDecoder {
    type Memory = Frames;

    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn log_probs(&self, prefix: &[TokenId], _memory: &Frames) -> Result<Array1<f32>> {
        let rest = ((1.0 - self.peak) / (self.vocab - 1) as f32).ln();
        let mut out = Array1::from_elem(self.vocab, rest);
        out[self.target(prefix)] = self.peak.ln();
        Ok(out)
    }
}

/// Wraps a decoder and records the size of every batched call.
pub struct CountingDecoder<D> {
    pub inner: D,
    pub batches: Mutex<Vec<usize>>,
}

impl<D> CountingDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

impl<D: AttentionDecoder<Memory = Frames>> AttentionDecoder for CountingDecoder<D> {
    type Memory = Frames;

    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    fn log_probs(&self, prefix: &[TokenId], memory: &Frames) -> Result<Array1<f32>> {
        self.inner.log_probs(prefix, memory)
    }

    fn batch_log_probs(&self, prefixes: &[&[TokenId]], memory: &Frames) -> Result<Array2<f32>> {
        self.batches.lock().unwrap().push(prefixes.len());
        self.inner.batch_log_probs(prefixes, memory)
    }
}

/// Language model that likes one token and counts how many it has seen.
pub struct FavoriteTokenLm {
    pub vocab: usize,
    pub favorite: TokenId,
    pub bonus: f32,
}

impl LanguageModel for FavoriteTokenLm {
    type State = usize;

    fn initial_state(&self) -> usize {
        0
    }

    fn predict(&self, state: &usize, _last_token: TokenId) -> Result<(usize, Array1<f32>)> {
        let mut scores = Array1::from_elem(self.vocab, -5.0f32);
        scores[self.favorite] = self.bonus;
        Ok((state + 1, scores))
    }

    fn final_score(&self, state: &usize) -> f32 {
        -(*state as f32) * 0.01
    }
}

pub struct FrameEncoder;

impl Encoder for FrameEncoder {
    type Input = Vec<f32>;
    type Memory = Frames;

    fn encode(&self, input: &Vec<f32>) -> Result<(Frames, usize)> {
        Ok((input.len(), input.len()))
    }
}

/// CTC head that emits `frame_probs` at every frame.
pub struct ConstantCtcHead {
    pub frame_probs: Vec<f32>,
}

impl CtcHead for ConstantCtcHead {
    type Memory = Frames;

    fn log_posteriors(&self, _memory: &Frames, frames: usize) -> Result<Array2<f32>> {
        Ok(constant_posteriors(frames, &self.frame_probs))
    }
}

pub fn constant_posteriors(frames: usize, probs: &[f32]) -> Array2<f32> {
    Array2::from_shape_fn((frames, probs.len()), |(_, k)| probs[k].ln())
}

/// Probability that a frame path collapses to exactly `labels` (blank = 0).
pub fn exact_ctc_probability(x: &Array2<f32>, labels: &[TokenId]) -> f64 {
    let (frames, vocab) = x.dim();
    let mut total = 0.0;
    for code in 0..vocab.pow(frames as u32) {
        let mut rest = code;
        let mut prob = 1.0f64;
        let mut collapsed = Vec::new();
        let mut prev = None;
        for t in 0..frames {
            let k = rest % vocab;
            rest /= vocab;
            prob *= f64::from(x[[t, k]]).exp();
            if Some(k) != prev && k != 0 {
                collapsed.push(k);
            }
            prev = Some(k);
        }
        if collapsed == labels {
            total += prob;
        }
    }
    total
}
