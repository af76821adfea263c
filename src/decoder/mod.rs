use std::sync::Arc;
use std::time::Instant;

use ndarray::ArrayView2;
use rayon::ThreadPoolBuilder;

use crate::config::{DecodeConfig, SearchMode};
use crate::ctc::CtcPrefixScorer;
use crate::error::{DecodeError, Result};
use crate::model::{AttentionDecoder, LanguageModel, NoLanguageModel, TokenId};
use crate::vocab::TokenList;

pub mod end_detect;
pub(crate) mod search;
pub mod state;

pub use end_detect::{EndDetector, ScoreDecayEndDetector};
pub use state::{CtcExtra, EndedHyp, Hypothesis, LmExtra, NBest};

use search::{SearchContext, SearchLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub sos: TokenId,
    pub eos: TokenId,
    pub blank: TokenId,
}

impl SpecialTokens {
    /// SOS and EOS share the last id, blank is 0.
    pub fn for_vocab(vocab_size: usize) -> Self {
        let last = vocab_size.saturating_sub(1);
        Self {
            sos: last,
            eos: last,
            blank: 0,
        }
    }
}

/// Joint attention/CTC beam search over one utterance.
pub struct BeamSearchDecoder<'a, D: AttentionDecoder> {
    decoder: &'a D,
    config: DecodeConfig,
    tokens: SpecialTokens,
    end_detector: Arc<dyn EndDetector>,
    token_list: Option<&'a TokenList>,
}

impl<'a, D: AttentionDecoder> BeamSearchDecoder<'a, D> {
    pub fn new(decoder: &'a D, config: DecodeConfig) -> Self {
        Self {
            tokens: SpecialTokens::for_vocab(decoder.vocab_size()),
            decoder,
            config,
            end_detector: Arc::new(ScoreDecayEndDetector::default()),
            token_list: None,
        }
    }

    pub fn with_special_tokens(mut self, tokens: SpecialTokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_end_detector(mut self, detector: Arc<dyn EndDetector>) -> Self {
        self.end_detector = detector;
        self
    }

    pub fn with_token_list(mut self, list: &'a TokenList) -> Self {
        self.token_list = Some(list);
        self
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn decode(
        &self,
        memory: &D::Memory,
        frames: usize,
        ctc_posteriors: Option<ArrayView2<f32>>,
    ) -> Result<Vec<NBest>> {
        self.decode_with_lm::<NoLanguageModel>(memory, frames, ctc_posteriors, None)
    }

    /// Runs the search, relaxing `minlenratio` when nothing ends.
    ///
    /// Returns the ended hypotheses best first; an empty list means no
    /// hypothesis survived even after the allowed retries.
    pub fn decode_with_lm<L: LanguageModel>(
        &self,
        memory: &D::Memory,
        frames: usize,
        ctc_posteriors: Option<ArrayView2<f32>>,
        lm: Option<&L>,
    ) -> Result<Vec<NBest>> {
        self.config.validate()?;
        let vocab = self.decoder.vocab_size();
        let SpecialTokens { sos, eos, blank } = self.tokens;
        if sos >= vocab || eos >= vocab || blank >= vocab {
            return Err(DecodeError::InvalidConfig(format!(
                "special tokens {:?} exceed vocabulary size {vocab}",
                self.tokens
            )));
        }
        if frames == 0 {
            log::warn!("encoder produced no frames, nothing to decode");
            return Ok(Vec::new());
        }

        let scorer = if self.config.ctc_weight > 0.0 {
            let x = ctc_posteriors.ok_or(DecodeError::MissingCtcHead)?;
            if x.dim() != (frames, vocab) {
                return Err(DecodeError::PosteriorShape {
                    expected: (frames, vocab),
                    actual: x.dim(),
                });
            }
            Some(CtcPrefixScorer::new(x, blank, eos)?)
        } else {
            None
        };
        let lm = lm.filter(|_| self.config.lm_weight > 0.0);
        // Only CTC scoring runs on the pool.
        let pool = if scorer.is_some() {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(self.config.thread_count())
                    .build()?,
            )
        } else {
            None
        };

        let start = Instant::now();
        log::info!("input lengths: {frames}");
        let maxlen = self.config.max_len(frames);
        let mut config = self.config.clone();
        let mut retries = 0;

        loop {
            let limits = SearchLimits {
                maxlen,
                minlen: config.min_len(frames),
            };
            log::info!("max output length: {}", limits.maxlen);
            log::info!("min output length: {}", limits.minlen);

            let ctx = SearchContext {
                decoder: self.decoder,
                memory,
                ctc: scorer.as_ref(),
                lm,
                config: &config,
                tokens: self.tokens,
                end_detector: &*self.end_detector,
                token_list: self.token_list,
                pool: pool.as_ref(),
            };
            let mut ended = match config.mode {
                SearchMode::Beam => search::beam_search(&ctx, limits)?,
                SearchMode::Greedy => search::greedy_search(&ctx, limits)?,
            };

            if !ended.is_empty() {
                state::sort_by_score_desc(&mut ended);
                if let Some(n) = config.nbest {
                    ended.truncate(n.max(1));
                }
                let nbest: Vec<NBest> = ended.into_iter().map(NBest::from).collect();
                if let Some(best) = nbest.first() {
                    log::info!("total log probability: {}", best.score);
                    log::info!("normalized log probability: {}", best.normalized_score());
                }
                log::debug!("decoding finished in {:?}", start.elapsed());
                return Ok(nbest);
            }

            if retries >= config.max_retries || config.minlenratio <= 0.0 {
                log::warn!("there is no N-best result after {retries} retries");
                return Ok(Vec::new());
            }
            retries += 1;
            config.minlenratio = (config.minlenratio - 0.1).max(0.0);
            log::warn!(
                "there is no N-best result, retrying with minlenratio {}",
                config.minlenratio
            );
        }
    }
}
