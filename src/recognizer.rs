use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array2;

use crate::config::DecodeConfig;
use crate::decoder::{BeamSearchDecoder, EndDetector, NBest, ScoreDecayEndDetector, SpecialTokens};
use crate::error::{DecodeError, Result};
use crate::model::{AttentionDecoder, CtcHead, Encoder, LanguageModel, NoLanguageModel};
use crate::vocab::TokenList;

/// Placeholder head for models trained without a CTC branch.
pub struct NoCtcHead<M>(PhantomData<fn(&M)>);

impl<M> Default for NoCtcHead<M> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<M> CtcHead for NoCtcHead<M> {
    type Memory = M;

    fn log_posteriors(&self, _memory: &M, _frames: usize) -> Result<Array2<f32>> {
        Err(DecodeError::MissingCtcHead)
    }
}

/// Encoder, CTC head and attention decoder wired into one recognition call.
pub struct Recognizer<E, D, C> {
    encoder: E,
    decoder: D,
    ctc_head: Option<C>,
    config: DecodeConfig,
    tokens: Option<SpecialTokens>,
    end_detector: Arc<dyn EndDetector>,
    token_list: Option<TokenList>,
}

impl<E, D> Recognizer<E, D, NoCtcHead<E::Memory>>
where
    E: Encoder,
    D: AttentionDecoder<Memory = E::Memory>,
{
    pub fn without_ctc(encoder: E, decoder: D, config: DecodeConfig) -> Self {
        Self::new(encoder, decoder, None, config)
    }
}

impl<E, D, C> Recognizer<E, D, C>
where
    E: Encoder,
    D: AttentionDecoder<Memory = E::Memory>,
    C: CtcHead<Memory = E::Memory>,
{
    pub fn new(encoder: E, decoder: D, ctc_head: Option<C>, config: DecodeConfig) -> Self {
        Self {
            encoder,
            decoder,
            ctc_head,
            config,
            tokens: None,
            end_detector: Arc::new(ScoreDecayEndDetector::default()),
            token_list: None,
        }
    }

    pub fn with_special_tokens(mut self, tokens: SpecialTokens) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_end_detector(mut self, detector: Arc<dyn EndDetector>) -> Self {
        self.end_detector = detector;
        self
    }

    pub fn with_token_list(mut self, list: TokenList) -> Self {
        self.token_list = Some(list);
        self
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn recognize(&self, input: &E::Input) -> Result<Vec<NBest>> {
        self.recognize_with_lm::<NoLanguageModel>(input, None)
    }

    pub fn recognize_with_lm<L: LanguageModel>(
        &self,
        input: &E::Input,
        lm: Option<&L>,
    ) -> Result<Vec<NBest>> {
        // Fail before the encoder runs; `decode_with_lm` checks again.
        self.config.validate()?;
        let start = Instant::now();

        let (memory, frames) = self.encoder.encode(input)?;
        log::debug!("Encoder produced {frames} frames in {:?}", start.elapsed());

        // log P(z_t|X) is only needed when CTC takes part in scoring.
        let log_posteriors = if self.config.ctc_weight > 0.0 {
            let head = self.ctc_head.as_ref().ok_or(DecodeError::MissingCtcHead)?;
            Some(head.log_posteriors(&memory, frames)?)
        } else {
            None
        };
        let lm = lm.filter(|_| self.config.lm_weight > 0.0);

        let mut search = BeamSearchDecoder::new(&self.decoder, self.config.clone())
            .with_end_detector(Arc::clone(&self.end_detector));
        if let Some(tokens) = self.tokens {
            search = search.with_special_tokens(tokens);
        }
        if let Some(list) = &self.token_list {
            search = search.with_token_list(list);
        }

        let results = search.decode_with_lm(
            &memory,
            frames,
            log_posteriors.as_ref().map(|x| x.view()),
            lm,
        )?;
        log::debug!(
            "recognize produced {} hypotheses in {:?}",
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }
}
