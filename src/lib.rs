pub mod config;
pub mod ctc;
pub mod decoder;
pub mod error;
pub mod model;
pub mod recognizer;
pub mod vocab;

pub use config::{DecodeConfig, SearchMode};
pub use ctc::{CtcPrefixScorer, CtcPrefixScores, CtcState};
pub use decoder::{
    BeamSearchDecoder, EndDetector, EndedHyp, Hypothesis, NBest, ScoreDecayEndDetector,
    SpecialTokens,
};
pub use error::DecodeError;
pub use model::{AttentionDecoder, CtcHead, Encoder, LanguageModel, NoLanguageModel, TokenId};
pub use recognizer::{NoCtcHead, Recognizer};
pub use vocab::TokenList;
