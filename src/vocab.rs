use std::fs;
use std::path::Path;

use crate::decoder::SpecialTokens;
use crate::error::{DecodeError, Result};
use crate::model::TokenId;

const SPACE_SYMBOL: &str = "<space>";

/// Token id to text mapping used to render hypotheses in logs.
#[derive(Debug, Clone, Default)]
pub struct TokenList {
    tokens: Vec<String>,
}

impl TokenList {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Accepts `token index` lines or one token per line.
    ///
    /// Indices must fall inside the list; a file with gaps or stray ids is
    /// rejected rather than padded.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let Some(token) = parts.next() else {
                continue;
            };
            let index = match parts.next() {
                Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                    DecodeError::InvalidConfig(format!("invalid token index '{raw}'"))
                })?),
                None => None,
            };
            entries.push((token.replace('\u{2581}', " "), index));
        }

        let size = entries.len();
        let mut tokens = vec![String::new(); size];
        for (position, (token, index)) in entries.into_iter().enumerate() {
            let index = index.unwrap_or(position);
            let slot = tokens.get_mut(index).ok_or_else(|| {
                DecodeError::InvalidConfig(format!(
                    "token index {index} is out of range for {size} tokens"
                ))
            })?;
            *slot = token;
        }
        Ok(Self { tokens })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let list = Self::parse(&content)?;
        log::debug!(
            "Loaded {} tokens from {}",
            list.len(),
            path.as_ref().display()
        );
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn render(&self, ids: &[TokenId], special: &SpecialTokens) -> String {
        let text: String = ids
            .iter()
            .filter(|&&id| id != special.sos && id != special.eos && id != special.blank)
            .map(|&id| match self.get(id) {
                Some(SPACE_SYMBOL) => " ",
                Some(token) => token,
                None => "<unk>",
            })
            .collect();
        text.trim().to_string()
    }
}
