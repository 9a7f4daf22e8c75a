//! Global stop-word filter.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use warden_common::WardenError;

use crate::store::{Store, StoreResult};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Case-folded words of a message, split on Unicode word boundaries
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(text).map(|m| m.as_str().to_lowercase())
}

/// First token of `text` found in `words`
pub fn find_stop_word(text: &str, words: &HashSet<String>) -> Option<String> {
    if words.is_empty() {
        return None;
    }
    tokenize(text).find(|token| words.contains(token))
}

/// Parse a comma-separated word list. Blank entries are dropped, duplicates kept once.
pub fn parse_word_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Stop-word set backed by the store
#[derive(Clone)]
pub struct StopWordFilter {
    store: Arc<dyn Store>,
}

impl StopWordFilter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Matching stop-word, if any
    pub async fn check(&self, text: &str) -> StoreResult<Option<String>> {
        let words = self.store.stop_words().await?;
        Ok(find_stop_word(text, &words))
    }

    /// Replace the whole set from an uploaded text file. Returns the new word count.
    pub async fn replace_from_upload(&self, bytes: &[u8]) -> Result<usize, WardenError> {
        let raw = std::str::from_utf8(bytes).map_err(|_| {
            WardenError::InvalidInput("The stop-word file must be UTF-8 text.".to_string())
        })?;

        let words = parse_word_list(raw);
        if words.is_empty() {
            return Err(WardenError::InvalidInput(
                "The file has no words. Use a comma-separated list: spam, scam, casino".to_string(),
            ));
        }

        self.store.replace_stop_words(&words).await?;
        Ok(words.len())
    }

    pub async fn count(&self) -> StoreResult<usize> {
        Ok(self.store.stop_words().await?.len())
    }
}
