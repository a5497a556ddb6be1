//! Vocabulary tables and character-level tokenization for the VITS backend.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::error::{VaaniError, VaaniResult};

/// Token id used as the interleaving blank/separator.
pub const BLANK_ID: i64 = 0;

/// Vocabulary key that supplies the id for characters missing from the table.
const UNKNOWN_TOKEN: &str = "<UNK>";

/// Token-to-id mapping for a VITS model, parsed once per language.
///
/// Immutable after load; lookups fall back to the `<UNK>` id (or 0 when the
/// table has none).
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    map: HashMap<String, i64>,
    unknown_id: i64,
}

impl Vocabulary {
    /// Parse a vocabulary from UTF-8 JSON bytes (a flat token-to-id object).
    ///
    /// # Errors
    ///
    /// Returns a model load error when the bytes are not UTF-8 or not the
    /// expected JSON shape.
    pub fn from_json_bytes(bytes: &[u8]) -> VaaniResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| VaaniError::model_load(format!("vocabulary is not UTF-8: {e}")))?;
        let map: HashMap<String, i64> = serde_json::from_str(text)
            .map_err(|e| VaaniError::model_load(format!("failed to parse vocabulary: {e}")))?;
        let unknown_id = map.get(UNKNOWN_TOKEN).copied().unwrap_or(0);
        Ok(Self { map, unknown_id })
    }

    /// Number of tokens in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Id for a single character, with the space and unknown fallbacks.
    #[must_use]
    pub fn id_of(&self, ch: char) -> i64 {
        let mut buf = [0u8; 4];
        let key: &str = ch.encode_utf8(&mut buf);
        if let Some(&id) = self.map.get(key) {
            return id;
        }
        if ch == ' ' {
            if let Some(&id) = self.map.get(" ") {
                return id;
            }
        }
        self.unknown_id
    }
}

/// Tokenize `text` for VITS inference.
///
/// Every character maps to its vocabulary id and the sequence is interleaved
/// with [`BLANK_ID`] on both sides: one leading blank, then for each character
/// its id followed by a blank. The result always has `2n + 1` entries for `n`
/// input characters and is never empty.
///
/// Input is NFC-normalized first so composed and decomposed forms of the same
/// character hit the same vocabulary entry.
#[must_use]
pub fn tokenize_vits(text: &str, vocab: &Vocabulary) -> Vec<i64> {
    let normalized: String = text.nfc().collect();
    let mut ids = Vec::with_capacity(normalized.chars().count() * 2 + 1);
    ids.push(BLANK_ID);
    for ch in normalized.chars() {
        ids.push(vocab.id_of(ch));
        ids.push(BLANK_ID);
    }
    ids
}
