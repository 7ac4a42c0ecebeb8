//! Wire format of the aggregated continuation token
//!
//! A merged token is JSON of the form
//! `{"provs":[{"id":"duckduckgo","tok":"<base64>"}],"cur":1}` where `tok` is
//! the provider's own opaque sub-token and `cur` indexes the entry that
//! serves next on resumption.
//!
//! `cur` is never the entry that served the last result: it is the one after
//! it, or 0 when the capture happened at a page boundary. A resumed merge
//! places its cursor just before `cur`, so the first `next` lands on it.

use super::iterator::Token;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// One provider's share of a merged token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToken {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub tok: Vec<u8>,
}

/// Decoded form of a merged token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiToken {
    #[serde(default)]
    pub provs: Vec<ProviderToken>,
    /// Index into `provs` of the provider that serves next
    #[serde(default)]
    pub cur: usize,
}

impl MultiToken {
    pub fn push(&mut self, id: impl Into<String>, tok: Token) {
        self.provs.push(ProviderToken {
            id: id.into(),
            tok: tok.into_bytes(),
        });
    }

    pub fn encode(&self) -> Result<Token> {
        serde_json::to_vec(self)
            .map(Token::new)
            .map_err(|e| SearchError::Token(e.to_string()))
    }

    /// Decode and validate a merged token
    pub fn decode(tok: &Token) -> Result<Self> {
        let t: MultiToken = serde_json::from_slice(tok.as_bytes())
            .map_err(|e| SearchError::Token(e.to_string()))?;
        if t.cur > t.provs.len() {
            return Err(SearchError::Token(format!(
                "cursor {} out of range for {} providers",
                t.cur,
                t.provs.len()
            )));
        }
        Ok(t)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
