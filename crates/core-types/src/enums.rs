use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The string form of the native-currency sentinel.
const NATIVE: &str = "native";

/// An asset a fund can hold, price or swap.
///
/// `Native` is the chain's native currency; every other asset is referenced by
/// an opaque token handle (a contract address, a mint, a ticker...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    Native,
    Token(String),
}

impl Asset {
    /// Shorthand for `Asset::Token(handle.into())`.
    pub fn token(handle: impl Into<String>) -> Self {
        Asset::Token(handle.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str(NATIVE),
            Asset::Token(handle) => f.write_str(handle),
        }
    }
}

impl FromStr for Asset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput(
                "asset".to_string(),
                "asset handle cannot be empty".to_string(),
            ));
        }
        if trimmed.eq_ignore_ascii_case(NATIVE) {
            Ok(Asset::Native)
        } else {
            Ok(Asset::Token(trimmed.to_string()))
        }
    }
}

impl TryFrom<String> for Asset {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}
