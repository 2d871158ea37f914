use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Activation strategy shown to the user in place of the `constant` and
/// `vectorized` document flags.
/// 取代文件中 `constant`／`vectorized` 旗標的啟用策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Normal,
    Constant,
    Vectorized,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Normal, Strategy::Constant, Strategy::Vectorized];

    /// Expands the strategy into `(constant, vectorized)`.
    /// 將策略展開為 `(constant, vectorized)`。
    pub fn to_flags(self) -> (bool, bool) {
        match self {
            Strategy::Normal => (false, false),
            Strategy::Constant => (true, false),
            Strategy::Vectorized => (true, true),
        }
    }

    /// Collapses the two flags into a strategy. `vectorized` wins over
    /// `constant`, which is the only resolution for `(true, true)` and for
    /// the legacy `(false, true)` pair.
    /// 將兩個旗標合併為策略；`vectorized` 優先於 `constant`。
    pub fn from_flags(constant: bool, vectorized: bool) -> Self {
        if vectorized {
            Strategy::Vectorized
        } else if constant {
            Strategy::Constant
        } else {
            Strategy::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Normal => "normal",
            Strategy::Constant => "constant",
            Strategy::Vectorized => "vectorized",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown strategy '{0}' (expected normal, constant or vectorized)")]
pub struct ParseStrategyError(String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Strategy::Normal),
            "constant" => Ok(Strategy::Constant),
            "vectorized" => Ok(Strategy::Vectorized),
            _ => Err(ParseStrategyError(value.to_string())),
        }
    }
}
