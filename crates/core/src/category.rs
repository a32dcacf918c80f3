//! Asset categories that partition the project sprite trees.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Fixed classification deciding where a categorized sprite is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Characters,
    Items,
    Tiles,
    Ui,
}

impl Category {
    /// All recognized categories.
    pub const ALL: &'static [Category] = &[Self::Characters, Self::Items, Self::Tiles, Self::Ui];

    /// Directory name used inside the asset trees.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Items => "items",
            Self::Tiles => "tiles",
            Self::Ui => "ui",
        }
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown category '{s}'. Valid categories: {}",
                    valid.join(", ")
                ))
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
