//! Prompt text shared by all sprite generation modes.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Appended to every sprite prompt to steer the model toward isolated,
/// centered pixel art on a plain background.
pub const SPRITE_PROMPT_SUFFIX: &str =
    ", transparent background, no background, centered, clean edges, pixel art style";

/// Negative prompt used by the single-sprite and categorized modes.
pub const NEGATIVE_PROMPT_FULL: &str = "3d render, realistic, photograph, blurry, watermark, text, signature, low quality, deformed, complex background, gradient background, shadow";

/// Shorter negative prompt used for batch test renders.
pub const NEGATIVE_PROMPT_BASIC: &str = "3d render, realistic, photograph, blurry, watermark, text, signature, low quality, deformed, complex background";

/// Which negative prompt wording to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegativePrompt {
    Full,
    Basic,
    Custom(String),
}

impl NegativePrompt {
    pub fn text(&self) -> &str {
        match self {
            Self::Full => NEGATIVE_PROMPT_FULL,
            Self::Basic => NEGATIVE_PROMPT_BASIC,
            Self::Custom(text) => text,
        }
    }
}

impl FromStr for NegativePrompt {
    type Err = CoreError;

    /// `full` and `basic` select the built-in wordings; anything else is
    /// used verbatim. Blank input is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(CoreError::Validation(
                "Negative prompt must not be empty".to_string(),
            )),
            "full" => Ok(Self::Full),
            "basic" => Ok(Self::Basic),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for NegativePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Basic => f.write_str("basic"),
            Self::Custom(text) => f.write_str(text),
        }
    }
}

/// Append [`SPRITE_PROMPT_SUFFIX`] to a user prompt.
pub fn sprite_prompt(prompt: &str) -> String {
    format!("{}{SPRITE_PROMPT_SUFFIX}", prompt.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_prompt_appends_suffix() {
        assert_eq!(
            sprite_prompt("pixel art miner "),
            "pixel art miner, transparent background, no background, centered, clean edges, pixel art style"
        );
    }

    #[test]
    fn negative_keywords() {
        assert_eq!("full".parse::<NegativePrompt>().unwrap(), NegativePrompt::Full);
        assert_eq!("basic".parse::<NegativePrompt>().unwrap(), NegativePrompt::Basic);
        assert!(NegativePrompt::Full.text().ends_with("shadow"));
        assert!(NegativePrompt::Basic.text().ends_with("complex background"));
    }

    #[test]
    fn negative_custom_and_blank() {
        let custom: NegativePrompt = "blurry, noisy".parse().unwrap();
        assert_eq!(custom.text(), "blurry, noisy");
        assert!("   ".parse::<NegativePrompt>().is_err());
    }
}
