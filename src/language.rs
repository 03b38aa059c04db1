//! Client language identifiers and the asset path prefixes they map to.

use serde::{Deserialize, Serialize};

/// A language supported by the game client. Determines which localised variant of
/// an asset is loaded when one exists.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Language {
    Japanese,
    English,
    German,
    French,
    ChineseSimplified,
}

impl Language {
    /// Returns the path prefix used for localised icon lookups, including the
    /// trailing slash.
    pub fn icon_prefix(self) -> &'static str {
        match self {
            Language::Japanese => "ja/",
            Language::English => "en/",
            Language::German => "de/",
            Language::French => "fr/",
            Language::ChineseSimplified => "chs/",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}
