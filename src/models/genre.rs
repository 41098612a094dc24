//! Temperature to genre mapping

use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog genre a playlist is built from
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GenreTag {
    Party,
    Pop,
    Rock,
    Classical,
}

impl GenreTag {
    /// Free-text query sent to the catalog
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GenreTag::Party => "party",
            GenreTag::Pop => "pop",
            GenreTag::Rock => "rock",
            GenreTag::Classical => "classical",
        }
    }
}

impl fmt::Display for GenreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a temperature in Celsius to a genre.
///
/// Above 30 is party, 15..=30 is pop, 10..15 is rock, anything else
/// (including NaN) is classical.
#[must_use]
pub fn classify(temperature_celsius: f64) -> GenreTag {
    if temperature_celsius > 30.0 {
        GenreTag::Party
    } else if (15.0..=30.0).contains(&temperature_celsius) {
        GenreTag::Pop
    } else if (10.0..15.0).contains(&temperature_celsius) {
        GenreTag::Rock
    } else {
        GenreTag::Classical
    }
}
