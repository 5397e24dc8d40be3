// src/engine/subtest.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four fixed exam sections.
///
/// The sequence order is total and immutable: Tps -> Indo -> Eng -> Mat.
/// Each subtest carries an immutable (question_count, time_limit) pair;
/// Mat has no successor and is therefore the terminal section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtest {
    /// Tes Potensi Skolastik
    Tps,
    /// Literasi Bahasa Indonesia
    Indo,
    /// Literasi Bahasa Inggris
    Eng,
    /// Penalaran Matematika
    Mat,
}

impl Subtest {
    /// The fixed simulation order.
    pub const SEQUENCE: [Subtest; 4] = [Subtest::Tps, Subtest::Indo, Subtest::Eng, Subtest::Mat];

    pub fn first() -> Subtest {
        Subtest::Tps
    }

    /// Successor in the fixed sequence. `None` for the terminal section.
    pub fn next(self) -> Option<Subtest> {
        match self {
            Subtest::Tps => Some(Subtest::Indo),
            Subtest::Indo => Some(Subtest::Eng),
            Subtest::Eng => Some(Subtest::Mat),
            Subtest::Mat => None,
        }
    }

    pub fn question_count(self) -> u32 {
        match self {
            Subtest::Tps => 90,
            Subtest::Indo => 25,
            Subtest::Eng => 20,
            Subtest::Mat => 20,
        }
    }

    /// Time limit in seconds.
    pub fn time_limit_secs(self) -> i64 {
        match self {
            Subtest::Tps => 5400,
            Subtest::Indo => 2250,
            Subtest::Eng => 1800,
            Subtest::Mat => 2250,
        }
    }

    /// Short code used in routes and storage keys.
    pub fn code(self) -> &'static str {
        match self {
            Subtest::Tps => "tps",
            Subtest::Indo => "indo",
            Subtest::Eng => "eng",
            Subtest::Mat => "mat",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Subtest::Tps => "Tes Potensi Skolastik",
            Subtest::Indo => "Literasi Bahasa Indonesia",
            Subtest::Eng => "Literasi Bahasa Inggris",
            Subtest::Mat => "Penalaran Matematika",
        }
    }
}

impl fmt::Display for Subtest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parses both the short codes ("tps") and the long exercise-category
/// slugs ("tes-potensi-skolastik") used in URLs.
impl FromStr for Subtest {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tps" | "tes-potensi-skolastik" => Ok(Subtest::Tps),
            "indo" | "literasi-bahasa-indonesia" => Ok(Subtest::Indo),
            "eng" | "literasi-bahasa-inggris" => Ok(Subtest::Eng),
            "mat" | "penalaran-matematika" => Ok(Subtest::Mat),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_fixed_and_terminal() {
        assert_eq!(Subtest::first(), Subtest::Tps);
        assert_eq!(Subtest::Tps.next(), Some(Subtest::Indo));
        assert_eq!(Subtest::Indo.next(), Some(Subtest::Eng));
        assert_eq!(Subtest::Eng.next(), Some(Subtest::Mat));
        assert_eq!(Subtest::Mat.next(), None);
    }

    #[test]
    fn metadata_pairs() {
        assert_eq!(Subtest::Tps.question_count(), 90);
        assert_eq!(Subtest::Tps.time_limit_secs(), 5400);
        assert_eq!(Subtest::Indo.question_count(), 25);
        assert_eq!(Subtest::Indo.time_limit_secs(), 2250);
        assert_eq!(Subtest::Eng.question_count(), 20);
        assert_eq!(Subtest::Eng.time_limit_secs(), 1800);
        assert_eq!(Subtest::Mat.question_count(), 20);
        assert_eq!(Subtest::Mat.time_limit_secs(), 2250);
    }

    #[test]
    fn parses_both_slug_forms() {
        assert_eq!("tps".parse::<Subtest>(), Ok(Subtest::Tps));
        assert_eq!(
            "literasi-bahasa-inggris".parse::<Subtest>(),
            Ok(Subtest::Eng)
        );
        assert!("history".parse::<Subtest>().is_err());
    }
}
