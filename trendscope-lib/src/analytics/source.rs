use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// An external source of popularity measurements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString, IntoStaticStr, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Reddit,
    Github,
    Stackoverflow,
    GoogleTrends,
    Freelance,
}

impl Source {
    /// The cache namespace used for raw results fetched from this source.
    #[must_use]
    pub fn namespace(self) -> &'static str {
        self.into()
    }
}

/// What a raw measurement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Unit {
    /// Number of occurrences (mentions, questions, job posts).
    Count,

    /// Position in a ranking, where 1 is best.
    Rank,

    /// A volume or interest index reported by the source.
    Volume,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn display_and_parse_are_snake_case() {
        assert_eq!(Source::GoogleTrends.to_string(), "google_trends");
        assert_eq!(Source::from_str("stackoverflow").unwrap(), Source::Stackoverflow);
        assert_eq!(Unit::from_str("rank").unwrap(), Unit::Rank);
    }

    #[test]
    fn serde_matches_display() {
        let json = serde_json::to_string(&Source::GoogleTrends).unwrap();
        assert_eq!(json, "\"google_trends\"");
        let source: Source = serde_json::from_str("\"reddit\"").unwrap();
        assert_eq!(source, Source::Reddit);
    }

    #[test]
    fn unknown_source_is_rejected() {
        _ = Source::from_str("myspace").unwrap_err();
        _ = serde_json::from_str::<Source>("\"myspace\"").unwrap_err();
    }

    #[test]
    fn namespace_is_source_name() {
        assert_eq!(Source::Github.namespace(), "github");
    }
}
