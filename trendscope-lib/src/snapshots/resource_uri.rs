use crate::Result;
use chrono::NaiveDate;
use core::fmt;
use core::str::FromStr;
use ohno::{IntoAppError, bail};

const TRENDS_PREFIX: &str = "cache://trends/";
const HISTORY_PREFIX: &str = "history://technology/";

/// An address of a readable document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceUri {
    /// `cache://trends/{date}`: the snapshot for a calendar date.
    Trends(NaiveDate),

    /// `history://technology/{name}`: the history of one technology.
    TechnologyHistory(String),
}

impl FromStr for ResourceUri {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(date) = s.strip_prefix(TRENDS_PREFIX) {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .into_app_err_with(|| format!("'{date}' in '{s}' is not an ISO 8601 date (YYYY-MM-DD)"))?;
            return Ok(Self::Trends(date));
        }

        if let Some(name) = s.strip_prefix(HISTORY_PREFIX) {
            if name.is_empty() || name.contains('/') {
                bail!("'{s}' does not name a single technology");
            }
            return Ok(Self::TechnologyHistory(name.to_string()));
        }

        bail!("unsupported resource '{s}', expected '{TRENDS_PREFIX}{{date}}' or '{HISTORY_PREFIX}{{name}}'")
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trends(date) => write!(f, "{TRENDS_PREFIX}{}", date.format("%Y-%m-%d")),
            Self::TechnologyHistory(name) => write!(f, "{HISTORY_PREFIX}{name}"),
        }
    }
}
