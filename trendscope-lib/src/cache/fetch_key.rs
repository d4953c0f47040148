//! Deterministic cache keys.
//!
//! A [`FetchKey`] is rendered as `namespace[:date][:discriminator]`. The
//! discriminator is either an explicit identifier or a fingerprint hashed from
//! request parameters, so that equivalent requests always share a key no matter
//! in which order their parameters or set members were supplied.

use super::FetchError;
use chrono::NaiveDate;
use core::cmp::Ordering;
use core::fmt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Namespace of daily snapshot entries.
pub const SNAPSHOT_NAMESPACE: &str = "trends";

/// Namespace of per-technology history entries.
pub const HISTORY_NAMESPACE: &str = "history";

/// Number of hex digits kept from the parameter hash.
const FINGERPRINT_LEN: usize = 16;

/// 2^63, the smallest float past the end of the `i64` range.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Identity of a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct FetchKey {
    namespace: String,
    date: Option<NaiveDate>,
    discriminator: Option<String>,
}

impl FetchKey {
    /// A key made of a bare namespace.
    pub fn new(namespace: impl Into<String>) -> Result<Self, FetchError> {
        let namespace = namespace.into();
        validate_segment("namespace", &namespace)?;
        Ok(Self {
            namespace,
            date: None,
            discriminator: None,
        })
    }

    /// The key under which the snapshot for `date` is stored: `trends:{date}`.
    #[must_use]
    pub fn snapshot(date: NaiveDate) -> Self {
        Self {
            namespace: SNAPSHOT_NAMESPACE.to_string(),
            date: Some(date),
            discriminator: None,
        }
    }

    /// The key under which the history of a technology is stored: `history:{name}`.
    pub fn history(technology: &str) -> Result<Self, FetchError> {
        Self::new(HISTORY_NAMESPACE)?.with_id(technology)
    }

    /// Start building a key whose discriminator is hashed from parameters.
    #[must_use]
    pub fn builder(namespace: impl Into<String>) -> FetchKeyBuilder {
        FetchKeyBuilder {
            namespace: namespace.into(),
            date: None,
            params: BTreeMap::new(),
            error: None,
        }
    }

    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Use `id` verbatim as the discriminator.
    pub fn with_id(mut self, id: impl Into<String>) -> Result<Self, FetchError> {
        let id = id.into();
        validate_segment("identifier", &id)?;
        self.discriminator = Some(id);
        Ok(self)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    #[must_use]
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace)?;
        if let Some(date) = self.date {
            write!(f, ":{}", date.format("%Y-%m-%d"))?;
        }
        if let Some(discriminator) = &self.discriminator {
            write!(f, ":{discriminator}")?;
        }
        Ok(())
    }
}

/// A parameter value that participates in a key fingerprint.
///
/// Integral floats are stored as [`ParamValue::Integer`], so `10` and `10.0`
/// produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),

    /// Members are sorted and de-duplicated.
    Set(BTreeSet<SetMember>),
}

impl ParamValue {
    fn canonical(self) -> Self {
        match self {
            Self::Float(f) => integral(f).map_or(Self::Float(f), Self::Integer),
            other => other,
        }
    }
}

/// A member of a [`ParamValue::Set`].
///
/// Numbers stay numbers, so `[1, 2]` and `["1", "2"]` fingerprint differently.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SetMember {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SetMember {
    fn number(value: f64) -> Self {
        integral(value).map_or(Self::Float(value), Self::Integer)
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::Float(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl Ord for SetMember {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SetMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SetMember {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SetMember {}

impl From<&str> for SetMember {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for SetMember {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SetMember {
    fn from(value: f64) -> Self {
        Self::number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ParamValue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::Set(iter.into_iter().map(|s| SetMember::from(s.as_ref())).collect())
    }
}

impl From<BTreeSet<SetMember>> for ParamValue {
    fn from(value: BTreeSet<SetMember>) -> Self {
        Self::Set(value)
    }
}

/// Builder for parameter-fingerprinted keys.
#[derive(Debug, Clone)]
pub struct FetchKeyBuilder {
    namespace: String,
    date: Option<NaiveDate>,
    params: BTreeMap<String, ParamValue>,
    error: Option<FetchError>,
}

impl FetchKeyBuilder {
    #[must_use]
    pub const fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Add a parameter. A later parameter with the same name replaces an earlier one.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let name = name.into();
        let value = value.into().canonical();
        let finite = match &value {
            ParamValue::Float(f) => f.is_finite(),
            ParamValue::Set(members) => members.iter().all(|m| !matches!(m, SetMember::Float(f) if !f.is_finite())),
            _ => true,
        };
        if !finite {
            self.fail(format!("parameter '{name}' is not a finite number"));
            return self;
        }
        _ = self.params.insert(name, value);
        self
    }

    /// Add a parameter from loosely-typed JSON.
    ///
    /// Strings, numbers, booleans, and arrays of strings or numbers are accepted.
    /// Anything else (null, objects, nested arrays) makes the key malformed.
    #[must_use]
    pub fn param_json(self, name: impl Into<String>, value: &serde_json::Value) -> Self {
        let name = name.into();
        match json_param(value) {
            Ok(value) => self.param(name, value),
            Err(kind) => {
                let mut this = self;
                this.fail(format!("parameter '{name}' has unsupported type {kind}"));
                this
            }
        }
    }

    /// Produce the key, hashing the canonical form of all parameters.
    pub fn build(self) -> Result<FetchKey, FetchError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut key = FetchKey::new(self.namespace)?;
        key.date = self.date;

        if !self.params.is_empty() {
            let canonical = serde_json::to_string(&self.params).map_err(|e| FetchError::MalformedKey(e.to_string()))?;
            let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
            key.discriminator = digest.get(..FINGERPRINT_LEN).map(str::to_string);
        }

        Ok(key)
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(FetchError::MalformedKey(message));
        }
    }
}

fn json_param(value: &serde_json::Value) -> Result<ParamValue, &'static str> {
    use serde_json::Value;

    match value {
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Bool(b) => Ok(ParamValue::Flag(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(ParamValue::Integer)
            .or_else(|| n.as_f64().map(ParamValue::Float))
            .ok_or("number"),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(SetMember::Text(s.clone())),
                Value::Number(n) => n
                    .as_i64()
                    .map(SetMember::Integer)
                    .or_else(|| n.as_f64().map(SetMember::number))
                    .ok_or("array of numbers"),
                Value::Bool(_) => Err("array of booleans"),
                Value::Null => Err("array containing null"),
                Value::Array(_) | Value::Object(_) => Err("nested collection"),
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(ParamValue::Set),
        Value::Null => Err("null"),
        Value::Object(_) => Err("object"),
    }
}

/// The integer an integral float stands for.
#[expect(clippy::cast_possible_truncation, reason = "the value is integral and within the i64 range")]
fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(&value)).then(|| value as i64)
}

fn validate_segment(what: &str, value: &str) -> Result<(), FetchError> {
    if value.trim().is_empty() {
        return Err(FetchError::MalformedKey(format!("{what} must not be empty")));
    }
    if value.contains(':') || value.contains(['/', '\\']) || value.chars().any(char::is_control) {
        return Err(FetchError::MalformedKey(format!("{what} '{value}' contains a reserved character")));
    }
    Ok(())
}
