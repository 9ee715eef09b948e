//! Typed answers to the extraction and scoring questions.
//!
//! Providers answer with loosely formatted JSON. Every field that may be
//! unanswered is a [`Field`], whose deserializer folds the
//! "No information found" convention into [`Field::NotFound`] at any depth.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

pub const NO_INFORMATION: &str = "No information found";
pub const EXTRACTION_ERROR: &str = "Extraction error";
pub const NARRATIVE_FAILED: &str = "Extraction failed.";
pub const SCORING_FAILED: &str = "Scoring failed";
pub const SUMMARY_FAILED: &str = "Summary failed";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field<T> {
    Found(T),
    #[default]
    NotFound,
    /// No provider produced a usable answer.
    Failed,
}

impl<T> Field<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Field::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Field::Failed)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Found(value) => Field::Found(f(value)),
            Field::NotFound => Field::NotFound,
            Field::Failed => Field::Failed,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Found(value) => value.serialize(serializer),
            Field::NotFound => serializer.serialize_none(),
            Field::Failed => serializer.serialize_str(EXTRACTION_ERROR),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = match normalize_sentinels(Value::deserialize(deserializer)?) {
            Value::Null => return Ok(Field::NotFound),
            value => value,
        };
        let error = match T::deserialize(&value) {
            Ok(found) => return Ok(Field::Found(found)),
            Err(error) => error,
        };
        lenient_scalar(&value)
            .and_then(|coerced| T::deserialize(coerced).ok())
            .map(Field::Found)
            .ok_or_else(|| D::Error::custom(error))
    }
}

/// Second reading of a scalar: numbers as their text, `"true"`/`"false"`
/// as booleans.
fn lenient_scalar(value: &Value) -> Option<Value> {
    match value {
        Value::Number(number) => Some(Value::String(number.to_string())),
        Value::String(text) => text.trim().to_ascii_lowercase().parse::<bool>().ok().map(Value::Bool),
        _ => None,
    }
}

pub fn is_sentinel(text: &str) -> bool {
    text.trim()
        .trim_end_matches(['!', '.'])
        .eq_ignore_ascii_case(NO_INFORMATION)
}

/// Replaces sentinel strings with `null`, recursively. A list holding only
/// sentinels becomes `null`; sentinel items inside a longer list are removed.
pub fn normalize_sentinels(value: Value) -> Value {
    match value {
        Value::String(text) if is_sentinel(&text) => Value::Null,
        Value::Array(items) => {
            let was_empty = items.is_empty();
            let kept: Vec<Value> = items
                .into_iter()
                .map(normalize_sentinels)
                .filter(|item| !item.is_null())
                .collect();
            if kept.is_empty() && !was_empty {
                Value::Null
            } else {
                Value::Array(kept)
            }
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize_sentinels(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Free-text answer: the sentinel becomes `NotFound`, anything else is kept.
pub fn narrative_field(text: &str) -> Field<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || is_sentinel(trimmed) {
        Field::NotFound
    } else {
        Field::Found(trimmed.to_string())
    }
}

/// The outermost `{...}` of a reply, which also drops markdown code fences.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

pub fn parse_structured<T: Extraction>(raw: &str) -> Result<T, String> {
    let object = extract_json_object(raw).ok_or_else(|| "reply holds no JSON object".to_string())?;
    let value: Value = serde_json::from_str(object).map_err(|error| error.to_string())?;
    let parsed = T::deserialize(value).map_err(|error| error.to_string())?;
    parsed.validate()?;
    Ok(parsed)
}

/// A structured question's answer schema.
pub trait Extraction: DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Answer recorded when every attempt failed.
    fn degraded() -> Self;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCategory {
    #[serde(default)]
    pub category: Field<String>,
    #[serde(default)]
    pub is_memecoin: Field<bool>,
}

impl ProjectCategory {
    pub fn is_memecoin(&self) -> bool {
        matches!(self.is_memecoin, Field::Found(true))
    }
}

impl Extraction for ProjectCategory {
    fn degraded() -> Self {
        Self {
            category: Field::Failed,
            is_memecoin: Field::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdentity {
    #[serde(default)]
    pub token_name: Field<String>,
    #[serde(default)]
    pub token_symbol: Field<String>,
    #[serde(default)]
    pub chains: Field<Vec<String>>,
    #[serde(default)]
    pub contract_addresses: Field<Vec<String>>,
}

impl Extraction for TokenIdentity {
    fn degraded() -> Self {
        Self {
            token_name: Field::Failed,
            token_symbol: Field::Failed,
            chains: Field::Failed,
            contract_addresses: Field::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustrySwot {
    #[serde(default)]
    pub industry: Field<String>,
    #[serde(default)]
    pub strengths: Field<Vec<String>>,
    #[serde(default)]
    pub weaknesses: Field<Vec<String>>,
    #[serde(default)]
    pub opportunities: Field<Vec<String>>,
    #[serde(default)]
    pub threats: Field<Vec<String>>,
}

impl Extraction for IndustrySwot {
    fn degraded() -> Self {
        Self {
            industry: Field::Failed,
            strengths: Field::Failed,
            weaknesses: Field::Failed,
            opportunities: Field::Failed,
            threats: Field::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default)]
    pub name: Field<String>,
    #[serde(default)]
    pub role: Field<String>,
    #[serde(default)]
    pub background: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProfile {
    #[serde(default)]
    pub members: Field<Vec<TeamMember>>,
    #[serde(default)]
    pub is_doxxed: Field<bool>,
}

impl Extraction for TeamProfile {
    fn degraded() -> Self {
        Self {
            members: Field::Failed,
            is_doxxed: Field::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    #[serde(default)]
    pub holder: Field<String>,
    #[serde(default)]
    pub share: Field<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokenomics {
    #[serde(default)]
    pub total_supply: Field<String>,
    #[serde(default)]
    pub allocations: Field<Vec<Allocation>>,
    #[serde(default)]
    pub vesting: Field<String>,
    #[serde(default)]
    pub utility: Field<String>,
}

impl Extraction for Tokenomics {
    fn degraded() -> Self {
        Self {
            total_supply: Field::Failed,
            allocations: Field::Failed,
            vesting: Field::Failed,
            utility: Field::Failed,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub score: u8,
    pub description: String,
}

impl Extraction for ScoreResult {
    fn degraded() -> Self {
        Self {
            score: 0,
            description: SCORING_FAILED.to_string(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if (1..=10).contains(&self.score) {
            Ok(())
        } else {
            Err(format!("score {} outside 1..=10", self.score))
        }
    }
}
