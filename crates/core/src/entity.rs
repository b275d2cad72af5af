use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Minimum confidence an entity must strictly exceed to be acted on.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Category name to the candidates the classifier extracted for it.
///
/// Ordered so that selection walks categories deterministically.
pub type EntityMap = BTreeMap<String, Vec<EntityCandidate>>;

#[derive(Clone, Debug, PartialEq)]
pub enum EntityValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Other(Value),
}

impl EntityValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Value> for EntityValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => match number.as_f64() {
                Some(number) => Self::Number(number),
                None => Self::Other(Value::Number(number)),
            },
            other => Self::Other(other),
        }
    }
}

impl<'de> Deserialize<'de> for EntityValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl Default for EntityValue {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EntityCandidate {
    pub confidence: f64,
    #[serde(default)]
    pub value: EntityValue,
}

impl EntityCandidate {
    pub fn new(confidence: f64, value: impl Into<EntityValue>) -> Self {
        Self { confidence, value: value.into() }
    }
}

impl From<&str> for EntityValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionResult {
    pub category: Option<String>,
    pub entity: Option<EntityCandidate>,
}

impl SelectionResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
    }
}

/// Picks the highest-confidence candidate above [`CONFIDENCE_THRESHOLD`]
/// across every category.
///
/// Categories are visited in key order and candidates in list order; a later
/// candidate only replaces the current best when strictly more confident, so
/// ties go to the first one seen.
pub fn select_top_entity(entities: &EntityMap) -> SelectionResult {
    let mut best: Option<(&str, &EntityCandidate)> = None;

    for (category, candidates) in entities {
        for candidate in candidates {
            if candidate.confidence <= CONFIDENCE_THRESHOLD || candidate.confidence.is_nan() {
                continue;
            }
            let beats_best =
                best.map_or(true, |(_, current)| candidate.confidence > current.confidence);
            if beats_best {
                best = Some((category, candidate));
            }
        }
    }

    match best {
        Some((category, candidate)) => SelectionResult {
            category: Some(category.to_owned()),
            entity: Some(candidate.clone()),
        },
        None => SelectionResult::none(),
    }
}
