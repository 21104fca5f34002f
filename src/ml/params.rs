//! Loosely typed hyperparameter values shared by model specs, grids and config files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// A single hyperparameter value as written in TOML, JSON or on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64, ModelError> {
        match self {
            Self::Int(v) => Ok(*v as f64),
            Self::Float(v) => Ok(*v),
            other => Err(type_error(name, "a number", other)),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize, ModelError> {
        match self {
            Self::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(type_error(name, "a non-negative integer", other)),
        }
    }

    pub fn as_u64(&self, name: &str) -> Result<u64, ModelError> {
        self.as_usize(name).map(|v| v as u64)
    }

    /// Integer or `"none"` (unlimited).
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>, ModelError> {
        match self {
            Self::Text(text) if text.eq_ignore_ascii_case("none") => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool, ModelError> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(type_error(name, "true or false", other)),
        }
    }
}

fn type_error(name: &str, expected: &str, got: &ParamValue) -> ModelError {
    ModelError::InvalidParam {
        name: name.to_string(),
        reason: format!("expected {expected}, got {got}"),
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Parses command-line text: booleans, then integers, then floats, else text.
impl FromStr for ParamValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => {
                if let Ok(v) = s.parse::<i64>() {
                    Self::Int(v)
                } else if let Ok(v) = s.parse::<f64>() {
                    Self::Float(v)
                } else {
                    Self::Text(s.to_string())
                }
            }
        })
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// An ordered assignment of hyperparameter names to values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSet(Vec<(String, ParamValue)>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Set a value, replacing an earlier one with the same name.
    pub fn push(&mut self, name: &str, value: ParamValue) {
        match self.0.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(defaults)");
        }
        for (idx, (name, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for ParamSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
    }
}

/// Per-split feature budget for tree learners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    /// Number of features considered per split, at least one.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::Sqrt => n.sqrt().floor() as usize,
            Self::Log2 => n.log2().floor() as usize,
            Self::All => n_features,
            Self::Count(k) => *k,
            Self::Fraction(frac) => (frac * n).floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl TryFrom<ParamValue> for MaxFeatures {
    type Error = ModelError;

    fn try_from(value: ParamValue) -> Result<Self, Self::Error> {
        match &value {
            ParamValue::Text(text) => match text.to_ascii_lowercase().as_str() {
                "sqrt" | "auto" => Ok(Self::Sqrt),
                "log2" => Ok(Self::Log2),
                "all" | "none" => Ok(Self::All),
                _ => Err(type_error("max_features", "sqrt, log2 or all", &value)),
            },
            ParamValue::Int(k) if *k >= 1 => Ok(Self::Count(*k as usize)),
            ParamValue::Float(frac) if *frac > 0.0 && *frac <= 1.0 => Ok(Self::Fraction(*frac)),
            _ => Err(type_error(
                "max_features",
                "a keyword, a positive count or a fraction in (0, 1]",
                &value,
            )),
        }
    }
}

impl From<MaxFeatures> for ParamValue {
    fn from(value: MaxFeatures) -> Self {
        match value {
            MaxFeatures::Sqrt => Self::Text("sqrt".into()),
            MaxFeatures::Log2 => Self::Text("log2".into()),
            MaxFeatures::All => Self::Text("all".into()),
            MaxFeatures::Count(k) => Self::Int(k as i64),
            MaxFeatures::Fraction(frac) => Self::Float(frac),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_line_values() {
        assert_eq!("true".parse::<ParamValue>().unwrap(), ParamValue::Bool(true));
        assert_eq!("12".parse::<ParamValue>().unwrap(), ParamValue::Int(12));
        assert_eq!("0.5".parse::<ParamValue>().unwrap(), ParamValue::Float(0.5));
        assert_eq!(
            "none".parse::<ParamValue>().unwrap(),
            ParamValue::Text("none".into())
        );
    }

    #[test]
    fn typed_accessors_reject_wrong_kinds() {
        assert_eq!(ParamValue::Int(3).as_f64("c").unwrap(), 3.0);
        assert_eq!(ParamValue::from("none").as_opt_usize("max_depth").unwrap(), None);
        assert_eq!(ParamValue::Int(4).as_opt_usize("max_depth").unwrap(), Some(4));
        assert!(ParamValue::Int(-1).as_usize("n_estimators").is_err());
        assert!(ParamValue::Float(0.5).as_usize("n_estimators").is_err());
        assert!(ParamValue::Int(1).as_bool("bootstrap").is_err());
    }

    #[test]
    fn max_features_resolves_against_width() {
        assert_eq!(MaxFeatures::Sqrt.resolve(48), 6);
        assert_eq!(MaxFeatures::Log2.resolve(48), 5);
        assert_eq!(MaxFeatures::All.resolve(48), 48);
        assert_eq!(MaxFeatures::Count(100).resolve(48), 48);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(48), 24);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(48), 1);
        assert_eq!(
            MaxFeatures::try_from(ParamValue::from("log2")).unwrap(),
            MaxFeatures::Log2
        );
        assert!(MaxFeatures::try_from(ParamValue::Float(1.5)).is_err());
    }

    #[test]
    fn param_set_replaces_and_displays() {
        let mut set = ParamSet::new().with("c", 1.0).with("max_iter", 100i64);
        set.push("c", ParamValue::Float(0.1));
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "c=0.1, max_iter=100");
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"c":0.1,"max_iter":100}"#
        );
    }
}
