//! Payload validators applied to every live source result.
//!
//! A rejection is treated exactly like a source error for circuit purposes,
//! but is recorded as `rejected` in the attempt chain and logged with its own
//! message.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::Value;

use crate::ValidationError;

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    reason: String,
}

impl ValidationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ValidationFailure {}

/// Decides whether a raw payload is acceptable.
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &Value) -> Result<(), ValidationFailure>;
}

/// Expected payload shapes shared by most callers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// Anything except `null`, `""`, `[]` and `{}`.
    #[default]
    Any,
    /// A JSON array with at least one element.
    NonEmptyArray,
    /// An object where every listed field is present and not `null`.
    ObjectWith(Vec<String>),
    /// An object whose field holds a number, or a string that parses as one.
    NumericField(String),
}

impl PayloadShape {
    pub fn object_with<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ObjectWith(fields.into_iter().map(Into::into).collect())
    }

    pub fn numeric_field(field: impl Into<String>) -> Self {
        Self::NumericField(field.into())
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(number) => number.as_f64().is_some_and(f64::is_finite),
        Value::String(text) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

impl Validator for PayloadShape {
    fn validate(&self, payload: &Value) -> Result<(), ValidationFailure> {
        match self {
            Self::Any => {
                if is_empty_payload(payload) {
                    return Err(ValidationFailure::new("payload is empty"));
                }
            }
            Self::NonEmptyArray => match payload {
                Value::Array(items) if !items.is_empty() => {}
                Value::Array(_) => return Err(ValidationFailure::new("array is empty")),
                _ => return Err(ValidationFailure::new("payload is not an array")),
            },
            Self::ObjectWith(fields) => {
                let Value::Object(object) = payload else {
                    return Err(ValidationFailure::new("payload is not an object"));
                };
                if let Some(missing) = fields
                    .iter()
                    .find(|field| object.get(field.as_str()).map_or(true, Value::is_null))
                {
                    return Err(ValidationFailure::new(format!(
                        "field '{missing}' is missing or null"
                    )));
                }
            }
            Self::NumericField(field) => {
                let Value::Object(object) = payload else {
                    return Err(ValidationFailure::new("payload is not an object"));
                };
                match object.get(field.as_str()) {
                    Some(value) if is_numeric(value) => {}
                    Some(_) => {
                        return Err(ValidationFailure::new(format!(
                            "field '{field}' is not numeric"
                        )))
                    }
                    None => {
                        return Err(ValidationFailure::new(format!(
                            "field '{field}' is missing"
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

impl Display for PayloadShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::NonEmptyArray => f.write_str("array"),
            Self::ObjectWith(fields) => write!(f, "fields:{}", fields.join(",")),
            Self::NumericField(field) => write!(f, "number:{field}"),
        }
    }
}

/// Parses the command line form: `any`, `array`, `fields:a,b`, `number:field`.
impl FromStr for PayloadShape {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidShape {
            value: input.to_owned(),
        };
        let value = input.trim();

        match value.split_once(':') {
            None if value.eq_ignore_ascii_case("any") => Ok(Self::Any),
            None if value.eq_ignore_ascii_case("array") => Ok(Self::NonEmptyArray),
            None => Err(invalid()),
            Some((kind, rest)) => {
                let rest = rest.trim();
                match kind.trim().to_ascii_lowercase().as_str() {
                    "fields" => {
                        let fields = rest
                            .split(',')
                            .map(str::trim)
                            .filter(|field| !field.is_empty())
                            .map(str::to_owned)
                            .collect::<Vec<_>>();
                        if fields.is_empty() {
                            return Err(invalid());
                        }
                        Ok(Self::ObjectWith(fields))
                    }
                    "number" if !rest.is_empty() => Ok(Self::NumericField(rest.to_owned())),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

/// Adapts a predicate closure into a [`Validator`].
pub struct FnValidator<F> {
    f: F,
}

pub fn validator_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&Value) -> Result<(), ValidationFailure> + Send + Sync,
{
    FnValidator { f }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<(), ValidationFailure> + Send + Sync,
{
    fn validate(&self, payload: &Value) -> Result<(), ValidationFailure> {
        (self.f)(payload)
    }
}
