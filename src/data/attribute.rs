use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Default pattern for date attributes: ISO-8601 without a zone.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Internal representation of a missing value, for every attribute kind.
pub const MISSING: f64 = f64::NAN;

// ---------------------------------------------------------------------------
// Value – a single external (displayable) cell
// ---------------------------------------------------------------------------

/// An external value as it arrives from a caller or a file, before coercion.
///
/// Serialises untagged so JSON rows read naturally: `[42, "no", null]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", format_number(*v)),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => write!(f, "?"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

/// Integral numbers print without a fractional part so `42.0` stringifies
/// as the nominal label `"42"`.
pub(crate) fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// AttributeKind – the column type
// ---------------------------------------------------------------------------

/// The type of a column, with the options that type requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    Numeric,
    /// Closed label set; the position of a label is its internal code.
    Nominal { values: Vec<String> },
    String,
    /// `format` is a chrono strftime pattern.
    Date { format: String },
}

impl AttributeKind {
    pub fn nominal<S: AsRef<str>>(values: &[S]) -> Self {
        AttributeKind::Nominal {
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn date(format: &str) -> Self {
        AttributeKind::Date {
            format: format.to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AttributeKind::Numeric => "numeric",
            AttributeKind::Nominal { .. } => "nominal",
            AttributeKind::String => "string",
            AttributeKind::Date { .. } => "date",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Attribute – one column of the schema
// ---------------------------------------------------------------------------

/// A typed column definition.
///
/// The name and kind are fixed at construction. String attributes also keep
/// a pool of interned literals; a string's internal value is its pool index.
/// Equality compares the definition (name and kind) and ignores the pool.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    /// label → internal code, for nominal labels and interned strings.
    codes: BTreeMap<String, usize>,
    /// Interned literals of a string attribute, in code order.
    pool: Vec<String>,
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.same_definition(other)
    }
}

impl Attribute {
    /// Build an attribute, validating that the kind carries its options.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DatasetError::invalid_attribute(&name, "name is empty"));
        }

        let mut codes = BTreeMap::new();
        match &kind {
            AttributeKind::Nominal { values } => {
                if values.is_empty() {
                    return Err(DatasetError::invalid_attribute(
                        &name,
                        "nominal attribute needs at least one value",
                    ));
                }
                for (i, v) in values.iter().enumerate() {
                    if codes.insert(v.clone(), i).is_some() {
                        return Err(DatasetError::invalid_attribute(
                            &name,
                            format!("nominal value '{v}' is declared twice"),
                        ));
                    }
                }
            }
            AttributeKind::Date { format } if format.trim().is_empty() => {
                return Err(DatasetError::invalid_attribute(
                    &name,
                    "date attribute needs a format",
                ));
            }
            AttributeKind::Date { format } => {
                if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                    return Err(DatasetError::invalid_attribute(
                        &name,
                        format!("'{format}' is not a valid date format"),
                    ));
                }
            }
            _ => {}
        }

        Ok(Attribute {
            name,
            kind,
            codes,
            pool: Vec::new(),
        })
    }

    pub fn numeric(name: impl Into<String>) -> Result<Self> {
        Self::new(name, AttributeKind::Numeric)
    }

    pub fn nominal<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Result<Self> {
        Self::new(name, AttributeKind::nominal(values))
    }

    pub fn string(name: impl Into<String>) -> Result<Self> {
        Self::new(name, AttributeKind::String)
    }

    pub fn date(name: impl Into<String>, format: &str) -> Result<Self> {
        Self::new(name, AttributeKind::date(format))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, AttributeKind::Numeric)
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self.kind, AttributeKind::Nominal { .. })
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, AttributeKind::String)
    }

    pub fn is_date(&self) -> bool {
        matches!(self.kind, AttributeKind::Date { .. })
    }

    /// Declared labels of a nominal attribute; empty for other kinds.
    pub fn nominal_values(&self) -> &[String] {
        match &self.kind {
            AttributeKind::Nominal { values } => values,
            _ => &[],
        }
    }

    /// Literals interned so far by a string attribute.
    pub fn string_values(&self) -> &[String] {
        &self.pool
    }

    pub fn date_format(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Date { format } => Some(format),
            _ => None,
        }
    }

    /// Number of distinct labels (nominal) or interned literals (string).
    pub fn num_values(&self) -> usize {
        match &self.kind {
            AttributeKind::Nominal { values } => values.len(),
            AttributeKind::String => self.pool.len(),
            _ => 0,
        }
    }

    /// Code of a nominal label or interned string, if known.
    pub fn index_of_value(&self, label: &str) -> Option<usize> {
        self.codes.get(label).copied()
    }

    /// Same name and kind. The string pool does not take part.
    pub fn same_definition(&self, other: &Attribute) -> bool {
        self.name == other.name && self.kind == other.kind
    }

    /// Coerce an external value into this attribute's internal numeric code.
    ///
    /// * numeric: parsed as `f64`
    /// * nominal: index of the stringified value among the declared labels
    /// * string:  index in the interned pool (interned on first sight)
    /// * date:    milliseconds since the Unix epoch, parsed with the format
    ///
    /// [`Value::Missing`] maps to [`MISSING`] for every kind.
    pub fn internal_value_of(&mut self, value: &Value) -> Result<f64> {
        let text = match value {
            Value::Missing => return Ok(MISSING),
            other => other.to_string(),
        };
        match &self.kind {
            AttributeKind::Numeric => {
                if let Value::Number(n) = value {
                    return Ok(*n);
                }
                match text.trim().parse::<f64>() {
                    Ok(n) if !n.is_nan() => Ok(n),
                    _ => Err(DatasetError::coercion(&self.name, &text, "not a number")),
                }
            }
            AttributeKind::Nominal { .. } => self
                .index_of_value(&text)
                .map(|i| i as f64)
                .ok_or_else(|| {
                    DatasetError::coercion(&self.name, &text, "not a declared nominal value")
                }),
            AttributeKind::Date { format } => parse_date(format, text.trim()).ok_or_else(|| {
                DatasetError::coercion(
                    &self.name,
                    &text,
                    format!("does not match date format '{format}'"),
                )
            }),
            // the only open value set: intern and never fail
            AttributeKind::String => Ok(self.intern_owned(text) as f64),
        }
    }

    /// Inverse of [`internal_value_of`](Self::internal_value_of); `None` for
    /// missing values and for codes outside the label set.
    pub fn external_value_of(&self, internal: f64) -> Option<String> {
        if internal.is_nan() {
            return None;
        }
        match &self.kind {
            AttributeKind::Numeric => Some(format_number(internal)),
            AttributeKind::Nominal { values } => code(internal).and_then(|i| values.get(i)).cloned(),
            AttributeKind::String => code(internal).and_then(|i| self.pool.get(i)).cloned(),
            AttributeKind::Date { format } => format_date(format, internal),
        }
    }

    /// Add a literal to the string pool, returning its code. Existing
    /// literals keep their code.
    pub(crate) fn intern(&mut self, literal: &str) -> usize {
        match self.codes.get(literal) {
            Some(&i) => i,
            None => self.intern_owned(literal.to_string()),
        }
    }

    fn intern_owned(&mut self, literal: String) -> usize {
        if let Some(&i) = self.codes.get(&literal) {
            return i;
        }
        let i = self.pool.len();
        self.codes.insert(literal.clone(), i);
        self.pool.push(literal);
        i
    }
}

fn code(internal: f64) -> Option<usize> {
    (internal >= 0.0 && internal.fract() == 0.0).then_some(internal as usize)
}

/// Patterns with a UTC offset first, then zone-less date-times read as UTC,
/// then date-only patterns at midnight UTC.
fn parse_date(format: &str, text: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Some(dt.timestamp_millis() as f64);
    }
    let dt = NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;
    Some(dt.and_utc().timestamp_millis() as f64)
}

/// Rendered in UTC, so offset fields print as `+0000`.
fn format_date(format: &str, internal: f64) -> Option<String> {
    let dt = DateTime::<Utc>::from_timestamp_millis(internal as i64)?;
    let mut out = String::new();
    write!(out, "{}", dt.format(format)).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_malformed_declarations() {
        assert!(matches!(
            Attribute::numeric(""),
            Err(DatasetError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            Attribute::nominal("label", &[] as &[&str]),
            Err(DatasetError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            Attribute::nominal("label", &["a", "a"]),
            Err(DatasetError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            Attribute::date("when", " "),
            Err(DatasetError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn numeric_parses_numbers_and_numeric_text() {
        let mut age = Attribute::numeric("age").unwrap();
        assert_eq!(age.internal_value_of(&Value::from(42)).unwrap(), 42.0);
        assert_eq!(age.internal_value_of(&Value::from(" 3.5 ")).unwrap(), 3.5);
        let err = age.internal_value_of(&Value::from("old")).unwrap_err();
        assert!(matches!(err, DatasetError::ValueCoercion { .. }));
        assert!(age.internal_value_of(&Value::from("NaN")).is_err());
    }

    #[test]
    fn nominal_codes_follow_declaration_order() {
        let values = ["yes", "no", "unsure"];
        let mut label = Attribute::nominal("label", &values).unwrap();
        for (i, v) in values.iter().enumerate() {
            assert_eq!(label.internal_value_of(&Value::from(*v)).unwrap(), i as f64);
        }
        assert!(matches!(
            label.internal_value_of(&Value::from("maybe")),
            Err(DatasetError::ValueCoercion { .. })
        ));
        // no implicit categories
        assert_eq!(label.num_values(), 3);
    }

    #[test]
    fn nominal_lookup_uses_stringified_numbers() {
        let mut grade = Attribute::nominal("grade", &["1", "2", "2.5"]).unwrap();
        assert_eq!(grade.internal_value_of(&Value::from(2)).unwrap(), 1.0);
        assert_eq!(grade.internal_value_of(&Value::Number(2.5)).unwrap(), 2.0);
    }

    #[test]
    fn string_interns_literals() {
        let mut note = Attribute::string("note").unwrap();
        assert_eq!(note.internal_value_of(&Value::from("a")).unwrap(), 0.0);
        assert_eq!(note.internal_value_of(&Value::from("b")).unwrap(), 1.0);
        assert_eq!(note.internal_value_of(&Value::from("a")).unwrap(), 0.0);
        assert_eq!(note.internal_value_of(&Value::from(7)).unwrap(), 2.0);
        assert_eq!(note.string_values(), ["a", "b", "7"]);
        assert_eq!(note.external_value_of(1.0).as_deref(), Some("b"));
    }

    #[test]
    fn date_parses_with_format() {
        let mut when = Attribute::date("when", "%Y-%m-%d").unwrap();
        let ms = when.internal_value_of(&Value::from("1970-01-02")).unwrap();
        assert_eq!(ms, 86_400_000.0);
        assert_eq!(when.external_value_of(ms).as_deref(), Some("1970-01-02"));
        assert!(matches!(
            when.internal_value_of(&Value::from("02/01/1970")),
            Err(DatasetError::ValueCoercion { .. })
        ));

        let mut stamp = Attribute::date("stamp", DEFAULT_DATE_FORMAT).unwrap();
        let ms = stamp
            .internal_value_of(&Value::from("1970-01-01T00:00:01"))
            .unwrap();
        assert_eq!(ms, 1000.0);
    }

    #[test]
    fn date_honours_utc_offsets() {
        let mut stamp = Attribute::date("stamp", "%Y-%m-%dT%H:%M:%S%z").unwrap();
        let ms = stamp
            .internal_value_of(&Value::from("2024-01-01T10:00:00+0200"))
            .unwrap();
        assert_eq!(ms, 1_704_096_000_000.0);
        let shown = stamp.external_value_of(ms);
        assert_eq!(shown.as_deref(), Some("2024-01-01T08:00:00+0000"));
        assert_eq!(stamp.internal_value_of(&Value::from(shown.unwrap())).unwrap(), ms);
    }

    #[test]
    fn date_rejects_unknown_format_specifiers() {
        assert!(matches!(
            Attribute::date("d", "%Y-%Q"),
            Err(DatasetError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            Attribute::new("d", AttributeKind::date("%")),
            Err(DatasetError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn missing_maps_to_nan_for_every_kind() {
        let mut attrs = [
            Attribute::numeric("n").unwrap(),
            Attribute::nominal("c", &["x"]).unwrap(),
            Attribute::string("s").unwrap(),
            Attribute::date("d", DEFAULT_DATE_FORMAT).unwrap(),
        ];
        for a in &mut attrs {
            assert!(a.internal_value_of(&Value::Missing).unwrap().is_nan());
            assert_eq!(a.external_value_of(MISSING), None);
        }
    }

    #[test]
    fn equality_ignores_string_pool() {
        let mut a = Attribute::string("s").unwrap();
        let b = Attribute::string("s").unwrap();
        a.intern("hello");
        assert_eq!(a, b);
        assert_ne!(a, Attribute::numeric("s").unwrap());
    }

    #[test]
    fn values_deserialize_untagged() {
        let row: Vec<Value> = serde_json::from_str(r#"[42, "no", null]"#).unwrap();
        assert_eq!(
            row,
            vec![Value::Number(42.0), Value::from("no"), Value::Missing]
        );
    }
}
