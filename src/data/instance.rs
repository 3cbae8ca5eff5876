use serde::{Deserialize, Serialize};

use super::attribute::Value;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Instance – one weighted row
// ---------------------------------------------------------------------------

/// One row: internal values positionally aligned with a dataset's schema.
///
/// An instance does not carry its schema; whichever dataset stores it
/// supplies the attributes that give its values meaning. Missing values are
/// `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    values: Vec<f64>,
    weight: f64,
}

impl Instance {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    /// Wrap already-coerced internal values.
    pub fn new(values: Vec<f64>, weight: f64) -> Result<Self> {
        check_weight(weight)?;
        Ok(Instance { values, weight })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) -> Result<()> {
        check_weight(weight)?;
        self.weight = weight;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_missing(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(|v| v.is_nan())
    }

    pub(crate) fn push_missing(&mut self) {
        self.values.push(f64::NAN);
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

pub(crate) fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(DatasetError::InvalidWeight(weight))
    }
}

// ---------------------------------------------------------------------------
// RowInput – what `add_instance` accepts
// ---------------------------------------------------------------------------

/// A row to insert: either raw external values that still need coercion, or
/// an instance already conformant to the target schema (only re-weighted).
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Raw(Vec<Value>),
    Conformant(Instance),
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        RowInput::Raw(values)
    }
}

impl From<Instance> for RowInput {
    fn from(instance: Instance) -> Self {
        RowInput::Conformant(instance)
    }
}

impl From<&Instance> for RowInput {
    fn from(instance: &Instance) -> Self {
        RowInput::Conformant(instance.clone())
    }
}

/// Build a raw row from heterogeneous literals: `row![42, "no", None::<f64>]`.
#[macro_export]
macro_rules! row {
    ($($v:expr),* $(,)?) => {
        $crate::data::instance::RowInput::Raw(vec![$($crate::data::attribute::Value::from($v)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_must_be_finite_and_non_negative() {
        assert!(Instance::new(vec![1.0], 0.0).is_ok());
        assert_eq!(
            Instance::new(vec![1.0], -1.0),
            Err(DatasetError::InvalidWeight(-1.0))
        );
        let mut inst = Instance::new(vec![], 1.0).unwrap();
        assert!(inst.set_weight(f64::INFINITY).is_err());
        assert_eq!(inst.weight(), 1.0);
    }

    #[test]
    fn missing_is_nan() {
        let inst = Instance::new(vec![1.0, f64::NAN], 1.0).unwrap();
        assert!(!inst.is_missing(0));
        assert!(inst.is_missing(1));
        assert!(!inst.is_missing(5));
    }

    #[test]
    fn row_macro_builds_raw_input() {
        let row = row![42, "no", None::<f64>];
        assert_eq!(
            row,
            RowInput::Raw(vec![Value::Number(42.0), Value::from("no"), Value::Missing])
        );
    }
}
