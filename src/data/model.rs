use std::collections::BTreeSet;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::attribute::{Attribute, AttributeKind, Value};
use super::instance::{Instance, RowInput, check_weight};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// AttributeSpec – declarative schema entry
// ---------------------------------------------------------------------------

/// One attribute declaration for [`Dataset::add_attributes`].
///
/// Deserialises from `{"name": "label", "type": "nominal", "values": [..],
/// "class_attribute": true}` so schemas can live in JSON config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub class_attribute: bool,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        AttributeSpec {
            name: name.into(),
            kind,
            class_attribute: false,
        }
    }

    pub fn as_class(mut self) -> Self {
        self.class_attribute = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Dataset – schema + weighted rows
// ---------------------------------------------------------------------------

/// A named schema of attributes and an ordered sequence of instances.
///
/// Every stored instance has exactly one value per attribute. Attribute
/// names are unique, and the class attribute, when set, indexes into the
/// schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    relation_name: String,
    attributes: Vec<Attribute>,
    instances: Vec<Instance>,
    class_index: Option<usize>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RELATION)
    }
}

impl Dataset {
    pub const DEFAULT_RELATION: &'static str = "Instances";

    /// An empty dataset with no attributes.
    pub fn new(relation_name: impl Into<String>) -> Self {
        Dataset {
            relation_name: relation_name.into(),
            attributes: Vec::new(),
            instances: Vec::new(),
            class_index: None,
        }
    }

    /// An empty dataset over an initial schema.
    pub fn with_attributes(
        relation_name: impl Into<String>,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Result<Self> {
        let mut dataset = Self::new(relation_name);
        for attribute in attributes {
            dataset.add_attribute(attribute)?;
        }
        Ok(dataset)
    }

    /// A copy of the schema and class designation, without instances.
    pub fn header(&self) -> Self {
        Dataset {
            relation_name: self.relation_name.clone(),
            attributes: self.attributes.clone(),
            instances: Vec::new(),
            class_index: self.class_index,
        }
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn set_relation_name(&mut self, name: impl Into<String>) {
        self.relation_name = name.into();
    }

    // -- schema building --

    /// Append an attribute at the end of the schema.
    ///
    /// Instances stored before the call are padded with a missing value so
    /// every row keeps one value per attribute.
    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<&mut Self> {
        if self.attribute_index(attribute.name()).is_some() {
            return Err(DatasetError::DuplicateAttribute(attribute.name().to_string()));
        }
        if !self.instances.is_empty() {
            warn!(
                "attribute '{}' added after {} instances; padding them with missing values",
                attribute.name(),
                self.instances.len()
            );
            for instance in &mut self.instances {
                instance.push_missing();
            }
        }
        debug!(
            "{}: attribute #{} '{}' ({})",
            self.relation_name,
            self.attributes.len(),
            attribute.name(),
            attribute.kind()
        );
        self.attributes.push(attribute);
        Ok(self)
    }

    fn add_declared(&mut self, attribute: Attribute, class_attribute: bool) -> Result<&mut Self> {
        let name = attribute.name().to_string();
        self.add_attribute(attribute)?;
        if class_attribute {
            self.set_class_attribute(Some(&name))?;
        }
        Ok(self)
    }

    pub fn numeric(&mut self, name: &str, class_attribute: bool) -> Result<&mut Self> {
        self.add_declared(Attribute::numeric(name)?, class_attribute)
    }

    pub fn nominal<S: AsRef<str>>(
        &mut self,
        name: &str,
        values: &[S],
        class_attribute: bool,
    ) -> Result<&mut Self> {
        self.add_declared(Attribute::nominal(name, values)?, class_attribute)
    }

    pub fn string(&mut self, name: &str, class_attribute: bool) -> Result<&mut Self> {
        self.add_declared(Attribute::string(name)?, class_attribute)
    }

    pub fn date(&mut self, name: &str, format: &str, class_attribute: bool) -> Result<&mut Self> {
        self.add_declared(Attribute::date(name, format)?, class_attribute)
    }

    /// Apply a batch of declarations in order; stops at the first failure.
    pub fn add_attributes(
        &mut self,
        specs: impl IntoIterator<Item = AttributeSpec>,
    ) -> Result<&mut Self> {
        for spec in specs {
            self.add_declared(Attribute::new(spec.name, spec.kind)?, spec.class_attribute)?;
        }
        Ok(self)
    }

    // -- class attribute --

    /// Designate the class attribute by name, or clear it with `None`.
    /// An unknown name leaves the current designation untouched.
    pub fn set_class_attribute(&mut self, name: Option<&str>) -> Result<()> {
        self.class_index = match name {
            None => None,
            Some(name) => Some(
                self.attribute_index(name)
                    .ok_or_else(|| DatasetError::UndefinedAttribute(name.to_string()))?,
            ),
        };
        debug!("{}: class attribute set to {:?}", self.relation_name, name);
        Ok(())
    }

    pub fn class_attribute(&self) -> Option<&Attribute> {
        self.class_index.and_then(|i| self.attributes.get(i))
    }

    pub fn class_index(&self) -> Option<usize> {
        self.class_index
    }

    pub fn is_class_attribute_defined(&self) -> bool {
        self.class_index.is_some()
    }

    // -- instances --

    /// Append a row with the given weight.
    ///
    /// Raw rows are coerced attribute by attribute and nothing is stored if
    /// any value fails. Conformant instances are only re-weighted.
    pub fn add_instance(&mut self, row: impl Into<RowInput>, weight: f64) -> Result<&Instance> {
        let instance = match row.into() {
            RowInput::Raw(values) => {
                self.check_arity(values.len())?;
                // before coercion, which interns string literals
                check_weight(weight)?;
                let coerced = self
                    .attributes
                    .iter_mut()
                    .zip(&values)
                    .map(|(attribute, value)| attribute.internal_value_of(value))
                    .collect::<Result<Vec<f64>>>()?;
                Instance::new(coerced, weight)?
            }
            RowInput::Conformant(mut instance) => {
                self.check_arity(instance.len())?;
                instance.set_weight(weight)?;
                instance
            }
        };
        let index = self.instances.len();
        self.instances.push(instance);
        Ok(&self.instances[index])
    }

    /// Add rows in order with a shared weight. Rows before a failing one stay.
    pub fn add_instances<R: Into<RowInput>>(
        &mut self,
        rows: impl IntoIterator<Item = R>,
        weight: f64,
    ) -> Result<()> {
        for (i, row) in rows.into_iter().enumerate() {
            if let Err(e) = self.add_instance(row, weight).map(|_| ()) {
                debug!("{}: bulk insert stopped at row {i}: {e}", self.relation_name);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn delete_instance(&mut self, index: usize) -> Option<Instance> {
        (index < self.instances.len()).then(|| self.instances.remove(index))
    }

    fn check_arity(&self, len: usize) -> Result<()> {
        if len == self.attributes.len() {
            Ok(())
        } else {
            Err(DatasetError::SchemaMismatch(format!(
                "row has {len} values but the schema has {} attributes",
                self.attributes.len()
            )))
        }
    }

    /// Map an instance's internal values back to external ones.
    pub fn external_values(&self, instance: &Instance) -> Vec<Value> {
        self.attributes
            .iter()
            .zip(instance.values())
            .map(|(attribute, &v)| {
                if v.is_nan() {
                    Value::Missing
                } else if attribute.is_numeric() {
                    Value::Number(v)
                } else {
                    attribute
                        .external_value_of(v)
                        .map_or(Value::Missing, Value::Text)
                }
            })
            .collect()
    }

    // -- introspection --

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.instances.get(index)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.attribute_index(name).map(|i| &self.attributes[i])
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name() == name)
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(Attribute::name).collect()
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.instances.iter().map(Instance::weight).sum()
    }

    /// Sorted distinct external values of one attribute; `None` stands for
    /// missing.
    pub fn distinct_values(&self, name: &str) -> Result<BTreeSet<Option<String>>> {
        let index = self
            .attribute_index(name)
            .ok_or_else(|| DatasetError::UndefinedAttribute(name.to_string()))?;
        let attribute = &self.attributes[index];
        Ok(self
            .instances
            .iter()
            .map(|inst| inst.value(index).and_then(|v| attribute.external_value_of(v)))
            .collect())
    }

    // -- iteration --

    pub fn iter_instances(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    pub fn iter_attributes(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    pub fn each_instance(&self, mut f: impl FnMut(&Instance)) {
        for instance in &self.instances {
            f(instance);
        }
    }

    pub fn each_instance_with_index(&self, mut f: impl FnMut(usize, &Instance)) {
        for (i, instance) in self.instances.iter().enumerate() {
            f(i, instance);
        }
    }

    pub fn each_attribute(&self, mut f: impl FnMut(&Attribute)) {
        for attribute in &self.attributes {
            f(attribute);
        }
    }

    pub fn each_attribute_with_index(&self, mut f: impl FnMut(usize, &Attribute)) {
        for (i, attribute) in self.attributes.iter().enumerate() {
            f(i, attribute);
        }
    }

    /// Keep only the instances at `indices`, in the given order.
    pub(crate) fn retain_indices(&mut self, indices: &[usize]) {
        let mut kept = Vec::with_capacity(indices.len());
        for &i in indices {
            if let Some(inst) = self.instances.get(i) {
                kept.push(inst.clone());
            }
        }
        self.instances = kept;
    }

    // -- merge --

    /// Union of this dataset's rows with each of `others`, in order.
    /// Fails on the first dataset whose schema differs.
    pub fn merge(&self, others: &[&Dataset]) -> Result<Dataset> {
        others
            .iter()
            .try_fold(self.clone(), |acc, other| Self::merge_two(acc, other))
    }

    /// Append `b`'s instances to `a`. Both schemas must declare the same
    /// attributes in the same order (names, kinds, nominal labels and date
    /// formats). String literals from `b` are re-interned into `a`'s pools.
    pub fn merge_two(mut a: Dataset, b: &Dataset) -> Result<Dataset> {
        if a.attributes.len() != b.attributes.len() {
            return Err(DatasetError::SchemaMismatch(format!(
                "'{}' has {} attributes, '{}' has {}",
                a.relation_name,
                a.attributes.len(),
                b.relation_name,
                b.attributes.len()
            )));
        }
        if let Some((left, right)) = a
            .attributes
            .iter()
            .zip(&b.attributes)
            .find(|(left, right)| !left.same_definition(right))
        {
            return Err(DatasetError::SchemaMismatch(format!(
                "attribute '{}' ({}) does not match '{}' ({})",
                left.name(),
                left.kind(),
                right.name(),
                right.kind()
            )));
        }

        debug!(
            "merging {} instances of '{}' into '{}'",
            b.len(),
            b.relation_name,
            a.relation_name
        );
        a.instances.reserve(b.instances.len());
        for instance in &b.instances {
            let mut copy = instance.clone();
            for (j, value) in copy.values_mut().iter_mut().enumerate() {
                let (target, source) = (&mut a.attributes[j], &b.attributes[j]);
                if target.is_string() {
                    if let Some(literal) = source.external_value_of(*value) {
                        *value = target.intern(&literal) as f64;
                    }
                }
            }
            a.instances.push(copy);
        }
        Ok(a)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Relation: {}", self.relation_name)?;
        writeln!(f, "Instances: {}", self.instances.len())?;
        writeln!(f, "Sum of weights: {}", self.sum_of_weights())?;
        writeln!(f, "Attributes: {}", self.attributes.len())?;
        for (i, a) in self.attributes.iter().enumerate() {
            let marker = if Some(i) == self.class_index { " (class)" } else { "" };
            writeln!(f, "  {i:>3} {:<20} {}{marker}", a.name(), a.kind())?;
        }
        Ok(())
    }
}
