use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::model::Dataset;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Filter contract
// ---------------------------------------------------------------------------

/// A transformation from one dataset to another.
///
/// The output may be the input mutated in place or a brand-new dataset.
/// Closures of the right shape are filters too.
pub trait Filter {
    fn apply(&self, dataset: Dataset) -> Result<Dataset>;
}

impl<F> Filter for F
where
    F: Fn(Dataset) -> Result<Dataset>,
{
    fn apply(&self, dataset: Dataset) -> Result<Dataset> {
        self(dataset)
    }
}

impl Dataset {
    pub fn apply_filter(self, filter: &dyn Filter) -> Result<Dataset> {
        filter.apply(self)
    }

    /// Pipe the dataset through `filters` left to right; the first failing
    /// step aborts the rest.
    pub fn apply_filters(self, filters: &[&dyn Filter]) -> Result<Dataset> {
        filters.iter().enumerate().try_fold(self, |dataset, (step, filter)| {
            debug!("{}: filter step {step}", dataset.relation_name());
            filter.apply(dataset)
        })
    }
}

// ---------------------------------------------------------------------------
// ValueSelection: which labels are kept per attribute
// ---------------------------------------------------------------------------

/// Per-attribute selection: attribute name → selected labels, where `None`
/// selects missing values.
pub type Selection = BTreeMap<String, BTreeSet<Option<String>>>;

/// Keeps the instances whose labels are selected for every constrained
/// attribute.
///
/// An instance passes an attribute's constraint when:
/// * the attribute is not in the selection → passes (no constraint)
/// * the selected set is empty → nothing selected → fails
/// * the instance's label (or `None` when missing) is in the set → passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSelection {
    pub selected: Selection,
}

impl ValueSelection {
    /// A selection with every value of every nominal or string attribute
    /// selected, so nothing is removed until something is deselected.
    pub fn select_all(dataset: &Dataset) -> Result<Self> {
        let mut selected = Selection::new();
        for attribute in dataset.iter_attributes() {
            if attribute.is_nominal() || attribute.is_string() {
                let name = attribute.name();
                selected.insert(name.to_string(), dataset.distinct_values(name)?);
            }
        }
        Ok(ValueSelection { selected })
    }

    /// Flip one label in or out of an attribute's selected set.
    pub fn toggle(&mut self, attribute: &str, label: Option<&str>) {
        let set = self.selected.entry(attribute.to_string()).or_default();
        let label = label.map(str::to_string);
        if !set.remove(&label) {
            set.insert(label);
        }
    }

    pub fn select_none(&mut self, attribute: &str) {
        self.selected.insert(attribute.to_string(), BTreeSet::new());
    }

    /// Indices of instances that pass every constraint.
    pub fn matching_indices(&self, dataset: &Dataset) -> Result<Vec<usize>> {
        let mut constraints = Vec::with_capacity(self.selected.len());
        for (name, set) in &self.selected {
            let index = dataset
                .attribute_index(name)
                .ok_or_else(|| DatasetError::UndefinedAttribute(name.clone()))?;
            constraints.push((index, set));
        }

        Ok(dataset
            .iter_instances()
            .enumerate()
            .filter(|(_, inst)| {
                constraints.iter().all(|&(index, set)| {
                    let label = inst
                        .value(index)
                        .and_then(|v| dataset.attributes()[index].external_value_of(v));
                    set.contains(&label)
                })
            })
            .map(|(i, _)| i)
            .collect())
    }
}

impl Filter for ValueSelection {
    fn apply(&self, mut dataset: Dataset) -> Result<Dataset> {
        let keep = self.matching_indices(&dataset)?;
        debug!(
            "{}: value selection keeps {} of {} instances",
            dataset.relation_name(),
            keep.len(),
            dataset.len()
        );
        dataset.retain_indices(&keep);
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    fn colours() -> Dataset {
        let mut d = Dataset::new("colours");
        d.nominal("colour", &["red", "green", "blue"], false)
            .unwrap()
            .numeric("size", false)
            .unwrap();
        d.add_instances(
            [
                row!["red", 1],
                row!["green", 2],
                row!["blue", 3],
                row![None::<&str>, 4],
            ],
            1.0,
        )
        .unwrap();
        d
    }

    fn sizes(d: &Dataset) -> Vec<f64> {
        d.iter_instances().map(|i| i.values()[1]).collect()
    }

    fn drop_first(mut d: Dataset) -> Result<Dataset> {
        d.delete_instance(0);
        Ok(d)
    }

    fn double_weights(d: Dataset) -> Result<Dataset> {
        let mut out = d.header();
        for inst in d.iter_instances() {
            out.add_instance(inst, inst.weight() * 2.0)?;
        }
        Ok(out)
    }

    #[test]
    fn select_all_keeps_everything() {
        let d = colours();
        let selection = ValueSelection::select_all(&d).unwrap();
        let out = d.apply_filter(&selection).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn toggled_labels_are_removed() {
        let d = colours();
        let mut selection = ValueSelection::select_all(&d).unwrap();
        selection.toggle("colour", Some("green"));
        selection.toggle("colour", None);
        let out = d.apply_filter(&selection).unwrap();
        assert_eq!(sizes(&out), [1.0, 3.0]);
    }

    #[test]
    fn empty_selection_removes_all() {
        let mut selection = ValueSelection::default();
        selection.select_none("colour");
        let out = colours().apply_filter(&selection).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.num_attributes(), 2);
    }

    #[test]
    fn unknown_attribute_fails() {
        let mut selection = ValueSelection::default();
        selection.toggle("shape", Some("round"));
        assert_eq!(
            colours().apply_filter(&selection).unwrap_err(),
            DatasetError::UndefinedAttribute("shape".into())
        );
    }

    #[test]
    fn pipeline_equals_sequential_application() {
        let piped = colours()
            .apply_filters(&[&drop_first, &double_weights])
            .unwrap();
        let stepwise = colours()
            .apply_filter(&drop_first)
            .and_then(|d| d.apply_filter(&double_weights))
            .unwrap();
        assert_eq!(sizes(&piped), sizes(&stepwise));
        assert_eq!(piped.sum_of_weights(), stepwise.sum_of_weights());
        assert_eq!(piped.sum_of_weights(), 6.0);
    }

    #[test]
    fn pipeline_stops_at_first_failure() {
        let fail = |_: Dataset| -> Result<Dataset> {
            Err(DatasetError::SchemaMismatch("unexpected input".into()))
        };
        let result = colours().apply_filters(&[&drop_first, &fail, &double_weights]);
        assert!(matches!(result, Err(DatasetError::SchemaMismatch(_))));
    }
}
