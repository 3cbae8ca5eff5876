//! Strongly-typed in-memory datasets for machine-learning workflows.
//!
//! A [`Dataset`] owns a schema of typed [`Attribute`]s (numeric, nominal,
//! string, date) and an ordered sequence of weighted [`Instance`]s whose
//! values are stored in internal numeric form. Filters compose over
//! datasets, schema-compatible datasets merge, and the loader/saver
//! collaborators move datasets in and out of ARFF, CSV, JSON and C4.5 files.
//!
//! ```
//! use rusty_instances::{Dataset, row};
//!
//! let mut d = Dataset::default();
//! d.numeric("age", false)?.nominal("label", &["yes", "no"], true)?;
//! let inst = d.add_instance(row![42, "no"], 1.0)?;
//! assert_eq!(inst.values(), [42.0, 1.0]);
//! # Ok::<(), rusty_instances::DatasetError>(())
//! ```

pub mod data;
pub mod error;

pub use data::attribute::{Attribute, AttributeKind, Value, DEFAULT_DATE_FORMAT, MISSING};
pub use data::filter::{Filter, Selection, ValueSelection};
pub use data::instance::{Instance, RowInput};
pub use data::loader::{CsvOptions, FileKind, load, load_csv, load_file};
pub use data::model::{AttributeSpec, Dataset};
pub use data::saver::{save, save_file};
pub use error::{DatasetError, Result};
