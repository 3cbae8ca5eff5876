/// Data layer: schema, rows, filtering, and file collaborators.
///
/// Architecture:
/// ```text
///  .arff / .csv / .json / .names+.data
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset          (saver goes the other way)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   Dataset     │  Vec<Attribute> schema, Vec<Instance> rows, class index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  Dataset → Dataset, composable in sequence; merge unions rows
///   └──────────┘
/// ```

pub mod attribute;
pub mod date_pattern;
pub mod filter;
pub mod instance;
pub mod loader;
pub mod model;
pub mod saver;
