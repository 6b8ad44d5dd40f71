/// Data layer: core types, loading, cleaning and partitioning.
///
/// Architecture:
/// ```text
///  .csv (HTTP body or file) / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse → Table
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess  │  drop unused columns, then sparse columns, then sparse rows
///   └────────────┘        (counts from `missing`)
///        │
///        ▼
///   ┌───────────┐
///   │ partition  │  restrict to shared keys → split by indicator
///   └───────────┘
/// ```

pub mod loader;
pub mod missing;
pub mod model;
pub mod partition;
pub mod preprocess;
pub mod preview;
