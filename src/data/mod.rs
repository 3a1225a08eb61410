/// Data layer: core types, parsing, reshaping and persistence.
///
/// Architecture:
/// ```text
///  remote payload (CSV bytes)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop incomplete → dedupe (time, depth) → depth grid
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  time × depth grid, one layer per variable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  store    │  .parquet / .csv on disk
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod store;
