//! # hb-data
//!
//! Exhaustively-enumerated tabular datasets for HyperBench: CSV discovery and
//! loading, the read-only [`ScoreTable`], and the [`SurrogateObjective`] that turns
//! an assignment into a distance-to-heaven fitness by table lookup.

pub mod loaders;
pub mod objective;
pub mod table;

pub use loaders::*;
pub use objective::*;
pub use table::*;
