//! Heuristic solvers.
//!
//! Only the genetic algorithm lives here; it needs no MIP backend and is the
//! fallback when the exact model cannot be solved.

pub mod genetic;

pub use genetic::*;
