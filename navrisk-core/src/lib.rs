//! NavRisk Core: domain types and leaf algorithms for fund valuation analytics.
//!
//! - Valuation, return and flow series with their construction invariants
//! - Fault taxonomy carried by every numeric output
//! - Series preparation (cleaning, return derivation)
//! - Date alignment, shared statistics, deterministic seed derivation

pub mod align;
pub mod domain;
pub mod prepare;
pub mod rng;
pub mod stats;

pub use prepare::{PreparedSeries, SeriesPreparer};
