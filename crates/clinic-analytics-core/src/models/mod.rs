//! Domain models for clinic analytics.

mod kpi;
mod patient;
mod visit;

pub use kpi::*;
pub use patient::*;
pub use visit::*;
