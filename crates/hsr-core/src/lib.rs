//! Urban habitat-suitable-range (HSR) change estimation.
//!
//! Projects how much suitable habitat each species gains or loses between a
//! baseline and a horizon year, and attributes that change to urban growth
//! (globally, per country and per urban cluster) and to the non-urban land
//! uses that replace habitat.
//!
//! Entry point: [`pipeline::Analysis`].

pub mod attribution;
pub mod clusters;
pub mod config;
pub mod coords;
pub mod error;
pub mod grid;
pub mod habitat;
pub mod landcover;
pub mod pipeline;
pub mod result;
pub mod vector;
pub mod zonal;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AnalysisConfig;
pub use error::{HsrError, Result};
pub use pipeline::{Analysis, BatchReport, Scenario};
pub use result::ResultRecord;
