//! Aggregation consistency checks for IAMC-format scenario datasets.
//!
//! Given a [`Dataset`] and the reference data describing it (variable and
//! region codelists plus per-model region mappings), the crate verifies that
//! aggregate variables equal the weighted sum of their components and that
//! reported common-region values match the aggregate of each model's native
//! regions. Results are plain records that render as text or JSON.
//!
//! Reference data is loaded and cached by a caller-owned
//! [`store::DefinitionContext`]; the checks themselves do no I/O.
pub mod aggregation;
pub mod dataset;
pub mod display;
pub mod error;
pub mod names;
pub mod store;
pub mod validation;

#[cfg(feature = "python")]
mod bindings;

pub use aggregation::{
    check_region_aggregates, check_variable_aggregates, map_regions, residual_observations, PassFail,
    RegionAggregationCheckResult, RegionCheckOptions, Tolerance, VarAggregationCheckResult, VariableCheckOptions,
};
pub use dataset::{Dataset, Dimension, Filter, Observation};
pub use error::{CheckError, CheckResult, ConfigurationError, InvalidArgumentError};
pub use store::{DataStructureDefinition, DefinitionStore, RegionMappingStore, RegionProcessor};
