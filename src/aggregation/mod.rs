//! The two aggregation consistency checks.
//!
//! * [`check_variable_aggregates`]: aggregate variables against the weighted
//!   sum of their components, per model, scenario, region and time.
//! * [`check_region_aggregates`]: reported common-region values against the
//!   aggregate of the native regions each model maps onto them.
//!
//! Both are pure functions of the dataset and the reference data passed in.
pub mod components;
pub mod options;
pub mod regions;
pub mod result;
pub mod variables;

pub use components::AggregationMap;
pub use options::{RegionCheckOptions, Tolerance, VariableCheckOptions};
pub use regions::{check_region_aggregates, map_regions};
pub use result::{
    PassFail, RegionAggregationCheckResult, RegionAggregationMap, RegionFailure, RegionsByModel,
    VarAggregationCheckResult, VariableFailure,
};
pub use variables::{check_variable_aggregates, residual_observations};
