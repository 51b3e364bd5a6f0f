//! Dataset validation against the definitions, and the vetter interface that
//! bundles checks with their reference data.
//!
//! The validators collect every finding instead of stopping at the first one.
pub mod names;
pub mod regions;
pub mod units;
pub mod vetter;

pub use names::invalid_names;
pub use regions::{invalid_model_regions, ModelRegionValidation};
pub use units::{invalid_variable_units, InvalidUnit, UnitValidation};
pub use vetter::{RegionAggregationVetter, VariableAggregationVetter, Vetter, VettingOutcome};
