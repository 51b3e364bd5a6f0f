//! Reference data: codelists, data structure definitions and region mappings.
pub mod codelist;
pub mod context;
pub mod definition;
pub mod region_mapping;
pub mod types;

pub use codelist::{CodeList, GenericCodeList, RegionCodeList, VariableCodeList};
pub use context::{DefinitionContext, DefinitionLoader, InMemoryLoader};
pub use definition::{DataStructureDefinition, DefinitionStore, RegionClass};
pub use region_mapping::{CommonRegion, NativeRegion, RegionAggregationMapping, RegionMappingStore, RegionProcessor};
pub use types::{
    AggregationMethod, Code, Component, ComponentSet, Components, GenericCode, RegionCode, TolerancePatch,
    VariableCode,
};
