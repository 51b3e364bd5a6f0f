//! Caller-owned cache of loaded reference data.
use super::definition::DataStructureDefinition;
use super::region_mapping::{RegionAggregationMapping, RegionProcessor};
use crate::error::CheckResult;
use std::sync::Arc;
use tracing::info;

/// Source of reference data. Reading codelist files lives behind this trait
/// and outside of the checkers.
pub trait DefinitionLoader {
    fn load_definitions(&self) -> CheckResult<DataStructureDefinition>;
    fn load_mappings(&self, definitions: &DataStructureDefinition) -> CheckResult<Vec<RegionAggregationMapping>>;
}

/// Loader over definitions that are already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    definitions: DataStructureDefinition,
    mappings: Vec<RegionAggregationMapping>,
}

impl InMemoryLoader {
    pub fn new(definitions: DataStructureDefinition, mappings: Vec<RegionAggregationMapping>) -> Self {
        Self { definitions, mappings }
    }
}

impl DefinitionLoader for InMemoryLoader {
    fn load_definitions(&self) -> CheckResult<DataStructureDefinition> {
        Ok(self.definitions.clone())
    }

    fn load_mappings(&self, _definitions: &DataStructureDefinition) -> CheckResult<Vec<RegionAggregationMapping>> {
        Ok(self.mappings.clone())
    }
}

/// Lazily loaded definitions and region processor.
///
/// Callers hold one context per process and pass the `Arc` snapshots it hands
/// out to the checks. Reloading needs `&mut self`, so it cannot overlap with
/// other use of the context; checks already running keep their snapshot.
#[derive(Debug)]
pub struct DefinitionContext<L> {
    loader: L,
    definitions: Option<Arc<DataStructureDefinition>>,
    region_processor: Option<Arc<RegionProcessor>>,
}

impl<L: DefinitionLoader> DefinitionContext<L> {
    pub fn new(loader: L) -> Self {
        Self { loader, definitions: None, region_processor: None }
    }

    pub fn loader(&self) -> &L { &self.loader }

    pub fn is_loaded(&self) -> bool { self.definitions.is_some() }

    /// The definitions, loading them on first use.
    pub fn definitions(&mut self) -> CheckResult<Arc<DataStructureDefinition>> {
        if let Some(definitions) = &self.definitions {
            return Ok(Arc::clone(definitions));
        }
        let definitions = Arc::new(self.loader.load_definitions()?);
        info!(
            variables = definitions.variable.len(),
            regions = definitions.region.len(),
            "loaded definitions"
        );
        self.definitions = Some(Arc::clone(&definitions));
        Ok(definitions)
    }

    /// The region processor, built against the current definitions on first use.
    pub fn region_processor(&mut self) -> CheckResult<Arc<RegionProcessor>> {
        if let Some(processor) = &self.region_processor {
            return Ok(Arc::clone(processor));
        }
        let definitions = self.definitions()?;
        let mappings = self.loader.load_mappings(&definitions)?;
        let processor = Arc::new(RegionProcessor::new(&*definitions, mappings)?);
        info!(models = processor.mappings().count(), "built region processor");
        self.region_processor = Some(Arc::clone(&processor));
        Ok(processor)
    }

    /// Replaces the cached definitions with a fresh load. The region processor
    /// depends on them and is rebuilt on next use.
    pub fn reload(&mut self) -> CheckResult<Arc<DataStructureDefinition>> {
        self.invalidate();
        self.definitions()
    }

    pub fn invalidate(&mut self) {
        self.definitions = None;
        self.region_processor = None;
    }
}
