//! The data structure definition: the codelists a dataset is validated against.
use super::codelist::{GenericCodeList, RegionCodeList, VariableCodeList};
use super::types::VariableCode;
use crate::dataset::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// How a region name relates to the definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionClass {
    /// In the common region codelist, valid for every model.
    Common,
    /// A native region of the given model.
    Native,
    Unknown,
}

/// Read access to codelists, as consumed by the checkers.
///
/// Implementors provide the codelists; name lookups come for free.
pub trait DefinitionStore {
    fn variable_codelist(&self) -> &Arc<VariableCodeList>;
    fn region_codelist(&self) -> &Arc<RegionCodeList>;

    /// Dimensions for which this store holds a codelist.
    fn dimensions(&self) -> BTreeSet<Dimension>;

    /// Whether `name` is in the codelist of `dim`, or `None` when the store has
    /// no codelist for that dimension.
    fn codelist_contains(&self, dim: Dimension, name: &str) -> Option<bool>;

    fn get_variable(&self, name: &str) -> Option<&VariableCode> {
        self.variable_codelist().get(name)
    }

    /// Classifies `name` for `model`. Stores without model-specific knowledge
    /// never answer [`RegionClass::Native`].
    fn get_region(&self, _model: &str, name: &str) -> RegionClass {
        if self.region_codelist().contains(name) {
            RegionClass::Common
        } else {
            RegionClass::Unknown
        }
    }

    fn all_variable_names(&self) -> BTreeSet<&str> {
        self.variable_codelist().names().collect()
    }
}

/// Codelists for the variable and region dimensions, and optionally for
/// models and scenarios.
///
/// Variable and region codelists are shared through `Arc` so that a
/// [`RegionProcessor`](super::RegionProcessor) can prove it was built against
/// the same lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStructureDefinition {
    pub variable: Arc<VariableCodeList>,
    pub region: Arc<RegionCodeList>,
    #[serde(default)]
    pub model: Option<GenericCodeList>,
    #[serde(default)]
    pub scenario: Option<GenericCodeList>,
}

impl DataStructureDefinition {
    pub fn new(variable: VariableCodeList, region: RegionCodeList) -> Self {
        Self { variable: Arc::new(variable), region: Arc::new(region), model: None, scenario: None }
    }

    pub fn with_models(mut self, models: GenericCodeList) -> Self {
        self.model = Some(models);
        self
    }

    pub fn with_scenarios(mut self, scenarios: GenericCodeList) -> Self {
        self.scenario = Some(scenarios);
        self
    }
}

impl DefinitionStore for DataStructureDefinition {
    fn variable_codelist(&self) -> &Arc<VariableCodeList> { &self.variable }
    fn region_codelist(&self) -> &Arc<RegionCodeList> { &self.region }

    fn dimensions(&self) -> BTreeSet<Dimension> {
        Dimension::CODELIST_DIMENSIONS
            .into_iter()
            .filter(|dim| self.codelist_contains(*dim, "").is_some())
            .collect()
    }

    // The dimension -> codelist table.
    fn codelist_contains(&self, dim: Dimension, name: &str) -> Option<bool> {
        match dim {
            Dimension::Variable => Some(self.variable.contains(name)),
            Dimension::Region => Some(self.region.contains(name)),
            Dimension::Model => self.model.as_ref().map(|list| list.contains(name)),
            Dimension::Scenario => self.scenario.as_ref().map(|list| list.contains(name)),
            Dimension::Unit => None,
        }
    }
}
