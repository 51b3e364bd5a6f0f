//! Per-model region mappings: which native regions a model reports and how
//! they roll up into common regions.
use super::codelist::{RegionCodeList, VariableCodeList};
use super::definition::{DefinitionStore, RegionClass};
use crate::error::{CheckResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// A region reported by one model, optionally renamed on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRegion {
    pub name: String,
    #[serde(default)]
    pub rename: Option<String>,
}

impl NativeRegion {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rename: None }
    }

    pub fn renamed(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self { name: name.into(), rename: Some(target.into()) }
    }

    /// Label used for this region in processed output.
    pub fn target_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

/// A common region and the native regions it is the sum of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonRegion {
    pub name: String,
    pub constituents: Vec<String>,
}

impl CommonRegion {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(name: impl Into<String>, constituents: I) -> Self {
        Self { name: name.into(), constituents: constituents.into_iter().map(Into::into).collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAggregationMapping {
    pub model: String,
    #[serde(default)]
    pub native_regions: Vec<NativeRegion>,
    #[serde(default)]
    pub common_regions: Vec<CommonRegion>,
}

impl RegionAggregationMapping {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), native_regions: Vec::new(), common_regions: Vec::new() }
    }

    pub fn with_native(mut self, region: NativeRegion) -> Self {
        self.native_regions.push(region);
        self
    }

    pub fn with_common(mut self, region: CommonRegion) -> Self {
        self.common_regions.push(region);
        self
    }

    pub fn native(&self, name: &str) -> Option<&NativeRegion> {
        self.native_regions.iter().find(|r| r.name == name)
    }

    pub fn common(&self, name: &str) -> Option<&CommonRegion> {
        self.common_regions.iter().find(|r| r.name == name)
    }

    pub fn native_names(&self) -> BTreeSet<&str> {
        self.native_regions.iter().map(|r| r.name.as_str()).collect()
    }

    /// Native regions that belong to some common region.
    pub fn constituent_names(&self) -> BTreeSet<&str> {
        self.common_regions
            .iter()
            .flat_map(|c| c.constituents.iter().map(String::as_str))
            .collect()
    }

    /// Checks the mapping invariants against the region codelist.
    ///
    /// Every constituent must be a declared native region, no native region may
    /// feed two common regions (or the same one twice), and every common region
    /// must be a known region. Each processed region name must come from exactly
    /// one source: a native region is declared once, and no two native targets
    /// or a native target and a common region share a name.
    pub fn validate(&self, regions: &RegionCodeList) -> Result<(), ConfigurationError> {
        let natives = self.validate_targets()?;
        let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for common in &self.common_regions {
            if !regions.contains(&common.name) {
                return Err(ConfigurationError::UnknownCommonRegion {
                    model: self.model.clone(),
                    region: common.name.clone(),
                });
            }
            for constituent in &common.constituents {
                if !natives.contains(constituent.as_str()) {
                    return Err(ConfigurationError::UndeclaredConstituent {
                        model: self.model.clone(),
                        common_region: common.name.clone(),
                        region: constituent.clone(),
                    });
                }
                owners.entry(constituent.as_str()).or_default().push(common.name.clone());
            }
        }

        if let Some((region, common_regions)) = owners.into_iter().find(|(_, owners)| owners.len() > 1) {
            return Err(ConfigurationError::OverlappingRegions {
                model: self.model.clone(),
                region: region.to_string(),
                common_regions,
            });
        }
        Ok(())
    }

    /// Returns the native names once every output label is known to be unique.
    fn validate_targets(&self) -> Result<BTreeSet<&str>, ConfigurationError> {
        let mut natives = BTreeSet::new();
        let mut sources: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for native in &self.native_regions {
            if !natives.insert(native.name.as_str()) {
                return Err(ConfigurationError::DuplicateNativeRegion {
                    model: self.model.clone(),
                    region: native.name.clone(),
                });
            }
            sources.entry(native.target_name()).or_default().push(native.name.clone());
        }
        for common in &self.common_regions {
            sources.entry(common.name.as_str()).or_default().push(common.name.clone());
        }

        match sources.into_iter().find(|(_, names)| names.len() > 1) {
            Some((target, regions)) => Err(ConfigurationError::ConflictingRegionTarget {
                model: self.model.clone(),
                target: target.to_string(),
                regions,
            }),
            None => Ok(natives),
        }
    }
}

/// Read access to region mappings, as consumed by the region checker.
pub trait RegionMappingStore {
    /// Codelists the mappings were validated against.
    fn region_codelist(&self) -> &Arc<RegionCodeList>;
    fn variable_codelist(&self) -> &Arc<VariableCodeList>;

    fn mapping(&self, model: &str) -> Option<&RegionAggregationMapping>;
    fn models(&self) -> BTreeSet<&str>;

    fn native_regions(&self, model: &str) -> BTreeSet<&str> {
        self.mapping(model).map(|m| m.native_names()).unwrap_or_default()
    }

    fn common_regions(&self, model: &str) -> BTreeMap<&str, Vec<&str>> {
        self.mapping(model)
            .map(|m| {
                m.common_regions
                    .iter()
                    .map(|c| (c.name.as_str(), c.constituents.iter().map(String::as_str).collect()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Model-aware classification of a region name.
    fn classify(&self, model: &str, name: &str) -> RegionClass {
        if self.mapping(model).is_some_and(|m| m.native(name).is_some()) {
            RegionClass::Native
        } else if self.region_codelist().contains(name) {
            RegionClass::Common
        } else {
            RegionClass::Unknown
        }
    }
}

/// The validated set of region mappings for all models, bound to the
/// codelists of one data structure definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProcessor {
    mappings: BTreeMap<String, RegionAggregationMapping>,
    #[serde(skip)]
    region_codelist: Arc<RegionCodeList>,
    #[serde(skip)]
    variable_codelist: Arc<VariableCodeList>,
}

impl RegionProcessor {
    /// Validates `mappings` and binds them to the codelists of `definitions`.
    pub fn new<S, I>(definitions: &S, mappings: I) -> CheckResult<Self>
    where
        S: DefinitionStore + ?Sized,
        I: IntoIterator<Item = RegionAggregationMapping>,
    {
        let region_codelist = Arc::clone(definitions.region_codelist());
        let variable_codelist = Arc::clone(definitions.variable_codelist());
        let mut by_model = BTreeMap::new();

        for mapping in mappings {
            mapping.validate(&region_codelist)?;
            if by_model.contains_key(&mapping.model) {
                return Err(ConfigurationError::DuplicateMapping { model: mapping.model }.into());
            }
            debug!(model = %mapping.model, common = mapping.common_regions.len(), "registered region mapping");
            by_model.insert(mapping.model.clone(), mapping);
        }

        Ok(Self { mappings: by_model, region_codelist, variable_codelist })
    }

    pub fn mappings(&self) -> impl Iterator<Item = &RegionAggregationMapping> {
        self.mappings.values()
    }

    /// Re-checks every mapping; used by the region checker before it starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.mappings.values().try_for_each(|m| m.validate(&self.region_codelist))
    }
}

impl RegionMappingStore for RegionProcessor {
    fn region_codelist(&self) -> &Arc<RegionCodeList> { &self.region_codelist }
    fn variable_codelist(&self) -> &Arc<VariableCodeList> { &self.variable_codelist }

    fn mapping(&self, model: &str) -> Option<&RegionAggregationMapping> {
        self.mappings.get(model)
    }

    fn models(&self) -> BTreeSet<&str> {
        self.mappings.keys().map(String::as_str).collect()
    }
}
