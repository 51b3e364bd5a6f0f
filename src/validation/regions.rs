//! Region labels outside the common codelist, resolved against the native
//! regions each model declares.
use crate::dataset::{Dataset, Filter};
use crate::store::{DefinitionStore, RegionMappingStore};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelRegionValidation {
    /// Region to the models that report it without declaring it native.
    pub invalid: BTreeMap<String, Vec<String>>,
    /// Region to the models that report it and declare it native.
    pub valid_native: BTreeMap<String, Vec<String>>,
}

impl ModelRegionValidation {
    pub fn is_valid(&self) -> bool { self.invalid.is_empty() }
}

/// Classifies the regions of `dataset` that are not common regions.
///
/// A region is fine for a model that declares it as a native region and
/// invalid for every other model reporting it.
pub fn invalid_model_regions<S, R>(dataset: &Dataset, store: &S, processor: &R) -> ModelRegionValidation
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    let common = store.region_codelist();
    let mut result = ModelRegionValidation::default();

    for region in dataset.regions() {
        if common.contains(region) {
            continue;
        }
        let reporting = dataset.filter(&Filter::new().region([region]));
        let (valid, invalid): (Vec<&str>, Vec<&str>) = reporting
            .models()
            .into_iter()
            .partition(|model| processor.native_regions(model).contains(region));

        if !invalid.is_empty() {
            result.invalid.insert(region.to_string(), invalid.into_iter().map(String::from).collect());
        }
        if !valid.is_empty() {
            result.valid_native.insert(region.to_string(), valid.into_iter().map(String::from).collect());
        }
    }
    result
}
