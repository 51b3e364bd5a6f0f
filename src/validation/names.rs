//! Dimension labels that are not in the corresponding codelist.
use crate::dataset::{Dataset, Dimension};
use crate::store::DefinitionStore;
use std::collections::BTreeMap;

/// Labels per dimension that the codelists do not know.
///
/// `dimensions` defaults to every dimension the store holds a codelist for.
/// Explicitly requested dimensions without a codelist are left out of the
/// result rather than reported as wholly invalid.
pub fn invalid_names<S>(
    dataset: &Dataset,
    store: &S,
    dimensions: Option<&[Dimension]>,
) -> BTreeMap<Dimension, Vec<String>>
where
    S: DefinitionStore + ?Sized,
{
    let dimensions: Vec<Dimension> = match dimensions {
        Some(dims) => dims.to_vec(),
        None => store.dimensions().into_iter().collect(),
    };

    let mut invalid = BTreeMap::new();
    for dim in dimensions {
        if store.codelist_contains(dim, "").is_none() {
            continue;
        }
        let names: Vec<String> = dataset
            .dimension_values(dim)
            .into_iter()
            .filter(|name| store.codelist_contains(dim, name) == Some(false))
            .map(String::from)
            .collect();
        invalid.insert(dim, names);
    }
    invalid
}
