//! Named collections of codes for one dimension.
use super::types::{Code, GenericCode, RegionCode, VariableCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A codelist: the permitted names of one dimension plus per-name metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeList<C> {
    pub name: String,
    codes: BTreeMap<String, C>,
}

pub type VariableCodeList = CodeList<VariableCode>;
pub type RegionCodeList = CodeList<RegionCode>;
pub type GenericCodeList = CodeList<GenericCode>;

impl<C: Code> CodeList<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), codes: BTreeMap::new() }
    }

    /// Builds a codelist from codes. A later code with the same name replaces
    /// an earlier one.
    pub fn from_codes(name: impl Into<String>, codes: impl IntoIterator<Item = C>) -> Self {
        let mut list = Self::new(name);
        for code in codes {
            list.insert(code);
        }
        list
    }

    pub fn insert(&mut self, code: C) -> Option<C> {
        self.codes.insert(code.name().to_string(), code)
    }

    pub fn get(&self, name: &str) -> Option<&C> { self.codes.get(name) }
    pub fn contains(&self, name: &str) -> bool { self.codes.contains_key(name) }
    pub fn len(&self) -> usize { self.codes.len() }
    pub fn is_empty(&self) -> bool { self.codes.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    pub fn codes(&self) -> impl Iterator<Item = &C> {
        self.codes.values()
    }

    /// Returns the items that are not in this codelist, sorted and deduplicated.
    pub fn validate_items<'a>(&self, items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut invalid: Vec<String> = items
            .into_iter()
            .filter(|item| !self.contains(item))
            .map(str::to_string)
            .collect();
        invalid.sort();
        invalid.dedup();
        invalid
    }
}
