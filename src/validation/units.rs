//! Variable/unit combinations that the variable codelist does not allow.
use crate::dataset::Dataset;
use crate::store::DefinitionStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidUnit {
    pub variable: String,
    /// Units used in the dataset that are not declared.
    pub invalid: Vec<String>,
    pub expected: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitValidation {
    pub invalid: Vec<InvalidUnit>,
    /// Variables without a code, whose units could not be checked.
    pub unknown_variables: Vec<String>,
}

impl UnitValidation {
    pub fn is_valid(&self) -> bool { self.invalid.is_empty() }
}

pub fn invalid_variable_units<S>(dataset: &Dataset, store: &S) -> UnitValidation
where
    S: DefinitionStore + ?Sized,
{
    let mut result = UnitValidation::default();
    for (variable, units) in dataset.unit_mapping() {
        let Some(code) = store.get_variable(variable) else {
            result.unknown_variables.push(variable.to_string());
            continue;
        };
        let invalid: Vec<String> =
            units.into_iter().filter(|unit| !code.accepts_unit(unit)).map(String::from).collect();
        if !invalid.is_empty() {
            result.invalid.push(InvalidUnit { variable: variable.to_string(), invalid, expected: code.unit.clone() });
        }
    }
    result
}
