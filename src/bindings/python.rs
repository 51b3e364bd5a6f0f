//! The `_core` Python module.
//!
//! Datasets, definitions and mappings cross the boundary as JSON strings and
//! results come back as JSON, so the Python side needs no wrapper classes.
//! Tolerances are passed as keyword arguments, like the checks they replace.
use crate::aggregation::{
    check_region_aggregates, check_variable_aggregates, RegionCheckOptions, Tolerance, VariableCheckOptions,
};
use crate::dataset::Dataset;
use crate::display::{JsonFormatter, ReportFormatter};
use crate::error::{CheckError, ReportError};
use crate::store::{DataStructureDefinition, RegionAggregationMapping, RegionProcessor};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde::de::DeserializeOwned;

fn check_err(err: CheckError) -> PyErr {
    match err {
        CheckError::InvalidArgument(_) => PyValueError::new_err(err.to_string()),
        CheckError::Configuration(_) | CheckError::Load(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

fn report_err(err: ReportError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

fn parse<T: DeserializeOwned>(what: &str, json: &str) -> PyResult<T> {
    serde_json::from_str(json).map_err(|e| PyValueError::new_err(format!("invalid {what} JSON: {e}")))
}

fn numeric_kwargs(kwargs: Option<&Bound<'_, PyDict>>) -> PyResult<Vec<(String, f64)>> {
    let Some(kwargs) = kwargs else { return Ok(Vec::new()) };
    kwargs
        .iter()
        .map(|(key, value)| Ok((key.extract::<String>()?, value.extract::<f64>()?)))
        .collect()
}

/// Runs the variable aggregation check and returns the result as JSON.
#[pyfunction(name = "check_variable_aggregates")]
#[pyo3(signature = (data, definitions, variables=None, require_complete=true, **kwargs))]
fn py_check_variable_aggregates(
    data: &str,
    definitions: &str,
    variables: Option<Vec<String>>,
    require_complete: bool,
    kwargs: Option<&Bound<'_, PyDict>>,
) -> PyResult<String> {
    let dataset: Dataset = parse("dataset", data)?;
    let definitions: DataStructureDefinition = parse("definitions", definitions)?;
    let kwargs = numeric_kwargs(kwargs)?;
    let tolerance = Tolerance::from_kwargs(kwargs.iter().map(|(k, v)| (k.as_str(), *v))).map_err(check_err)?;

    let options = VariableCheckOptions { tolerance, require_complete, variables };
    let result = check_variable_aggregates(&dataset, &definitions, &options).map_err(check_err)?;
    JsonFormatter::default().variable_report(&result).map_err(report_err)
}

/// Runs the region aggregation check and returns the result as JSON.
#[pyfunction(name = "check_region_aggregates")]
#[pyo3(signature = (data, definitions, mappings, **kwargs))]
fn py_check_region_aggregates(
    data: &str,
    definitions: &str,
    mappings: &str,
    kwargs: Option<&Bound<'_, PyDict>>,
) -> PyResult<String> {
    let dataset: Dataset = parse("dataset", data)?;
    let definitions: DataStructureDefinition = parse("definitions", definitions)?;
    let mappings: Vec<RegionAggregationMapping> = parse("region mapping", mappings)?;
    let kwargs = numeric_kwargs(kwargs)?;
    let options = RegionCheckOptions::from_kwargs(kwargs.iter().map(|(k, v)| (k.as_str(), *v))).map_err(check_err)?;

    let processor = RegionProcessor::new(&definitions, mappings).map_err(check_err)?;
    let result = check_region_aggregates(&dataset, &definitions, &processor, &options).map_err(check_err)?;
    JsonFormatter::default().region_report(&result).map_err(report_err)
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_check_variable_aggregates, m)?)?;
    m.add_function(wrap_pyfunction!(py_check_region_aggregates, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
