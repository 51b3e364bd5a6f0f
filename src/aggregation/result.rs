//! Result records produced by the aggregation checks.
use super::components::AggregationMap;
use super::options::Tolerance;
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Overall verdict of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassFail {
    Pass,
    Fail,
}

impl PassFail {
    pub fn from_failures(has_failures: bool) -> Self {
        if has_failures { PassFail::Fail } else { PassFail::Pass }
    }

    pub fn is_pass(self) -> bool { self == PassFail::Pass }
}

impl fmt::Display for PassFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassFail::Pass => "PASS",
            PassFail::Fail => "FAIL",
        })
    }
}

/// One (model, scenario, region, time) group where an aggregate does not match
/// its components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableFailure {
    pub model: String,
    pub scenario: String,
    pub region: String,
    pub variable: String,
    pub time: i32,
    /// Label of the component set this row was checked against, if any.
    pub hierarchy: Option<String>,
    pub aggregate: f64,
    pub components: f64,
    /// `aggregate - components`.
    pub difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VarAggregationCheckResult {
    /// Sorted by variable, hierarchy, model, scenario, region and time.
    pub failures: Vec<VariableFailure>,
    pub aggregation_map: AggregationMap,
    /// Tolerance each checked aggregate was compared with.
    pub tolerances: BTreeMap<String, Tolerance>,
    /// Variables in the dataset but not in the codelist.
    pub unknown_vars: Vec<String>,
    /// Checkable aggregates without any component in the dataset.
    pub skipped_vars: Vec<String>,
    /// Variables in the codelist that are not flagged for checking.
    pub not_checked_vars: Vec<String>,
}

impl VarAggregationCheckResult {
    pub fn status(&self) -> PassFail {
        PassFail::from_failures(!self.failures.is_empty())
    }

    pub fn failed_variables(&self) -> BTreeSet<&str> {
        self.failures.iter().map(|f| f.variable.as_str()).collect()
    }

    /// Failures of one aggregate in one hierarchy.
    pub fn failures_for<'a>(
        &'a self,
        variable: &'a str,
        hierarchy: Option<&'a str>,
    ) -> impl Iterator<Item = &'a VariableFailure> + 'a {
        self.failures
            .iter()
            .filter(move |f| f.variable == variable && f.hierarchy.as_deref() == hierarchy)
    }
}

/// Model to common region to its constituents.
pub type RegionAggregationMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Regions per model, used for the per-model classification lists.
pub type RegionsByModel = BTreeMap<String, Vec<String>>;

/// A common-region value that differs from the aggregate of its constituents
/// by more than the tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionFailure {
    pub model: String,
    pub scenario: String,
    pub region: String,
    pub variable: String,
    pub unit: String,
    pub time: i32,
    pub reported: f64,
    pub aggregated: f64,
    /// `reported - aggregated`.
    pub difference: f64,
    /// Infinite when `reported` is zero and `difference` is not.
    pub relative_difference_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionAggregationCheckResult {
    /// `None` when nothing in the dataset needed region processing.
    pub failures: Option<Vec<RegionFailure>>,
    /// Rows relabeled to output names plus common-region rows.
    pub processed: Dataset,
    /// Rows of unknown models, regions or variables.
    pub excluded: Dataset,
    pub aggregation_map: RegionAggregationMap,
    pub unknown_models: Vec<String>,
    pub unknown_regions: RegionsByModel,
    pub common_regions: RegionsByModel,
    pub unchecked_regions: RegionsByModel,
    pub unknown_variables: Vec<String>,
    pub skipped_variables: Vec<String>,
}

impl RegionAggregationCheckResult {
    pub fn status(&self) -> PassFail {
        PassFail::from_failures(self.failures.as_ref().is_some_and(|f| !f.is_empty()))
    }

    pub fn failure_count(&self) -> usize {
        self.failures.as_ref().map_or(0, Vec::len)
    }
}
