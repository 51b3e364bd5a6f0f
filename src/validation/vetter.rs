//! Configured checks that can be run against a dataset.
use crate::aggregation::{
    check_region_aggregates, check_variable_aggregates, PassFail, RegionAggregationCheckResult,
    RegionCheckOptions, VarAggregationCheckResult, VariableCheckOptions,
};
use crate::dataset::Dataset;
use crate::error::CheckResult;
use crate::store::{DefinitionStore, RegionMappingStore};
use serde::Serialize;
use std::sync::Arc;

/// A check bundled with the reference data and options it runs with.
pub trait Vetter {
    type Input: ?Sized;
    type Output;

    /// Short identifier used in reports.
    fn name(&self) -> &'static str;

    fn check(&self, data: &Self::Input) -> CheckResult<Self::Output>;

    /// Runs the check and wraps its result for uniform reporting.
    fn vet(&self, data: &Self::Input) -> CheckResult<VettingOutcome>
    where
        Self::Output: Into<VettingOutcome>,
    {
        self.check(data).map(Into::into)
    }
}

/// Result of any vetter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum VettingOutcome {
    VariableAggregation(VarAggregationCheckResult),
    RegionAggregation(RegionAggregationCheckResult),
}

impl VettingOutcome {
    pub fn status(&self) -> PassFail {
        match self {
            VettingOutcome::VariableAggregation(result) => result.status(),
            VettingOutcome::RegionAggregation(result) => result.status(),
        }
    }
}

impl From<VarAggregationCheckResult> for VettingOutcome {
    fn from(result: VarAggregationCheckResult) -> Self { VettingOutcome::VariableAggregation(result) }
}

impl From<RegionAggregationCheckResult> for VettingOutcome {
    fn from(result: RegionAggregationCheckResult) -> Self { VettingOutcome::RegionAggregation(result) }
}

#[derive(Debug, Clone)]
pub struct VariableAggregationVetter<S: ?Sized> {
    definitions: Arc<S>,
    options: VariableCheckOptions,
}

impl<S: DefinitionStore + ?Sized> VariableAggregationVetter<S> {
    pub fn new(definitions: Arc<S>, options: VariableCheckOptions) -> Self {
        Self { definitions, options }
    }

    pub fn options(&self) -> &VariableCheckOptions { &self.options }
}

impl<S: DefinitionStore + ?Sized> Vetter for VariableAggregationVetter<S> {
    type Input = Dataset;
    type Output = VarAggregationCheckResult;

    fn name(&self) -> &'static str { "variable_aggregation" }

    fn check(&self, data: &Dataset) -> CheckResult<VarAggregationCheckResult> {
        check_variable_aggregates(data, &*self.definitions, &self.options)
    }
}

#[derive(Debug, Clone)]
pub struct RegionAggregationVetter<S: ?Sized, R: ?Sized> {
    definitions: Arc<S>,
    processor: Arc<R>,
    options: RegionCheckOptions,
}

impl<S, R> RegionAggregationVetter<S, R>
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    pub fn new(definitions: Arc<S>, processor: Arc<R>, options: RegionCheckOptions) -> Self {
        Self { definitions, processor, options }
    }

    pub fn options(&self) -> &RegionCheckOptions { &self.options }
}

impl<S, R> Vetter for RegionAggregationVetter<S, R>
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    type Input = Dataset;
    type Output = RegionAggregationCheckResult;

    fn name(&self) -> &'static str { "region_aggregation" }

    fn check(&self, data: &Dataset) -> CheckResult<RegionAggregationCheckResult> {
        check_region_aggregates(data, &*self.definitions, &*self.processor, &self.options)
    }
}
