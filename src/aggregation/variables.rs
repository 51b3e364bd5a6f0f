//! Consistency of aggregate variables with the sum of their components.
use super::components::{self, AggregationMap};
use super::options::{Tolerance, VariableCheckOptions};
use super::result::{VarAggregationCheckResult, VariableFailure};
use crate::dataset::{Dataset, Dimension, Observation};
use crate::error::CheckResult;
use crate::names::{Namespace, SEPARATOR};
use crate::store::{ComponentSet, DefinitionStore};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument};

/// (model, scenario, region, time)
type GroupKey<'a> = (&'a str, &'a str, &'a str, i32);

/// Values per variable and group, summed over units.
struct ValueIndex<'a> {
    values: HashMap<&'a str, BTreeMap<GroupKey<'a>, f64>>,
}

impl<'a> ValueIndex<'a> {
    fn build(dataset: &'a Dataset) -> Self {
        let mut values: HashMap<&'a str, BTreeMap<GroupKey<'a>, f64>> = HashMap::new();
        let series = dataset.to_series(&[Dimension::Model, Dimension::Scenario, Dimension::Region, Dimension::Variable]);
        for (key, value) in series {
            let (model, scenario, region, variable) = (key.labels[0], key.labels[1], key.labels[2], key.labels[3]);
            values.entry(variable).or_default().insert((model, scenario, region, key.time), value);
        }
        Self { values }
    }

    fn series(&self, variable: &str) -> Option<&BTreeMap<GroupKey<'a>, f64>> {
        self.values.get(variable)
    }

    /// Weighted sum of the members reported for `key`, or `None` if none is.
    fn component_sum(&self, set: &ComponentSet, key: &GroupKey<'a>) -> Option<f64> {
        let mut sum = None;
        for member in &set.members {
            if let Some(value) = self.series(&member.name).and_then(|s| s.get(key)) {
                *sum.get_or_insert(0.0) += member.weight * value;
            }
        }
        sum
    }
}

/// One aggregate checked against one of its component sets.
struct CheckUnit<'a> {
    aggregate: &'a str,
    set: &'a ComponentSet,
    tolerance: Tolerance,
}

impl CheckUnit<'_> {
    fn evaluate(&self, index: &ValueIndex<'_>, require_complete: bool) -> Vec<VariableFailure> {
        let Some(series) = index.series(self.aggregate) else { return Vec::new() };
        let mut failures = Vec::new();

        for (key, &aggregate) in series {
            let Some(components) = index.component_sum(self.set, key) else { continue };
            let within = self.tolerance.allows(aggregate, components);
            let failed = if require_complete { !within } else { !within && components > aggregate };
            if failed {
                let (model, scenario, region, time) = *key;
                failures.push(VariableFailure {
                    model: model.to_string(),
                    scenario: scenario.to_string(),
                    region: region.to_string(),
                    variable: self.aggregate.to_string(),
                    time,
                    hierarchy: self.set.label.clone(),
                    aggregate,
                    components,
                    difference: aggregate - components,
                });
            }
        }
        failures
    }
}

fn failure_order(f: &VariableFailure) -> (&str, Option<&str>, &str, &str, &str, i32) {
    (&f.variable, f.hierarchy.as_deref(), &f.model, &f.scenario, &f.region, f.time)
}

/// Checks every aggregate variable of `dataset` against its components.
///
/// Aggregates are the variables present in both the dataset and the codelist
/// whose code sets `check_aggregate`, optionally restricted to
/// `options.variables`. Each component set is evaluated on its own, so
/// variables with alternative hierarchies can fail in one and pass in another.
#[instrument(skip_all, fields(rows = dataset.len()))]
pub fn check_variable_aggregates<S>(
    dataset: &Dataset,
    store: &S,
    options: &VariableCheckOptions,
) -> CheckResult<VarAggregationCheckResult>
where
    S: DefinitionStore + ?Sized,
{
    options.validate()?;
    components::validate_declarations(store.variable_codelist().codes())?;

    let present: Namespace = dataset.variables().into_iter().collect();
    let requested: Option<BTreeSet<&str>> =
        options.variables.as_ref().map(|names| names.iter().map(String::as_str).collect());

    let mut unknown_vars = Vec::new();
    let mut not_checked_vars = Vec::new();
    let mut skipped_vars = Vec::new();
    let mut aggregation_map = AggregationMap::new();

    for name in present.iter() {
        match store.get_variable(name) {
            None => unknown_vars.push(name.to_string()),
            Some(code) if !code.check_aggregate => not_checked_vars.push(name.to_string()),
            Some(code) => {
                if requested.as_ref().is_some_and(|r| !r.contains(name)) {
                    continue;
                }
                let sets = components::resolve(code, &present);
                if sets.is_empty() {
                    debug!(variable = name, "no components in dataset, skipping");
                    skipped_vars.push(name.to_string());
                } else {
                    aggregation_map.insert(name.to_string(), sets);
                }
            }
        }
    }

    let tolerances: BTreeMap<String, Tolerance> = aggregation_map
        .keys()
        .map(|aggregate| {
            let declared = store.get_variable(aggregate).and_then(|code| code.tolerance.as_ref());
            (aggregate.clone(), options.tolerance.overlay(declared))
        })
        .collect();

    let units: Vec<CheckUnit> = aggregation_map
        .iter()
        .flat_map(|(aggregate, sets)| {
            let tolerance = tolerances.get(aggregate).copied().unwrap_or(options.tolerance);
            sets.iter().map(move |set| CheckUnit { aggregate: aggregate.as_str(), set, tolerance })
        })
        .collect();

    let index = ValueIndex::build(dataset);
    let require_complete = options.require_complete;
    let mut failures: Vec<VariableFailure> =
        units.par_iter().flat_map_iter(|unit| unit.evaluate(&index, require_complete)).collect();
    failures.sort_by(|a, b| failure_order(a).cmp(&failure_order(b)));

    info!(
        aggregates = aggregation_map.len(),
        failures = failures.len(),
        unknown = unknown_vars.len(),
        skipped = skipped_vars.len(),
        "variable aggregation check finished"
    );

    Ok(VarAggregationCheckResult { failures, aggregation_map, tolerances, unknown_vars, skipped_vars, not_checked_vars })
}

/// Observations that close the gap between each checked aggregate and its
/// components.
///
/// For every aggregate in `result`, a variable `"<aggregate>|<label>"` holds
/// `aggregate - components` (first component set) wherever the components
/// fall short of the aggregate by more than the tolerance the check used for
/// it. Components exceeding the aggregate get no row.
pub fn residual_observations(dataset: &Dataset, result: &VarAggregationCheckResult, label: &str) -> Dataset {
    let index = ValueIndex::build(dataset);
    let units = dataset.unit_mapping();
    let mut rows = Vec::new();

    for (aggregate, sets) in &result.aggregation_map {
        let (Some(set), Some(series)) = (sets.first(), index.series(aggregate)) else { continue };
        let tolerance = result.tolerances.get(aggregate).copied().unwrap_or_default();
        let unit = units.get(aggregate.as_str()).and_then(|u| u.first().copied()).unwrap_or_default();
        let variable = format!("{aggregate}{SEPARATOR}{label}");

        for (key, &value) in series {
            let Some(components) = index.component_sum(set, key) else { continue };
            if components < value && !tolerance.allows(value, components) {
                let (model, scenario, region, time) = *key;
                rows.push(Observation::new(model, scenario, region, &variable, unit, time, value - components));
            }
        }
    }
    Dataset::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckError, ConfigurationError, InvalidArgumentError};
    use crate::store::{
        Component, Components, DataStructureDefinition, RegionCodeList, TolerancePatch, VariableCode,
        VariableCodeList,
    };
    use rstest::rstest;

    fn obs(region: &str, variable: &str, value: f64) -> Observation {
        Observation::new("M", "S", region, variable, "EJ/yr", 2030, value)
    }

    fn dsd(codes: impl IntoIterator<Item = VariableCode>) -> DataStructureDefinition {
        DataStructureDefinition::new(
            VariableCodeList::from_codes("variable", codes),
            RegionCodeList::new("region"),
        )
    }

    fn simple_dsd() -> DataStructureDefinition {
        dsd([
            VariableCode::new("A", "EJ/yr").checked(),
            VariableCode::new("A|1", "EJ/yr"),
            VariableCode::new("A|2", "EJ/yr"),
        ])
    }

    fn check(dataset: &Dataset, store: &DataStructureDefinition) -> VarAggregationCheckResult {
        check_variable_aggregates(dataset, store, &VariableCheckOptions::default()).unwrap()
    }

    #[rstest]
    #[case(6.0, 0)]
    #[case(5.0, 1)]
    fn test_simple_aggregate(#[case] second: f64, #[case] expected_failures: usize) {
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", 4.0), obs("World", "A|2", second)]);
        let result = check(&data, &simple_dsd());
        assert_eq!(result.failures.len(), expected_failures);
        if let Some(failure) = result.failures.first() {
            assert_eq!((failure.aggregate, failure.components, failure.difference), (10.0, 9.0, 1.0));
            assert_eq!(failure.hierarchy, None);
        }
    }

    #[test]
    fn test_check_is_idempotent() {
        let data = Dataset::new(vec![
            obs("World", "A", 10.0),
            obs("World", "A|1", 4.0),
            obs("World", "A|2", 5.0),
            obs("R1", "A", 3.0),
            obs("R1", "A|1", 1.0),
        ]);
        let store = simple_dsd();
        assert_eq!(check(&data, &store), check(&data, &store));
        assert_eq!(check(&data, &store).failures.len(), 2);
    }

    #[rstest]
    #[case(10.5, true)]
    #[case(10.5001, false)]
    fn test_absolute_tolerance_boundary(#[case] aggregate: f64, #[case] passes: bool) {
        let data = Dataset::new(vec![obs("World", "A", aggregate), obs("World", "A|1", 4.0), obs("World", "A|2", 6.0)]);
        let tolerance = Tolerance::from_kwargs([("rtol", 0.0), ("atol", 0.5)]).unwrap();
        let options = VariableCheckOptions::default().with_tolerance(tolerance);
        let result = check_variable_aggregates(&data, &simple_dsd(), &options).unwrap();
        assert_eq!(result.failures.is_empty(), passes);
    }

    #[test]
    fn test_alternative_hierarchies_are_checked_independently() {
        let store = dsd([
            VariableCode::new("Final Energy", "EJ/yr").checked().with_components(Components::alternatives(vec![
                ComponentSet::labelled(
                    "sector",
                    vec![Component::new("Final Energy|Industry"), Component::new("Final Energy|Transport")],
                ),
                ComponentSet::labelled(
                    "carrier",
                    vec![Component::new("Final Energy|Electricity"), Component::new("Final Energy|Liquids")],
                ),
            ])),
            VariableCode::new("Final Energy|Industry", "EJ/yr"),
            VariableCode::new("Final Energy|Transport", "EJ/yr"),
            VariableCode::new("Final Energy|Electricity", "EJ/yr"),
            VariableCode::new("Final Energy|Liquids", "EJ/yr"),
        ]);
        let data = Dataset::new(vec![
            obs("World", "Final Energy", 100.0),
            obs("World", "Final Energy|Industry", 60.0),
            obs("World", "Final Energy|Transport", 40.0),
            obs("World", "Final Energy|Electricity", 30.0),
            obs("World", "Final Energy|Liquids", 50.0),
        ]);
        let result = check(&data, &store);
        assert_eq!(result.aggregation_map["Final Energy"].len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].hierarchy.as_deref(), Some("carrier"));
        assert_eq!(result.failures[0].difference, 20.0);
    }

    #[test]
    fn test_variable_bookkeeping_lists() {
        let store = dsd([
            VariableCode::new("A", "EJ/yr").checked(),
            VariableCode::new("A|1", "EJ/yr"),
            VariableCode::new("Population", "million").checked(),
        ]);
        let data = Dataset::new(vec![
            obs("World", "A", 1.0),
            obs("World", "A|1", 1.0),
            obs("World", "Population", 8000.0),
            obs("World", "GDP|PPP", 1.0),
        ]);
        let result = check(&data, &store);
        assert_eq!(result.unknown_vars, vec!["GDP|PPP"]);
        assert_eq!(result.skipped_vars, vec!["Population"]);
        assert_eq!(result.not_checked_vars, vec!["A|1"]);
        assert_eq!(result.aggregation_map.keys().collect::<Vec<_>>(), vec!["A"]);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_groups_without_components_are_not_compared() {
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", 10.0), obs("R1", "A", 99.0)]);
        assert!(check(&data, &simple_dsd()).failures.is_empty());
    }

    #[rstest]
    #[case(7.0, 0)]
    #[case(12.0, 1)]
    fn test_incomplete_breakdowns(#[case] partial: f64, #[case] expected_failures: usize) {
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", partial)]);
        let options = VariableCheckOptions::default().allow_incomplete();
        let result = check_variable_aggregates(&data, &simple_dsd(), &options).unwrap();
        assert_eq!(result.failures.len(), expected_failures);
    }

    #[test]
    fn test_restriction_to_requested_variables() {
        let store = dsd([
            VariableCode::new("A", "EJ/yr").checked(),
            VariableCode::new("A|1", "EJ/yr"),
            VariableCode::new("B", "EJ/yr").checked(),
            VariableCode::new("B|1", "EJ/yr"),
        ]);
        let data = Dataset::new(vec![
            obs("World", "A", 1.0),
            obs("World", "A|1", 2.0),
            obs("World", "B", 1.0),
            obs("World", "B|1", 2.0),
        ]);
        let options = VariableCheckOptions::default().with_variables(["B"]);
        let result = check_variable_aggregates(&data, &store, &options).unwrap();
        assert_eq!(result.failed_variables().into_iter().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_malformed_requested_variables_are_rejected() {
        let options = VariableCheckOptions::default().with_variables(["A", "A|", " B"]);
        let err = check_variable_aggregates(&Dataset::empty(), &simple_dsd(), &options).unwrap_err();
        assert_eq!(
            err,
            CheckError::InvalidArgument(InvalidArgumentError::MalformedVariables {
                names: vec!["A|".into(), " B".into()],
            })
        );
    }

    #[test]
    fn test_cyclic_declarations_abort_the_check() {
        let store = dsd([
            VariableCode::new("A", "EJ/yr").checked().with_components(Components::names(["B"])),
            VariableCode::new("B", "EJ/yr").checked().with_components(Components::names(["A"])),
        ]);
        let err = check_variable_aggregates(&Dataset::empty(), &store, &VariableCheckOptions::default()).unwrap_err();
        assert!(matches!(err, CheckError::Configuration(ConfigurationError::ComponentCycle { .. })));
    }

    #[test]
    fn test_weights_and_declared_tolerance() {
        let store = dsd([
            VariableCode::new("Net", "EJ/yr")
                .checked()
                .with_components(Components::single(vec![
                    Component::new("Gross"),
                    Component::weighted("Losses", -1.0),
                ]))
                .with_tolerance(TolerancePatch { rtol: None, atol: Some(1.0) }),
            VariableCode::new("Gross", "EJ/yr"),
            VariableCode::new("Losses", "EJ/yr"),
        ]);
        let data = Dataset::new(vec![obs("World", "Net", 8.5), obs("World", "Gross", 10.0), obs("World", "Losses", 2.0)]);
        assert!(check(&data, &store).failures.is_empty());

        let options = VariableCheckOptions::default();
        let data = Dataset::new(vec![obs("World", "Net", 6.5), obs("World", "Gross", 10.0), obs("World", "Losses", 2.0)]);
        let result = check_variable_aggregates(&data, &store, &options).unwrap();
        assert_eq!(result.failures[0].components, 8.0);
    }

    #[test]
    fn test_residual_observations() {
        let data = Dataset::new(vec![
            obs("World", "A", 10.0),
            obs("World", "A|1", 4.0),
            obs("World", "A|2", 5.0),
            obs("R1", "A", 2.0),
            obs("R1", "A|1", 2.0),
        ]);
        let result = check(&data, &simple_dsd());
        let residuals = residual_observations(&data, &result, "Other");
        assert_eq!(residuals.len(), 1);
        let row = &residuals.rows()[0];
        assert_eq!((row.region.as_str(), row.variable.as_str(), row.value), ("World", "A|Other", 1.0));
        assert_eq!(row.unit, "EJ/yr");
    }

    #[test]
    fn test_residuals_skip_components_exceeding_aggregate() {
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", 12.0)]);
        let result = check(&data, &simple_dsd());
        assert_eq!(result.failures.len(), 1);
        assert!(residual_observations(&data, &result, "Other").is_empty());
    }

    #[test]
    fn test_residuals_follow_check_tolerance() {
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", 4.0), obs("World", "A|2", 5.6)]);
        let store = simple_dsd();

        let loose = VariableCheckOptions::default().with_tolerance(Tolerance::new(0.0, 0.5).unwrap());
        let result = check_variable_aggregates(&data, &store, &loose).unwrap();
        assert!(result.failures.is_empty());
        assert!(residual_observations(&data, &result, "Other").is_empty());

        let result = check(&data, &store);
        assert_eq!(result.failures.len(), 1);
        let residuals = residual_observations(&data, &result, "Other");
        assert_eq!(residuals.len(), 1);
        assert!((residuals.rows()[0].value - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_residuals_follow_declared_tolerance() {
        let store = dsd([
            VariableCode::new("A", "EJ/yr")
                .checked()
                .with_tolerance(TolerancePatch { rtol: None, atol: Some(1.0) }),
            VariableCode::new("A|1", "EJ/yr"),
        ]);
        let data = Dataset::new(vec![obs("World", "A", 10.0), obs("World", "A|1", 9.5)]);
        let result = check(&data, &store);
        assert!(result.failures.is_empty());
        assert_eq!(result.tolerances["A"], Tolerance { rtol: Tolerance::default().rtol, atol: 1.0 });
        assert!(residual_observations(&data, &result, "Other").is_empty());
    }
}
