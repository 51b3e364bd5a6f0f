//! Consistency of reported common-region values with the aggregate of their
//! native constituents, and the region-processed dataset derived on the way.
use super::options::RegionCheckOptions;
use super::result::{RegionAggregationCheckResult, RegionFailure};
use crate::dataset::{Dataset, Observation};
use crate::error::{CheckResult, ConfigurationError};
use crate::store::{AggregationMethod, CommonRegion, DefinitionStore, RegionAggregationMapping, RegionMappingStore};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One constituent value and, for weighted means, its weight.
#[derive(Debug, Clone, Copy)]
struct Constituent {
    value: f64,
    weight: Option<f64>,
}

/// Combines constituent values with `method`. `None` when a weighted mean
/// lacks weights or they sum to zero.
fn combine(method: &AggregationMethod, values: &[Constituent]) -> Option<f64> {
    let plain = values.iter().map(|c| c.value);
    match method {
        AggregationMethod::Sum => Some(plain.sum()),
        AggregationMethod::Mean => (!values.is_empty()).then(|| plain.sum::<f64>() / values.len() as f64),
        AggregationMethod::Min => plain.reduce(f64::min),
        AggregationMethod::Max => plain.reduce(f64::max),
        AggregationMethod::WeightedMean { .. } => {
            let (mut weighted, mut total) = (0.0, 0.0);
            for c in values {
                let weight = c.weight?;
                weighted += weight * c.value;
                total += weight;
            }
            (total != 0.0).then(|| weighted / total)
        }
    }
}

/// `(difference, relative_difference_pct)` when the reported value is outside
/// the tolerance.
fn compare(reported: f64, aggregated: f64, options: &RegionCheckOptions) -> Option<(f64, f64)> {
    let difference = reported - aggregated;
    let pct = if difference == 0.0 {
        0.0
    } else if reported == 0.0 {
        f64::INFINITY
    } else {
        100.0 * difference.abs() / reported.abs()
    };
    // Negated so that NaN differences fail.
    (!(pct <= options.tolerance_pct())).then_some((difference, pct))
}

fn ensure_same_codelists<S, R>(store: &S, processor: &R) -> Result<(), ConfigurationError>
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    let same_variables = Arc::ptr_eq(store.variable_codelist(), processor.variable_codelist())
        || store.variable_codelist() == processor.variable_codelist();
    if !same_variables {
        return Err(ConfigurationError::CodelistMismatch { dimension: "variable".into() });
    }
    let same_regions = Arc::ptr_eq(store.region_codelist(), processor.region_codelist())
        || store.region_codelist() == processor.region_codelist();
    if !same_regions {
        return Err(ConfigurationError::CodelistMismatch { dimension: "region".into() });
    }
    Ok(())
}

/// Everything derived from the rows of one mapped model.
#[derive(Debug, Default)]
struct ModelOutcome {
    processed: Vec<Observation>,
    excluded: Vec<Observation>,
    failures: Vec<RegionFailure>,
    common: Vec<String>,
    unchecked: Vec<String>,
    unknown: Vec<String>,
    /// Whether any row had to be relabeled or aggregated.
    touched: bool,
}

fn process_model<S>(
    mapping: &RegionAggregationMapping,
    rows: &[&Observation],
    store: &S,
    options: &RegionCheckOptions,
) -> ModelOutcome
where
    S: DefinitionStore + ?Sized,
{
    let region_codelist = store.region_codelist();
    let constituents = mapping.constituent_names();
    let aggregates: BTreeMap<&str, &CommonRegion> = mapping
        .common_regions
        .iter()
        .filter(|c| !c.constituents.is_empty())
        .map(|c| (c.name.as_str(), c))
        .collect();

    let mut out = ModelOutcome::default();
    let regions: BTreeSet<&str> = rows.iter().map(|r| r.region.as_str()).collect();
    for region in regions {
        if aggregates.contains_key(region) {
            out.common.push(region.to_string());
        } else if mapping.native(region).is_some() {
            if !constituents.contains(region) {
                out.unchecked.push(region.to_string());
            }
        } else if region_codelist.contains(region) {
            out.unchecked.push(region.to_string());
        } else {
            out.unknown.push(region.to_string());
        }
    }

    // (scenario, region, variable, unit, time) of reported common-region rows.
    let mut reported: HashMap<(&str, &str, &str, &str, i32), f64> = HashMap::new();
    // (scenario, region, variable, time), summed over units.
    let mut weights: HashMap<(&str, &str, &str, i32), f64> = HashMap::new();
    let mut to_aggregate: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();

    for &row in rows {
        let (scenario, region, variable) = (row.scenario.as_str(), row.region.as_str(), row.variable.as_str());
        *weights.entry((scenario, region, variable, row.time)).or_insert(0.0) += row.value;

        let Some(code) = store.get_variable(variable) else {
            out.excluded.push(row.clone());
            continue;
        };
        if aggregates.contains_key(region) {
            match reported.entry((scenario, region, variable, row.unit.as_str(), row.time)) {
                Entry::Occupied(mut entry) => {
                    debug!(model = %mapping.model, scenario, region, variable, time = row.time, "duplicate reported value, summed");
                    *entry.get_mut() += row.value;
                }
                Entry::Vacant(entry) => {
                    entry.insert(row.value);
                }
            }
            out.processed.push(row.clone());
            out.touched = true;
        } else if let Some(native) = mapping.native(region) {
            out.processed.push(row.with_region(native.target_name()));
            out.touched = true;
            if constituents.contains(region) && !code.skip_region_aggregation {
                to_aggregate.entry(variable).or_default().push(row);
            }
        } else if region_codelist.contains(region) {
            out.processed.push(row.clone());
        } else {
            out.excluded.push(row.clone());
        }
    }

    for (variable, variable_rows) in &to_aggregate {
        let Some(code) = store.get_variable(variable) else { continue };
        let weight_variable = match &code.region_aggregation {
            AggregationMethod::WeightedMean { weight } => Some(weight.as_str()),
            _ => None,
        };

        for common in aggregates.values() {
            let mut groups: BTreeMap<(&str, &str, i32), Vec<Constituent>> = BTreeMap::new();
            for row in variable_rows.iter().filter(|r| common.constituents.contains(&r.region)) {
                let weight = weight_variable
                    .and_then(|w| weights.get(&(row.scenario.as_str(), row.region.as_str(), w, row.time)).copied());
                groups
                    .entry((row.scenario.as_str(), row.unit.as_str(), row.time))
                    .or_default()
                    .push(Constituent { value: row.value, weight });
            }

            for ((scenario, unit, time), values) in groups {
                let Some(aggregated) = combine(&code.region_aggregation, &values) else {
                    debug!(model = %mapping.model, variable, region = %common.name, time, "missing weights, not aggregated");
                    continue;
                };
                match reported.get(&(scenario, common.name.as_str(), *variable, unit, time)) {
                    Some(&value) => {
                        if let Some((difference, relative_difference_pct)) = compare(value, aggregated, options) {
                            out.failures.push(RegionFailure {
                                model: mapping.model.clone(),
                                scenario: scenario.to_string(),
                                region: common.name.clone(),
                                variable: variable.to_string(),
                                unit: unit.to_string(),
                                time,
                                reported: value,
                                aggregated,
                                difference,
                                relative_difference_pct,
                            });
                        }
                    }
                    None => out.processed.push(Observation::new(
                        mapping.model.as_str(),
                        scenario,
                        common.name.as_str(),
                        *variable,
                        unit,
                        time,
                        aggregated,
                    )),
                }
            }
        }
    }
    out
}

fn failure_order(f: &RegionFailure) -> (&str, &str, &str, &str, &str, i32) {
    (&f.model, &f.scenario, &f.region, &f.variable, &f.unit, f.time)
}

/// Checks reported common-region values against the aggregate of their
/// native constituents and derives the region-processed dataset.
///
/// `store` and `processor` must share their codelists. Models without a
/// mapping, regions the mapping and codelist do not know, and variables
/// outside the codelist are reported and their rows excluded; none of these
/// abort the check.
#[instrument(skip_all, fields(rows = dataset.len()))]
pub fn check_region_aggregates<S, R>(
    dataset: &Dataset,
    store: &S,
    processor: &R,
    options: &RegionCheckOptions,
) -> CheckResult<RegionAggregationCheckResult>
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    options.validate()?;
    ensure_same_codelists(store, processor)?;
    for model in processor.models() {
        if let Some(mapping) = processor.mapping(model) {
            mapping.validate(processor.region_codelist())?;
        }
    }

    let mut result = RegionAggregationCheckResult::default();
    for variable in dataset.variables() {
        match store.get_variable(variable) {
            None => result.unknown_variables.push(variable.to_string()),
            Some(code) if code.skip_region_aggregation => result.skipped_variables.push(variable.to_string()),
            Some(_) => {}
        }
    }

    let mut by_model: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for row in dataset.iter() {
        by_model.entry(row.model.as_str()).or_default().push(row);
    }

    let mut processed = Vec::new();
    let mut excluded = Vec::new();
    let mut failures = Vec::new();
    let mut touched = false;

    for (model, rows) in by_model {
        let Some(mapping) = processor.mapping(model) else {
            result.unknown_models.push(model.to_string());
            excluded.extend(rows.into_iter().cloned());
            continue;
        };

        let outcome = process_model(mapping, &rows, store, options);
        debug!(
            model,
            processed = outcome.processed.len(),
            excluded = outcome.excluded.len(),
            failures = outcome.failures.len(),
            "processed model regions"
        );
        result.aggregation_map.insert(
            model.to_string(),
            mapping
                .common_regions
                .iter()
                .filter(|c| !c.constituents.is_empty())
                .map(|c| (c.name.clone(), c.constituents.clone()))
                .collect(),
        );
        for (target, regions) in [
            (&mut result.common_regions, outcome.common),
            (&mut result.unchecked_regions, outcome.unchecked),
            (&mut result.unknown_regions, outcome.unknown),
        ] {
            if !regions.is_empty() {
                target.insert(model.to_string(), regions);
            }
        }
        touched |= outcome.touched;
        processed.extend(outcome.processed);
        excluded.extend(outcome.excluded);
        failures.extend(outcome.failures);
    }

    if !result.unknown_models.is_empty() {
        warn!(models = ?result.unknown_models, "no region mapping for models, rows excluded");
    }
    result.excluded = Dataset::new(excluded);

    if touched {
        failures.sort_by(|a, b| failure_order(a).cmp(&failure_order(b)));
        result.processed = Dataset::new(processed);
        result.failures = Some(failures);
    }
    info!(
        processed = result.processed.len(),
        excluded = result.excluded.len(),
        failures = result.failure_count(),
        "region aggregation check finished"
    );
    Ok(result)
}

/// Renames native regions and adds common-region aggregates, returning the
/// processed dataset and the rows that could not be mapped.
pub fn map_regions<S, R>(dataset: &Dataset, store: &S, processor: &R) -> CheckResult<(Dataset, Dataset)>
where
    S: DefinitionStore + ?Sized,
    R: RegionMappingStore + ?Sized,
{
    let result = check_region_aggregates(dataset, store, processor, &RegionCheckOptions::default())?;
    Ok((result.processed, result.excluded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Filter;
    use crate::error::CheckError;
    use crate::store::{
        DataStructureDefinition, NativeRegion, RegionCode, RegionCodeList, RegionProcessor, VariableCode,
        VariableCodeList,
    };
    use rstest::rstest;

    fn dsd() -> DataStructureDefinition {
        DataStructureDefinition::new(
            VariableCodeList::from_codes(
                "variable",
                [
                    VariableCode::new("Primary Energy", "EJ/yr"),
                    VariableCode::new("Population", "million"),
                    VariableCode::new("Price|Carbon", "USD/t CO2").with_region_aggregation(
                        AggregationMethod::WeightedMean { weight: "Population".into() },
                    ),
                    VariableCode::new("Temperature", "K").skipping_region_aggregation(),
                ],
            ),
            RegionCodeList::from_codes("region", [RegionCode::new("World"), RegionCode::new("Europe")]),
        )
    }

    fn processor(dsd: &DataStructureDefinition) -> RegionProcessor {
        let mapping = RegionAggregationMapping::new("M")
            .with_native(NativeRegion::new("R1"))
            .with_native(NativeRegion::renamed("R2", "Region 2"))
            .with_native(NativeRegion::new("R3"))
            .with_common(CommonRegion::new("World", ["R1", "R2"]));
        RegionProcessor::new(dsd, [mapping]).unwrap()
    }

    fn obs(model: &str, region: &str, variable: &str, value: f64) -> Observation {
        Observation::new(model, "S", region, variable, "EJ/yr", 2030, value)
    }

    fn check(dataset: &Dataset) -> RegionAggregationCheckResult {
        let dsd = dsd();
        check_region_aggregates(dataset, &dsd, &processor(&dsd), &RegionCheckOptions::default()).unwrap()
    }

    fn value_of(dataset: &Dataset, region: &str, variable: &str) -> Option<f64> {
        dataset.iter().find(|r| r.region == region && r.variable == variable).map(|r| r.value)
    }

    #[test]
    fn test_five_percent_mismatch_fails() {
        let data = Dataset::new(vec![
            obs("M", "World", "Primary Energy", 100.0),
            obs("M", "R1", "Primary Energy", 40.0),
            obs("M", "R2", "Primary Energy", 65.0),
        ]);
        let result = check(&data);
        let failures = result.failures.as_deref().unwrap();
        assert_eq!(failures.len(), 1);
        let failure = &failures[0];
        assert_eq!((failure.reported, failure.aggregated, failure.difference), (100.0, 105.0, -5.0));
        assert_eq!(failure.relative_difference_pct, 5.0);
        assert_eq!(result.common_regions["M"], vec!["World"]);
    }

    #[test]
    fn test_round_trip_keeps_reported_values() {
        let data = Dataset::new(vec![
            obs("M", "World", "Primary Energy", 100.0),
            obs("M", "R1", "Primary Energy", 40.0),
            obs("M", "R2", "Primary Energy", 60.2),
        ]);
        let result = check(&data);
        assert_eq!(result.failures, Some(vec![]));

        let processed = &result.processed;
        let world = value_of(processed, "World", "Primary Energy").unwrap();
        assert_eq!(world, 100.0);
        let sum = value_of(processed, "R1", "Primary Energy").unwrap()
            + value_of(processed, "Region 2", "Primary Energy").unwrap();
        assert!((world - sum).abs() <= 0.01 * world);
        assert_eq!(value_of(processed, "R2", "Primary Energy"), None);
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn test_duplicate_reported_values_are_summed() {
        let data = Dataset::new(vec![
            obs("M", "World", "Primary Energy", 50.0),
            obs("M", "World", "Primary Energy", 50.0),
            obs("M", "R1", "Primary Energy", 40.0),
            obs("M", "R2", "Primary Energy", 60.0),
        ]);
        let result = check(&data);
        assert_eq!(result.failures, Some(vec![]));
    }

    #[test]
    fn test_unreported_common_region_is_aggregated() {
        let data = Dataset::new(vec![obs("M", "R1", "Primary Energy", 40.0), obs("M", "R2", "Primary Energy", 60.0)]);
        let result = check(&data);
        assert_eq!(value_of(&result.processed, "World", "Primary Energy"), Some(100.0));
        assert_eq!(result.aggregation_map["M"]["World"], vec!["R1", "R2"]);
        assert_eq!(result.status(), crate::aggregation::PassFail::Pass);
    }

    #[test]
    fn test_unknown_model_is_reported_not_raised() {
        let data = Dataset::new(vec![obs("M", "R1", "Primary Energy", 1.0), obs("Z", "World", "Primary Energy", 1.0)]);
        let result = check(&data);
        assert_eq!(result.unknown_models, vec!["Z"]);
        assert_eq!(result.excluded.filter(&Filter::new().model(["Z"])).len(), 1);
        assert!(!result.processed.models().contains("Z"));
    }

    #[test]
    fn test_unknown_regions_and_variables_are_excluded() {
        let data = Dataset::new(vec![
            obs("M", "R1", "Primary Energy", 1.0),
            obs("M", "Atlantis", "Primary Energy", 1.0),
            obs("M", "R1", "Secondary Energy", 1.0),
        ]);
        let result = check(&data);
        assert_eq!(result.unknown_regions["M"], vec!["Atlantis"]);
        assert_eq!(result.unknown_variables, vec!["Secondary Energy"]);
        assert_eq!(result.excluded.len(), 2);
        assert_eq!(result.processed.len(), 2);
    }

    #[test]
    fn test_unchecked_regions_pass_through() {
        let data = Dataset::new(vec![
            obs("M", "R1", "Primary Energy", 1.0),
            obs("M", "R3", "Primary Energy", 2.0),
            obs("M", "Europe", "Primary Energy", 3.0),
        ]);
        let result = check(&data);
        assert_eq!(result.unchecked_regions["M"], vec!["Europe", "R3"]);
        assert_eq!(value_of(&result.processed, "Europe", "Primary Energy"), Some(3.0));
        assert_eq!(value_of(&result.processed, "World", "Primary Energy"), Some(1.0));
    }

    #[test]
    fn test_nothing_to_process_yields_no_failures() {
        let data = Dataset::new(vec![obs("M", "Europe", "Primary Energy", 3.0)]);
        let result = check(&data);
        assert_eq!(result.failures, None);
        assert!(result.processed.is_empty());
    }

    #[test]
    fn test_codelist_mismatch_is_fatal() {
        let built_against = dsd();
        let processor = processor(&built_against);
        let other = DataStructureDefinition {
            region: Arc::new(RegionCodeList::from_codes("region", [RegionCode::new("World")])),
            ..dsd()
        };
        let err = check_region_aggregates(&Dataset::empty(), &other, &processor, &RegionCheckOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            CheckError::Configuration(ConfigurationError::CodelistMismatch { dimension: "region".into() })
        );
    }

    #[test]
    fn test_equal_codelists_from_separate_loads_are_accepted() {
        let processor = processor(&dsd());
        let data = Dataset::new(vec![obs("M", "R1", "Primary Energy", 1.0)]);
        assert!(check_region_aggregates(&data, &dsd(), &processor, &RegionCheckOptions::default()).is_ok());
    }

    #[test]
    fn test_weighted_mean_uses_weight_variable() {
        let data = Dataset::new(vec![
            obs("M", "R1", "Price|Carbon", 10.0),
            obs("M", "R2", "Price|Carbon", 20.0),
            obs("M", "R1", "Population", 1.0),
            obs("M", "R2", "Population", 3.0),
        ]);
        let result = check(&data);
        assert_eq!(value_of(&result.processed, "World", "Price|Carbon"), Some(17.5));
        assert_eq!(value_of(&result.processed, "World", "Population"), Some(4.0));
    }

    #[test]
    fn test_weighted_mean_without_weights_is_not_aggregated() {
        let data = Dataset::new(vec![obs("M", "R1", "Price|Carbon", 10.0), obs("M", "R2", "Price|Carbon", 20.0)]);
        let result = check(&data);
        assert_eq!(value_of(&result.processed, "World", "Price|Carbon"), None);
    }

    #[test]
    fn test_skipped_variables_are_not_aggregated() {
        let data = Dataset::new(vec![
            obs("M", "World", "Temperature", 1.0),
            obs("M", "R1", "Temperature", 5.0),
            obs("M", "R2", "Temperature", 5.0),
        ]);
        let result = check(&data);
        assert_eq!(result.skipped_variables, vec!["Temperature"]);
        assert_eq!(result.failures, Some(vec![]));
        assert_eq!(value_of(&result.processed, "World", "Temperature"), Some(1.0));
    }

    #[test]
    fn test_map_regions_returns_processed_and_excluded() {
        let dsd = dsd();
        let data = Dataset::new(vec![obs("M", "R2", "Primary Energy", 2.0), obs("Z", "R2", "Primary Energy", 2.0)]);
        let (processed, excluded) = map_regions(&data, &dsd, &processor(&dsd)).unwrap();
        assert_eq!(processed.regions().into_iter().collect::<Vec<_>>(), vec!["Region 2", "World"]);
        assert_eq!(excluded.models().into_iter().collect::<Vec<_>>(), vec!["Z"]);
    }

    #[rstest]
    #[case(AggregationMethod::Sum, Some(6.0))]
    #[case(AggregationMethod::Mean, Some(2.0))]
    #[case(AggregationMethod::Min, Some(1.0))]
    #[case(AggregationMethod::Max, Some(3.0))]
    #[case(AggregationMethod::WeightedMean { weight: "w".into() }, None)]
    fn test_combine(#[case] method: AggregationMethod, #[case] expected: Option<f64>) {
        let values: Vec<Constituent> =
            [1.0, 2.0, 3.0].into_iter().map(|value| Constituent { value, weight: None }).collect();
        assert_eq!(combine(&method, &values), expected);
    }

    #[rstest]
    #[case(100.0, 100.5, None)]
    #[case(100.0, 105.0, Some((-5.0, 5.0)))]
    #[case(0.0, 1.0, Some((-1.0, f64::INFINITY)))]
    #[case(0.0, 0.0, None)]
    fn test_compare(#[case] reported: f64, #[case] aggregated: f64, #[case] expected: Option<(f64, f64)>) {
        assert_eq!(compare(reported, aggregated, &RegionCheckOptions::default()), expected);
    }
}
