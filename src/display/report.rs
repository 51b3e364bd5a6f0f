//! Human- and machine-readable renderings of check results.
use crate::aggregation::{RegionAggregationCheckResult, RegionFailure, VarAggregationCheckResult, VariableFailure};
use crate::error::ReportError;
use crate::validation::VettingOutcome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

const RULE: &str = "--------------------------------------------------";

pub trait ReportFormatter {
    fn variable_report(&self, result: &VarAggregationCheckResult) -> Result<String, ReportError>;
    fn region_report(&self, result: &RegionAggregationCheckResult) -> Result<String, ReportError>;

    fn outcome_report(&self, outcome: &VettingOutcome) -> Result<String, ReportError> {
        match outcome {
            VettingOutcome::VariableAggregation(result) => self.variable_report(result),
            VettingOutcome::RegionAggregation(result) => self.region_report(result),
        }
    }
}

/// Tree-style plain text, one branch per failing aggregate.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatter {
    /// Rows listed per branch before the rest is summarised.
    pub max_rows: usize,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self { max_rows: 20 }
    }
}

impl TextFormatter {
    fn write_tree<T>(
        &self,
        out: &mut String,
        branches: &BTreeMap<String, Vec<&T>>,
        leaf: impl Fn(&T) -> String,
    ) -> fmt::Result {
        for (i, (title, rows)) in branches.iter().enumerate() {
            let last_branch = i == branches.len() - 1;
            let (connector, stem) = if last_branch { ("`--", "    ") } else { ("|--", "|   ") };
            writeln!(out, "{connector} {title}")?;

            let shown = rows.len().min(self.max_rows);
            let hidden = rows.len() - shown;
            for (j, row) in rows.iter().take(shown).enumerate() {
                let last_row = j == shown - 1 && hidden == 0;
                let connector = if last_row { "`--" } else { "|--" };
                writeln!(out, "{stem}{connector} {}", leaf(*row))?;
            }
            if hidden > 0 {
                writeln!(out, "{stem}`-- ... and {hidden} more")?;
            }
        }
        Ok(())
    }

    fn write_list(out: &mut String, title: &str, names: &[String]) -> fmt::Result {
        if !names.is_empty() {
            writeln!(out, "{title}: {}", names.join(", "))?;
        }
        Ok(())
    }

    fn write_per_model(out: &mut String, title: &str, regions: &BTreeMap<String, Vec<String>>) -> fmt::Result {
        for (model, names) in regions {
            writeln!(out, "{title} ({model}): {}", names.join(", "))?;
        }
        Ok(())
    }

    fn render_variables(&self, result: &VarAggregationCheckResult) -> Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "VARIABLE AGGREGATION CHECK: {}", result.status())?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Checked aggregates: {} | Failures: {}", result.aggregation_map.len(), result.failures.len())?;

        let mut branches: BTreeMap<String, Vec<&VariableFailure>> = BTreeMap::new();
        for failure in &result.failures {
            let title = match &failure.hierarchy {
                Some(label) => format!("{} [{}]", failure.variable, label),
                None => failure.variable.clone(),
            };
            branches.entry(title).or_default().push(failure);
        }
        self.write_tree(&mut out, &branches, |f| {
            format!(
                "{} / {} / {} / {}: aggregate {:.3}, components {:.3}, difference {:.3}",
                f.model, f.scenario, f.region, f.time, f.aggregate, f.components, f.difference
            )
        })?;

        Self::write_list(&mut out, "Unknown variables", &result.unknown_vars)?;
        Self::write_list(&mut out, "Skipped (no components in data)", &result.skipped_vars)?;
        Self::write_list(&mut out, "Not checked", &result.not_checked_vars)?;
        Ok(out)
    }

    fn render_regions(&self, result: &RegionAggregationCheckResult) -> Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "REGION AGGREGATION CHECK: {}", result.status())?;
        writeln!(out, "{RULE}")?;

        match &result.failures {
            None => writeln!(out, "No rows required region processing.")?,
            Some(failures) => {
                writeln!(
                    out,
                    "Processed rows: {} | Excluded rows: {} | Failures: {}",
                    result.processed.len(),
                    result.excluded.len(),
                    failures.len()
                )?;
                let mut branches: BTreeMap<String, Vec<&RegionFailure>> = BTreeMap::new();
                for failure in failures {
                    let title = format!("{} / {} / {}", failure.model, failure.region, failure.variable);
                    branches.entry(title).or_default().push(failure);
                }
                self.write_tree(&mut out, &branches, |f| {
                    format!(
                        "{} / {}: reported {:.3}, aggregated {:.3}, difference {:.3} ({:.2}%)",
                        f.scenario, f.time, f.reported, f.aggregated, f.difference, f.relative_difference_pct
                    )
                })?;
            }
        }

        Self::write_list(&mut out, "Unknown models", &result.unknown_models)?;
        Self::write_per_model(&mut out, "Unknown regions", &result.unknown_regions)?;
        Self::write_per_model(&mut out, "Unchecked regions", &result.unchecked_regions)?;
        Self::write_list(&mut out, "Unknown variables", &result.unknown_variables)?;
        Self::write_list(&mut out, "Skipped variables", &result.skipped_variables)?;
        Ok(out)
    }
}

impl ReportFormatter for TextFormatter {
    fn variable_report(&self, result: &VarAggregationCheckResult) -> Result<String, ReportError> {
        Ok(self.render_variables(result)?)
    }

    fn region_report(&self, result: &RegionAggregationCheckResult) -> Result<String, ReportError> {
        Ok(self.render_regions(result)?)
    }
}

/// JSON rendering of the result records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    fn render<T: Serialize>(&self, value: &T) -> Result<String, ReportError> {
        let json = if self.pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
        Ok(json)
    }
}

impl ReportFormatter for JsonFormatter {
    fn variable_report(&self, result: &VarAggregationCheckResult) -> Result<String, ReportError> {
        self.render(result)
    }

    fn region_report(&self, result: &RegionAggregationCheckResult) -> Result<String, ReportError> {
        self.render(result)
    }

    fn outcome_report(&self, outcome: &VettingOutcome) -> Result<String, ReportError> {
        self.render(outcome)
    }
}

impl fmt::Display for VarAggregationCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TextFormatter::default().render_variables(self)?)
    }
}

impl fmt::Display for RegionAggregationCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TextFormatter::default().render_regions(self)?)
    }
}

impl fmt::Display for VettingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VettingOutcome::VariableAggregation(result) => fmt::Display::fmt(result, f),
            VettingOutcome::RegionAggregation(result) => fmt::Display::fmt(result, f),
        }
    }
}
