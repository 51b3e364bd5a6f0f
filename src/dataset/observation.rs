use serde::{Deserialize, Serialize};
use std::fmt;

/// One dimension of an IAMC table.
///
/// `Unit` only exists on the data side; data structure definitions carry no
/// unit codelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Model,
    Scenario,
    Region,
    Variable,
    Unit,
}

impl Dimension {
    pub const CODELIST_DIMENSIONS: [Dimension; 4] =
        [Dimension::Model, Dimension::Scenario, Dimension::Region, Dimension::Variable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Model => "model",
            Dimension::Scenario => "scenario",
            Dimension::Region => "region",
            Dimension::Variable => "variable",
            Dimension::Unit => "unit",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single data point of a scenario dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub model: String,
    pub scenario: String,
    pub region: String,
    pub variable: String,
    pub unit: String,
    pub time: i32,
    pub value: f64,
}

impl Observation {
    pub fn new(
        model: impl Into<String>,
        scenario: impl Into<String>,
        region: impl Into<String>,
        variable: impl Into<String>,
        unit: impl Into<String>,
        time: i32,
        value: f64,
    ) -> Self {
        Self {
            model: model.into(),
            scenario: scenario.into(),
            region: region.into(),
            variable: variable.into(),
            unit: unit.into(),
            time,
            value,
        }
    }

    /// The label this observation carries along `dim`.
    #[inline]
    pub fn label(&self, dim: Dimension) -> &str {
        match dim {
            Dimension::Model => &self.model,
            Dimension::Scenario => &self.scenario,
            Dimension::Region => &self.region,
            Dimension::Variable => &self.variable,
            Dimension::Unit => &self.unit,
        }
    }

    /// Sort key over every identifying column.
    pub(crate) fn sort_key(&self) -> (&str, &str, &str, &str, &str, i32) {
        (&self.model, &self.scenario, &self.region, &self.variable, &self.unit, self.time)
    }

    /// Copy of this observation with another region label.
    pub fn with_region(&self, region: impl Into<String>) -> Self {
        Self { region: region.into(), ..self.clone() }
    }
}
