//! The immutable observation table that all checks read from.
use super::observation::{Dimension, Observation};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Group key produced by [`Dataset::to_series`]: one label per requested
/// dimension, in request order, plus the time stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey<'a> {
    pub labels: SmallVec<[&'a str; 4]>,
    pub time: i32,
}

/// A collection of observations, kept sorted by their identifying columns.
///
/// The checks never mutate a `Dataset`; filtering and re-aggregation always
/// produce a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct Dataset {
    rows: Vec<Observation>,
}

impl From<Vec<Observation>> for Dataset {
    fn from(rows: Vec<Observation>) -> Self { Self::new(rows) }
}

impl From<Dataset> for Vec<Observation> {
    fn from(dataset: Dataset) -> Self { dataset.rows }
}

impl FromIterator<Observation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Dataset {
    pub fn new(mut rows: Vec<Observation>) -> Self {
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { rows }
    }

    pub fn empty() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn rows(&self) -> &[Observation] { &self.rows }
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> { self.rows.iter() }

    /// Distinct labels along one dimension.
    pub fn dimension_values(&self, dim: Dimension) -> BTreeSet<&str> {
        self.rows.iter().map(|row| row.label(dim)).collect()
    }

    pub fn models(&self) -> BTreeSet<&str> { self.dimension_values(Dimension::Model) }
    pub fn scenarios(&self) -> BTreeSet<&str> { self.dimension_values(Dimension::Scenario) }
    pub fn regions(&self) -> BTreeSet<&str> { self.dimension_values(Dimension::Region) }
    pub fn variables(&self) -> BTreeSet<&str> { self.dimension_values(Dimension::Variable) }

    /// Units used per variable.
    pub fn unit_mapping(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut mapping: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for row in &self.rows {
            mapping.entry(row.variable.as_str()).or_default().insert(row.unit.as_str());
        }
        mapping
    }

    pub fn filter(&self, filter: &Filter) -> Dataset {
        Self { rows: self.rows.iter().filter(|row| filter.matches(row)).cloned().collect() }
    }

    /// Sums values grouped by `group_keys` and time.
    ///
    /// All dimensions not listed are summed over, so `to_series(&[])` yields
    /// one total per time stamp.
    pub fn to_series(&self, group_keys: &[Dimension]) -> BTreeMap<SeriesKey<'_>, f64> {
        let mut series = BTreeMap::new();
        for row in &self.rows {
            let key = SeriesKey {
                labels: group_keys.iter().map(|dim| row.label(*dim)).collect(),
                time: row.time,
            };
            *series.entry(key).or_insert(0.0) += row.value;
        }
        series
    }

    /// Joins several datasets into one.
    pub fn concat(parts: impl IntoIterator<Item = Dataset>) -> Dataset {
        Self::new(parts.into_iter().flat_map(|part| part.rows).collect())
    }
}

/// Row selector for [`Dataset::filter`].
///
/// Each set dimension restricts the rows to the listed labels; unset
/// dimensions match everything. With `keep = false` the selection is inverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    selections: BTreeMap<Dimension, BTreeSet<String>>,
    keep: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self { selections: BTreeMap::new(), keep: true }
    }
}

impl Filter {
    pub fn new() -> Self { Self::default() }

    pub fn select<I, S>(mut self, dim: Dimension, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections.entry(dim).or_default().extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn model<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.select(Dimension::Model, labels)
    }

    pub fn scenario<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.select(Dimension::Scenario, labels)
    }

    pub fn region<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.select(Dimension::Region, labels)
    }

    pub fn variable<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.select(Dimension::Variable, labels)
    }

    /// Invert the filter: drop the selected rows and keep the rest.
    pub fn exclude(mut self) -> Self {
        self.keep = false;
        self
    }

    pub fn matches(&self, row: &Observation) -> bool {
        let selected = self
            .selections
            .iter()
            .all(|(dim, labels)| labels.contains(row.label(*dim)));
        selected == self.keep
    }
}
