use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Anything that can live in a [`CodeList`](super::CodeList).
pub trait Code {
    fn name(&self) -> &str;
}

/// A code with no metadata beyond a description (models, scenarios).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCode {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Code for GenericCode {
    fn name(&self) -> &str { &self.name }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCode {
    pub name: String,
    #[serde(default)]
    pub hierarchy: Option<String>,
}

impl RegionCode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), hierarchy: None }
    }
}

impl Code for RegionCode {
    fn name(&self) -> &str { &self.name }
}

/// How values of constituent regions are combined into a common region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    Sum,
    #[serde(alias = "avg")]
    Mean,
    Min,
    Max,
    /// Mean weighted by the value of another variable in each constituent.
    WeightedMean { weight: String },
}

/// Per-variable tolerance declared in the codelist. Unset fields fall back to
/// the tolerance passed to the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TolerancePatch {
    #[serde(default)]
    pub rtol: Option<f64>,
    #[serde(default)]
    pub atol: Option<f64>,
}

fn unit_weight() -> f64 { 1.0 }

/// A component variable and the coefficient it enters the aggregate with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), weight: 1.0 }
    }

    pub fn weighted(name: impl Into<String>, weight: f64) -> Self {
        Self { name: name.into(), weight }
    }
}

/// One way of disaggregating a variable. Variables with several independent
/// hierarchies (e.g. final energy by sector and by carrier) carry one labelled
/// set per hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSet {
    #[serde(default)]
    pub label: Option<String>,
    pub members: Vec<Component>,
}

impl ComponentSet {
    pub fn unlabelled(members: Vec<Component>) -> Self {
        Self { label: None, members }
    }

    pub fn labelled(label: impl Into<String>, members: Vec<Component>) -> Self {
        Self { label: Some(label.into()), members }
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|c| c.name.as_str())
    }
}

/// Explicit component declaration of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ComponentsRepr", into = "ComponentsRepr")]
pub struct Components {
    pub sets: Vec<ComponentSet>,
}

impl Components {
    pub fn single(members: Vec<Component>) -> Self {
        Self { sets: vec![ComponentSet::unlabelled(members)] }
    }

    pub fn alternatives(sets: Vec<ComponentSet>) -> Self {
        Self { sets }
    }

    /// Convenience for the common case of unit-weight component names.
    pub fn names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self::single(names.into_iter().map(Component::new).collect())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ComponentRepr {
    Name(String),
    Weighted(Component),
}

impl From<ComponentRepr> for Component {
    fn from(repr: ComponentRepr) -> Self {
        match repr {
            ComponentRepr::Name(name) => Component::new(name),
            ComponentRepr::Weighted(component) => component,
        }
    }
}

/// Accepted shapes: a flat list of names or weighted components, a list of
/// `{label: [components]}` maps, or the serialised form of `Components` itself.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ComponentsRepr {
    Flat(Vec<ComponentRepr>),
    Labelled(Vec<BTreeMap<String, Vec<ComponentRepr>>>),
    Sets(Vec<ComponentSet>),
}

impl From<ComponentsRepr> for Components {
    fn from(repr: ComponentsRepr) -> Self {
        let convert = |members: Vec<ComponentRepr>| members.into_iter().map(Component::from).collect();
        match repr {
            ComponentsRepr::Flat(members) => Components::single(convert(members)),
            ComponentsRepr::Labelled(maps) => Components {
                sets: maps
                    .into_iter()
                    .flat_map(|map| map.into_iter())
                    .map(|(label, members)| ComponentSet::labelled(label, convert(members)))
                    .collect(),
            },
            ComponentsRepr::Sets(sets) => Components { sets },
        }
    }
}

impl From<Components> for ComponentsRepr {
    fn from(components: Components) -> Self {
        ComponentsRepr::Sets(components.sets)
    }
}

/// The contract of a single variable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCode {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Accepted units; empty means dimensionless.
    #[serde(default, deserialize_with = "one_or_many")]
    pub unit: Vec<String>,
    #[serde(default, alias = "check-aggregate")]
    pub check_aggregate: bool,
    #[serde(default)]
    pub components: Option<Components>,
    #[serde(default, alias = "skip-region-aggregation")]
    pub skip_region_aggregation: bool,
    #[serde(default, alias = "region-aggregation")]
    pub region_aggregation: AggregationMethod,
    #[serde(default)]
    pub tolerance: Option<TolerancePatch>,
}

impl VariableCode {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            unit: vec![unit.into()],
            check_aggregate: false,
            components: None,
            skip_region_aggregation: false,
            region_aggregation: AggregationMethod::Sum,
            tolerance: None,
        }
    }

    pub fn checked(mut self) -> Self {
        self.check_aggregate = true;
        self
    }

    pub fn with_components(mut self, components: Components) -> Self {
        self.components = Some(components);
        self
    }

    pub fn with_region_aggregation(mut self, method: AggregationMethod) -> Self {
        self.region_aggregation = method;
        self
    }

    pub fn skipping_region_aggregation(mut self) -> Self {
        self.skip_region_aggregation = true;
        self
    }

    pub fn with_tolerance(mut self, tolerance: TolerancePatch) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn accepts_unit(&self, unit: &str) -> bool {
        if self.unit.is_empty() {
            return unit.is_empty();
        }
        self.unit.iter().any(|u| u == unit)
    }
}

impl Code for VariableCode {
    fn name(&self) -> &str { &self.name }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(unit) if unit.is_empty() => Vec::new(),
        OneOrMany::One(unit) => vec![unit],
        OneOrMany::Many(units) => units,
        OneOrMany::Null(()) => Vec::new(),
    })
}
