//! Tolerances and switches accepted by the aggregation checks.
use crate::error::{CheckResult, InvalidArgumentError};
use crate::names::validate_name;
use crate::store::TolerancePatch;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RTOL: f64 = 1e-5;
pub const DEFAULT_ATOL: f64 = 1e-8;
/// Default relative tolerance for region checks (1 %).
pub const DEFAULT_RTOL_DIFFERENCE: f64 = 0.01;

/// Absolute plus relative tolerance, combined additively:
/// `|aggregate - components| <= atol + rtol * |aggregate|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { rtol: DEFAULT_RTOL, atol: DEFAULT_ATOL }
    }
}

impl Tolerance {
    pub fn new(rtol: f64, atol: f64) -> CheckResult<Self> {
        let tolerance = Self { rtol, atol };
        tolerance.validate()?;
        Ok(tolerance)
    }

    /// Builds a tolerance from keyword-style options. Only `rtol` and `atol`
    /// are understood; every other key is reported in a single error.
    pub fn from_kwargs<'a, I>(kwargs: I) -> CheckResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut tolerance = Self::default();
        let mut unsupported = Vec::new();
        for (key, value) in kwargs {
            match key {
                "rtol" => tolerance.rtol = value,
                "atol" => tolerance.atol = value,
                other => unsupported.push(other.to_string()),
            }
        }
        if !unsupported.is_empty() {
            return Err(InvalidArgumentError::UnsupportedKeywords { names: unsupported }.into());
        }
        tolerance.validate()?;
        Ok(tolerance)
    }

    /// Applies a per-variable declaration on top of this tolerance.
    pub fn overlay(&self, patch: Option<&TolerancePatch>) -> Self {
        match patch {
            Some(patch) => Self {
                rtol: patch.rtol.unwrap_or(self.rtol),
                atol: patch.atol.unwrap_or(self.atol),
            },
            None => *self,
        }
    }

    /// Whether `components` is close enough to `aggregate`. NaN never is.
    #[inline]
    pub fn allows(&self, aggregate: f64, components: f64) -> bool {
        (aggregate - components).abs() <= self.atol + self.rtol * aggregate.abs()
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidArgumentError> {
        check_non_negative("rtol", self.rtol)?;
        check_non_negative("atol", self.atol)
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), InvalidArgumentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InvalidArgumentError::InvalidTolerance { name: name.to_string(), value })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariableCheckOptions {
    pub tolerance: Tolerance,
    /// When unset, only component sums that exceed their aggregate fail, so
    /// datasets that report just part of a breakdown can still be checked.
    pub require_complete: bool,
    /// Restricts the check to these aggregates.
    pub variables: Option<Vec<String>>,
}

impl Default for VariableCheckOptions {
    fn default() -> Self {
        Self { tolerance: Tolerance::default(), require_complete: true, variables: None }
    }
}

impl VariableCheckOptions {
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_variables<I: IntoIterator<Item = S>, S: Into<String>>(mut self, variables: I) -> Self {
        self.variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_incomplete(mut self) -> Self {
        self.require_complete = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidArgumentError> {
        self.tolerance.validate()?;
        if let Some(variables) = &self.variables {
            let malformed: Vec<String> = variables.iter().filter(|v| !validate_name(v)).cloned().collect();
            if !malformed.is_empty() {
                return Err(InvalidArgumentError::MalformedVariables { names: malformed });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionCheckOptions {
    /// Largest accepted relative difference between a reported common-region
    /// value and its aggregate, as a fraction of the reported value.
    pub rtol_difference: f64,
}

impl Default for RegionCheckOptions {
    fn default() -> Self {
        Self { rtol_difference: DEFAULT_RTOL_DIFFERENCE }
    }
}

impl RegionCheckOptions {
    pub fn from_kwargs<'a, I>(kwargs: I) -> CheckResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut options = Self::default();
        let mut unsupported = Vec::new();
        for (key, value) in kwargs {
            match key {
                "rtol_difference" => options.rtol_difference = value,
                other => unsupported.push(other.to_string()),
            }
        }
        if !unsupported.is_empty() {
            return Err(InvalidArgumentError::UnsupportedKeywords { names: unsupported }.into());
        }
        options.validate()?;
        Ok(options)
    }

    /// The tolerance expressed in percent.
    pub fn tolerance_pct(&self) -> f64 {
        self.rtol_difference * 100.0
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidArgumentError> {
        check_non_negative("rtol_difference", self.rtol_difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let tol = Tolerance::default();
        assert_eq!((tol.rtol, tol.atol), (1e-5, 1e-8));
        assert_eq!(RegionCheckOptions::default().tolerance_pct(), 1.0);
    }

    #[test]
    fn test_unsupported_keywords_are_all_named() {
        let err = Tolerance::from_kwargs([("rtol", 0.1), ("tolerance", 1.0), ("equal_nan", 1.0)]).unwrap_err();
        assert_eq!(
            err,
            CheckError::InvalidArgument(InvalidArgumentError::UnsupportedKeywords {
                names: vec!["tolerance".into(), "equal_nan".into()],
            })
        );
        assert!(err.to_string().contains("tolerance, equal_nan"));
    }

    #[test]
    fn test_kwargs_override_defaults() {
        let tol = Tolerance::from_kwargs([("atol", 0.5)]).unwrap();
        assert_eq!(tol, Tolerance { rtol: DEFAULT_RTOL, atol: 0.5 });
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_invalid_tolerance_values(#[case] value: f64) {
        assert!(matches!(
            Tolerance::new(value, 0.0),
            Err(CheckError::InvalidArgument(InvalidArgumentError::InvalidTolerance { .. }))
        ));
    }

    // Additive combination: exactly atol away passes, anything beyond fails.
    #[rstest]
    #[case(10.5, 10.0, true)]
    #[case(10.500001, 10.0, false)]
    #[case(9.5, 10.0, true)]
    #[case(f64::NAN, 10.0, false)]
    fn test_absolute_tolerance_boundary(#[case] aggregate: f64, #[case] components: f64, #[case] allowed: bool) {
        let tol = Tolerance::new(0.0, 0.5).unwrap();
        assert_eq!(tol.allows(aggregate, components), allowed);
    }

    #[test]
    fn test_relative_part_scales_with_aggregate() {
        let tol = Tolerance::new(0.01, 0.0).unwrap();
        assert!(tol.allows(1000.0, 990.0));
        assert!(!tol.allows(1000.0, 989.0));
    }

    #[test]
    fn test_overlay_only_replaces_declared_fields() {
        let base = Tolerance::default();
        let patched = base.overlay(Some(&TolerancePatch { rtol: Some(0.1), atol: None }));
        assert_eq!(patched, Tolerance { rtol: 0.1, atol: DEFAULT_ATOL });
        assert_eq!(base.overlay(None), base);
    }

    #[test]
    fn test_malformed_variable_list() {
        let options = VariableCheckOptions::default().with_variables(["Final Energy", "", "Energy||Coal"]);
        assert_eq!(
            options.validate(),
            Err(InvalidArgumentError::MalformedVariables { names: vec!["".into(), "Energy||Coal".into()] })
        );
    }

    #[test]
    fn test_region_kwargs() {
        assert_eq!(RegionCheckOptions::from_kwargs([("rtol_difference", 0.05)]).unwrap().tolerance_pct(), 5.0);
        assert!(RegionCheckOptions::from_kwargs([("rtol", 0.05)]).is_err());
    }

    #[rstest]
    #[case(r#"{"require_complete": false}"#, true)]
    #[case(r#"{"tolerance": {"atol": 0.5}, "variables": ["A"]}"#, true)]
    #[case(r#"{"require_complet": false}"#, false)]
    #[case(r#"{"tolerance": {"atoll": 0.5}}"#, false)]
    fn test_variable_options_reject_unknown_fields(#[case] json: &str, #[case] accepted: bool) {
        assert_eq!(serde_json::from_str::<VariableCheckOptions>(json).is_ok(), accepted);
    }
}
