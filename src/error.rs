//! Error types shared by the definition store and the aggregation checkers.
//!
//! Only configuration and argument problems abort a call. Anything that is
//! merely unknown or inconsistent in the dataset is reported in the check
//! results instead.
use thiserror::Error;

/// Problems with the reference data itself. These are fatal and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("region processor was built against a different {dimension} codelist than the definitions")]
    CodelistMismatch { dimension: String },
    #[error("malformed components for variable '{variable}': {reason}")]
    MalformedComponents { variable: String, reason: String },
    #[error("component declarations form a cycle: {}", .variables.join(" -> "))]
    ComponentCycle { variables: Vec<String> },
    #[error("region '{region}' of model '{model}' is a constituent of several common regions: {}", .common_regions.join(", "))]
    OverlappingRegions { model: String, region: String, common_regions: Vec<String> },
    #[error("common region '{common_region}' of model '{model}' lists '{region}', which is not a native region of that model")]
    UndeclaredConstituent { model: String, common_region: String, region: String },
    #[error("common region '{region}' of model '{model}' is not in the region codelist")]
    UnknownCommonRegion { model: String, region: String },
    #[error("native region '{region}' of model '{model}' is declared more than once")]
    DuplicateNativeRegion { model: String, region: String },
    #[error("regions {} of model '{model}' all map to '{target}'", .regions.join(", "))]
    ConflictingRegionTarget { model: String, target: String, regions: Vec<String> },
    #[error("model '{model}' has more than one region mapping")]
    DuplicateMapping { model: String },
}

/// Problems with what the caller passed in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidArgumentError {
    #[error("unsupported keyword arguments: {}", .names.join(", "))]
    UnsupportedKeywords { names: Vec<String> },
    #[error("invalid tolerance '{name}': {value} (must be finite and non-negative)")]
    InvalidTolerance { name: String, value: f64 },
    #[error("malformed variable names: {}", .names.join(", "))]
    MalformedVariables { names: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgumentError),
    #[error("failed to load definitions: {0}")]
    Load(String),
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// Failures while rendering a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_keywords_lists_every_name() {
        let err: CheckError = InvalidArgumentError::UnsupportedKeywords {
            names: vec!["foo".into(), "bar".into()],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid argument: unsupported keyword arguments: foo, bar"
        );
    }

    #[test]
    fn test_cycle_message_joins_path() {
        let err = ConfigurationError::ComponentCycle {
            variables: vec!["A".into(), "B".into(), "A".into()],
        };
        assert!(err.to_string().ends_with("A -> B -> A"));
    }
}
