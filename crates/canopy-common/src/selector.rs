//! Seed selector evaluation
//!
//! ControllerRegistrations restrict the seeds they may be installed on with a
//! standard Kubernetes `LabelSelector`. The selector arrives as untyped API
//! data, so it is parsed into a [`SeedSelector`] first; parsing is where a
//! malformed selector (unknown operator, missing values, bad key) is caught.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

/// Maximum length of the name segment of a label key, and of a label value
const MAX_LABEL_NAME_LEN: usize = 63;

/// Maximum length of a label key prefix
const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Operator for label selector requirements
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorOperator {
    /// Label value must be in the specified set
    In,
    /// Label value must not be in the specified set
    NotIn,
    /// Label must exist (value ignored)
    Exists,
    /// Label must not exist (value ignored)
    DoesNotExist,
}

impl SelectorOperator {
    fn parse(op: &str) -> Result<Self, String> {
        match op {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(format!("unknown operator {:?}", other)),
        }
    }

    /// Check if a label value matches this requirement
    ///
    /// - `label_value`: The actual label value (None if label doesn't exist)
    /// - `values`: The values specified in the requirement
    pub fn matches(&self, label_value: Option<&str>, values: &[String]) -> bool {
        match self {
            Self::In => label_value.is_some_and(|v| values.iter().any(|req| req == v)),
            Self::NotIn => {
                label_value.is_none() || !values.iter().any(|req| Some(req.as_str()) == label_value)
            }
            Self::Exists => label_value.is_some(),
            Self::DoesNotExist => label_value.is_none(),
        }
    }
}

/// A validated label requirement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: SelectorOperator,
    values: Vec<String>,
}

impl Requirement {
    /// Check if a label set matches this requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key).map(|s| s.as_str());
        self.operator.matches(value, &self.values)
    }
}

/// A parsed, validated seed selector
///
/// `matchLabels` entries become `In` requirements with a single value. All
/// requirements must hold for a seed to match; the empty selector matches
/// every seed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedSelector {
    requirements: Vec<Requirement>,
}

impl SeedSelector {
    /// Parse a Kubernetes label selector
    ///
    /// Returns a description of the first problem found on failure.
    pub fn parse(selector: &LabelSelector) -> Result<Self, String> {
        let mut requirements = Vec::new();

        for (key, value) in selector.match_labels.iter().flatten() {
            validate_key(key)?;
            validate_value(key, value)?;
            requirements.push(Requirement {
                key: key.clone(),
                operator: SelectorOperator::In,
                values: vec![value.clone()],
            });
        }

        for expr in selector.match_expressions.iter().flatten() {
            requirements.push(parse_requirement(expr)?);
        }

        Ok(Self { requirements })
    }

    /// Check if the given labels satisfy every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| req.matches(labels))
    }
}

fn parse_requirement(expr: &LabelSelectorRequirement) -> Result<Requirement, String> {
    validate_key(&expr.key)?;
    let operator = SelectorOperator::parse(&expr.operator)?;
    let values = expr.values.clone().unwrap_or_default();

    match operator {
        SelectorOperator::In | SelectorOperator::NotIn if values.is_empty() => Err(format!(
            "operator {} on key {:?} requires at least one value",
            expr.operator, expr.key
        )),
        SelectorOperator::Exists | SelectorOperator::DoesNotExist if !values.is_empty() => {
            Err(format!(
                "operator {} on key {:?} must not have values",
                expr.operator, expr.key
            ))
        }
        _ => {
            for value in &values {
                validate_value(&expr.key, value)?;
            }
            Ok(Requirement {
                key: expr.key.clone(),
                operator,
                values,
            })
        }
    }
}

/// Validate a label key: an optional DNS subdomain prefix and `/`, then a
/// name segment
fn validate_key(key: &str) -> Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if !is_dns_subdomain(prefix) {
                return Err(format!("label key {:?} has an invalid prefix", key));
            }
            name
        }
        None => key,
    };

    if name.is_empty() || !is_label_segment(name) {
        return Err(format!("invalid label key {:?}", key));
    }
    Ok(())
}

/// Validate a label value; the empty value is allowed
fn validate_value(key: &str, value: &str) -> Result<(), String> {
    if value.is_empty() || is_label_segment(value) {
        Ok(())
    } else {
        Err(format!("invalid value {:?} for label key {:?}", value, key))
    }
}

/// At most 63 alphanumerics, '-', '_' or '.', starting and ending alphanumeric
fn is_label_segment(s: &str) -> bool {
    s.len() <= MAX_LABEL_NAME_LEN
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && s.starts_with(|c: char| c.is_ascii_alphanumeric())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric())
}

/// Dot-separated lowercase DNS labels, at most 253 characters in total
fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LABEL_PREFIX_LEN
        && s.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

/// Evaluate an optional selector against seed labels
///
/// A missing selector matches every seed.
pub fn selector_matches(
    selector: Option<&LabelSelector>,
    labels: &BTreeMap<String, String>,
) -> Result<bool, String> {
    match selector {
        None => Ok(true),
        Some(selector) => Ok(SeedSelector::parse(selector)?.matches(labels)),
    }
}
