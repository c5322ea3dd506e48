use thiserror::Error;
use tsdb_guard_admission::{LabelSet, LimitsConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("sample missing metric name")]
    MissingMetricName,
    #[error("sample invalid metric name: '{0}'")]
    InvalidMetricName(String),
    #[error("sample invalid label: '{0}'")]
    InvalidLabelName(String),
    #[error("series has too many labels (actual: {actual}, limit: {limit})")]
    TooManyLabels { actual: usize, limit: usize },
    #[error("label name too long: '{name}' (actual: {actual}, limit: {limit})")]
    LabelNameTooLong {
        name: String,
        actual: usize,
        limit: usize,
    },
    #[error("label value too long for label '{name}' (actual: {actual}, limit: {limit})")]
    LabelValueTooLong {
        name: String,
        actual: usize,
        limit: usize,
    },
    #[error("duplicate label name: '{0}'")]
    DuplicateLabelName(String),
}

/// Checks a series' labels against the tenant's limits. The first problem
/// found is returned.
pub fn validate_series(limits: &LimitsConfig, labels: &LabelSet) -> Result<(), ValidationError> {
    let metric_name = labels.metric_name().ok_or(ValidationError::MissingMetricName)?;
    if !is_valid_metric_name(metric_name) {
        return Err(ValidationError::InvalidMetricName(metric_name.to_string()));
    }

    if limits.max_label_names_per_series > 0 && labels.len() > limits.max_label_names_per_series {
        return Err(ValidationError::TooManyLabels {
            actual: labels.len(),
            limit: limits.max_label_names_per_series,
        });
    }

    if let Some(name) = labels.duplicate_name() {
        return Err(ValidationError::DuplicateLabelName(name.to_string()));
    }

    for label in labels.iter() {
        if !is_valid_label_name(&label.name) {
            return Err(ValidationError::InvalidLabelName(label.name.clone()));
        }
        if limits.max_label_name_length > 0 && label.name.len() > limits.max_label_name_length {
            return Err(ValidationError::LabelNameTooLong {
                name: label.name.clone(),
                actual: label.name.len(),
                limit: limits.max_label_name_length,
            });
        }
        if limits.max_label_value_length > 0 && label.value.len() > limits.max_label_value_length
        {
            return Err(ValidationError::LabelValueTooLong {
                name: label.name.clone(),
                actual: label.value.len(),
                limit: limits.max_label_value_length,
            });
        }
    }

    Ok(())
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == ':')
}
