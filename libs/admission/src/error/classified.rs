use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::labels::LabelSet;
use crate::sampler::{SampledError, Sampler};

use super::status;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A rejection tagged with the wire status it should surface as.
///
/// The message is rendered on demand: the cause text, followed by the
/// offending series when one is attached and non-empty.
#[derive(Debug)]
pub struct ClassifiedError {
    cause: BoxError,
    code: u16,
    labels: Option<LabelSet>,
}

impl ClassifiedError {
    pub fn new(cause: impl Into<BoxError>, code: u16) -> Self {
        Self {
            cause: cause.into(),
            code,
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn validation(cause: impl Into<BoxError>) -> Self {
        Self::new(cause, status::VALIDATION)
    }

    pub fn validation_for_series(cause: impl Into<BoxError>, labels: LabelSet) -> Self {
        Self::validation(cause).with_labels(labels)
    }

    pub fn limit_exceeded(limit: u64) -> Self {
        Self::new(format!("limit {limit} exceeded"), status::LIMIT_EXCEEDED)
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        self.labels.as_ref()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.labels {
            Some(labels) if !labels.is_empty() => {
                write!(f, "{} This is for series {}", self.cause, labels)
            }
            _ => write!(f, "{}", self.cause),
        }
    }
}

impl StdError for ClassifiedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Rewrites a raw limit error into tenant-aware text, e.g. adding the
/// configured local and global limits the tenant ran into.
pub trait ErrorFormatter {
    fn format_error(&self, tenant_id: &str, err: BoxError) -> BoxError;
}

pub fn make_limit_error(
    formatter: &dyn ErrorFormatter,
    sampler: Option<&Arc<Sampler>>,
    tenant_id: &str,
    err: impl Into<BoxError>,
) -> SampledError {
    let formatted = formatter.format_error(tenant_id, err.into());
    Sampler::wrap_error(sampler, ClassifiedError::validation(formatted))
}

pub fn make_metric_limit_error(
    formatter: &dyn ErrorFormatter,
    sampler: Option<&Arc<Sampler>>,
    tenant_id: &str,
    labels: LabelSet,
    err: impl Into<BoxError>,
) -> SampledError {
    let formatted = formatter.format_error(tenant_id, err.into());
    Sampler::wrap_error(
        sampler,
        ClassifiedError::validation_for_series(formatted, labels),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{http_response_from_error, status_code_of};

    struct Prefixing;

    impl ErrorFormatter for Prefixing {
        fn format_error(&self, tenant_id: &str, err: BoxError) -> BoxError {
            format!("{err} (tenant {tenant_id})").into()
        }
    }

    #[test]
    fn message_without_labels_is_cause_text() {
        let err = ClassifiedError::validation("value out of bounds");
        assert_eq!(err.to_string(), "value out of bounds");
        assert_eq!(err.code(), 400);
        assert!(err.labels().is_none());
    }

    #[test]
    fn empty_label_set_is_not_rendered() {
        let err = ClassifiedError::validation_for_series("value out of bounds", LabelSet::default());
        assert_eq!(err.to_string(), "value out of bounds");
        assert_eq!(err.labels(), Some(&LabelSet::default()));
    }

    #[test]
    fn message_with_labels_names_the_series() {
        let labels = LabelSet::from_pairs([("__name__", "up"), ("job", "node")]);
        let err = ClassifiedError::validation_for_series("value out of bounds", labels);
        assert_eq!(
            err.to_string(),
            "value out of bounds This is for series {__name__=\"up\", job=\"node\"}"
        );
    }

    #[test]
    fn limit_exceeded_names_the_limit() {
        let err = ClassifiedError::limit_exceeded(1000);
        assert_eq!(err.to_string(), "limit 1000 exceeded");
        assert_eq!(err.code(), 422);
    }

    #[test]
    fn make_limit_error_formats_then_classifies() {
        let err = make_limit_error(&Prefixing, None, "tenant-a", "too many series");
        assert_eq!(err.to_string(), "too many series (tenant tenant-a)");
        assert_eq!(status_code_of(&err), Some(400));
    }

    #[test]
    fn make_metric_limit_error_keeps_series_identity() {
        let labels = LabelSet::from_pairs([("__name__", "http_requests_total")]);
        let err = make_metric_limit_error(&Prefixing, None, "t", labels, "per-metric limit");
        let response = http_response_from_error(&err).expect("classified");
        assert_eq!(response.code, 400);
        assert_eq!(
            response.body,
            "per-metric limit (tenant t) This is for series {__name__=\"http_requests_total\"}"
        );
    }
}
