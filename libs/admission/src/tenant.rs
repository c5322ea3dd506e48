use axum::http::HeaderMap;
use thiserror::Error;
use tracing::debug;

use crate::error::{status, HttpResponse};

pub const TENANT_HEADER: &str = "X-Scope-OrgID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("no org id")]
    Missing,
    #[error("invalid tenant id '{0}'")]
    Invalid(String),
}

impl From<TenantError> for HttpResponse {
    fn from(err: TenantError) -> Self {
        let code = match err {
            TenantError::Missing => status::UNAUTHORIZED,
            TenantError::Invalid(_) => status::VALIDATION,
        };
        HttpResponse::new(code, err.to_string())
    }
}

pub fn validate_tenant_id(tenant_id: &str) -> Result<(), TenantError> {
    if tenant_id.is_empty() || tenant_id.len() > 150 {
        return Err(TenantError::Invalid(tenant_id.to_string()));
    }

    if tenant_id == "." || tenant_id == ".." {
        return Err(TenantError::Invalid(tenant_id.to_string()));
    }

    if !tenant_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || "!-_.*'()".contains(ch))
    {
        return Err(TenantError::Invalid(tenant_id.to_string()));
    }

    Ok(())
}

pub fn tenant_from_headers(headers: &HeaderMap) -> Result<String, TenantError> {
    let raw = headers
        .get(TENANT_HEADER)
        .ok_or(TenantError::Missing)?
        .to_str()
        .map_err(|_| TenantError::Invalid("<non-ascii>".to_string()))?
        .trim();

    if raw.is_empty() {
        return Err(TenantError::Missing);
    }

    validate_tenant_id(raw)?;
    debug!(tenant_id = raw, "resolved tenant from request");
    Ok(raw.to_string())
}
