use std::error::Error as StdError;
use std::fmt;

use super::status_code_of;

/// A rejection attributed to a tenant. Holds only a copy of the original
/// message and its status code, never the original error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    message: String,
    code: Option<u16>,
}

impl UserError {
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for UserError {}

/// Prefixes `err` with `user=<tenant_id>: `.
pub fn wrap_with_user(err: &(dyn StdError + 'static), tenant_id: &str) -> UserError {
    UserError {
        message: format!("user={tenant_id}: {err}"),
        code: status_code_of(err),
    }
}
