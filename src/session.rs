//! Boundary to the external session gate
use super::shift::EmployeeId;
use std::collections::HashMap;

/// Resolves a session token to the employee it was issued for.
///
/// Issuing tokens and expiring them happens outside this crate; an expired or
/// unknown token simply resolves to `None`.
pub trait SessionGate {
    fn resolve(&self, token: &str) -> Option<EmployeeId>;
}

impl SessionGate for HashMap<String, EmployeeId> {
    fn resolve(&self, token: &str) -> Option<EmployeeId> {
        self.get(token).cloned()
    }
}
