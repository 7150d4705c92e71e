use crate::auth::{AuthSource, User};
use derive_more::Display;
use std::fmt;

/// Why a connection must not exist right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    Disabled,
    AuthLoading,
    NoUser,
    RoleNotAllowed,
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ClosedReason::Disabled => "disabled",
            ClosedReason::AuthLoading => "auth loading",
            ClosedReason::NoUser => "no user",
            ClosedReason::RoleNotAllowed => "role not allowed",
        };
        f.write_str(reason)
    }
}

/// Identity of the inputs an open gate was evaluated with. A live session is replaced
/// when the key changes, even if the gate stays open.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub struct GateKey(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Open(GateKey),
    Closed(ClosedReason),
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, GateDecision::Open(_))
    }
}

/// Snapshot of everything the gate looks at.
#[derive(Debug, Clone)]
pub struct GateInputs<'a> {
    pub enabled: bool,
    pub auth_loading: bool,
    pub user: Option<User>,
    pub allowed_roles: &'a [String],
}

impl<'a> GateInputs<'a> {
    pub fn collect(enabled: bool, allowed_roles: &'a [String], auth: &dyn AuthSource) -> Self {
        Self { enabled, auth_loading: auth.is_loading(), user: auth.current_user(), allowed_roles }
    }

    pub fn evaluate(&self) -> GateDecision {
        if !self.enabled {
            return GateDecision::Closed(ClosedReason::Disabled);
        }
        if self.auth_loading {
            return GateDecision::Closed(ClosedReason::AuthLoading);
        }
        let Some(user) = &self.user else {
            return GateDecision::Closed(ClosedReason::NoUser);
        };
        if !role_allowed(&user.role, self.allowed_roles) {
            return GateDecision::Closed(ClosedReason::RoleNotAllowed);
        }

        let mut allowed: Vec<String> = self.allowed_roles.iter().map(|r| r.to_lowercase()).collect();
        allowed.sort();
        allowed.dedup();
        GateDecision::Open(GateKey(format!("{}|{}", user.role.to_lowercase(), allowed.join(","))))
    }
}

/// Case-insensitive exact match of `role` against the allow-list.
pub fn role_allowed(role: &str, allowed_roles: &[String]) -> bool {
    !role.is_empty() && allowed_roles.iter().any(|allowed| allowed.to_lowercase() == role.to_lowercase())
}
