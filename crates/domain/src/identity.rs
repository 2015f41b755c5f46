//! The authenticated caller, passed explicitly into every core operation.

use common::UserId;

use crate::error::ValidationError;

/// Role granted by the upstream identity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    /// Parses a role name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Some(Role::Customer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdentity {
    user_id: UserId,
    role: Role,
}

impl UserIdentity {
    /// Creates an identity. User ids must be positive.
    pub fn new(user_id: UserId, role: Role) -> Result<Self, ValidationError> {
        if !user_id.is_valid() {
            return Err(ValidationError::InvalidUserId(user_id.as_i64()));
        }
        Ok(Self { user_id, role })
    }

    /// Creates a customer identity.
    pub fn customer(user_id: UserId) -> Result<Self, ValidationError> {
        Self::new(user_id, Role::Customer)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
