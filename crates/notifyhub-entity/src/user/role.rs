//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user can hold; used for role-wide notification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// System administrator.
    Admin,
    /// Approves rentals and manages inventory.
    Manager,
    /// Performs calibrations and maintenance.
    Technician,
    /// Regular equipment borrower.
    User,
}

impl UserRole {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Technician => "technician",
            Self::User => "user",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = notifyhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "technician" => Ok(Self::Technician),
            "user" => Ok(Self::User),
            _ => Err(notifyhub_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: admin, manager, technician, user"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("TECHNICIAN".parse::<UserRole>().unwrap(), UserRole::Technician);
        assert!("viewer".parse::<UserRole>().is_err());
    }
}
