use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

/// Authenticated identity making a request. Trusted verbatim from upstream auth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: UserRole,
}

impl Principal {
    pub fn new(user_id: &str, role: UserRole) -> Self {
        Principal {
            user_id: user_id.to_string(),
            role,
        }
    }

    /// Teachers and admins may review attempts they do not own.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Teacher | UserRole::Admin)
    }
}
