use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
    Admin,
}

impl Role {
    /// Roles allowed to act on behalf of patients (assisted booking, cancellation).
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "staff" | "receptionist" | "nurse" => Ok(Role::Staff),
            "admin" | "administrator" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The caller of a scheduling operation, as asserted by the identity provider.
///
/// Services receive this explicitly; they never look up the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(id: Uuid, roles: Vec<Role>) -> Self {
        Self { id, roles }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, vec![Role::Patient])
    }

    pub fn doctor(id: Uuid) -> Self {
        Self::new(id, vec![Role::Doctor])
    }

    pub fn staff(id: Uuid) -> Self {
        Self::new(id, vec![Role::Staff])
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, vec![Role::Admin])
    }

    pub fn is_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(Role::is_staff)
    }
}

impl TryFrom<&User> for Actor {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        // Supabase issues "authenticated" as the default role; treat unknown roles as no role.
        let roles = user
            .role
            .as_deref()
            .and_then(|role| role.parse::<Role>().ok())
            .into_iter()
            .collect();

        Ok(Actor { id, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn actor_from_user_parses_role_claim() {
        let id = Uuid::new_v4();
        let actor = Actor::try_from(&user(&id.to_string(), Some("Doctor"))).unwrap();
        assert_eq!(actor.id, id);
        assert!(actor.is_role(Role::Doctor));
        assert!(!actor.is_staff());
    }

    #[test]
    fn unknown_role_yields_no_roles() {
        let id = Uuid::new_v4();
        let actor = Actor::try_from(&user(&id.to_string(), Some("authenticated"))).unwrap();
        assert!(actor.roles.is_empty());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        assert!(Actor::try_from(&user("not-a-uuid", Some("patient"))).is_err());
    }

    #[test]
    fn admin_and_staff_count_as_staff() {
        assert!(Actor::admin(Uuid::new_v4()).is_staff());
        assert!(Actor::staff(Uuid::new_v4()).is_staff());
        assert!(!Actor::patient(Uuid::new_v4()).is_staff());
    }
}
