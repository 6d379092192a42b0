use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authority tier of a role. Ordering matters: lifecycle operations compare
/// against a minimum level (`Member < Manager < Owner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleLevel {
    Member,
    Manager,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub level: RoleLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role_id: String,
}

impl User {
    pub fn new(name: impl Into<String>, role_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role_id: role_id.into(),
        }
    }

    pub fn acting(&self) -> ActingUser {
        ActingUser {
            user_id: self.id.clone(),
            role_id: self.role_id.clone(),
        }
    }
}

/// The identity the authentication collaborator hands to the engine. The core
/// never authenticates; it only authorizes using the id and role it is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub user_id: String,
    pub role_id: String,
}

/// Overtime log entry. Stored and round-tripped only; filtering, aggregation
/// and export live outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeEntry {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub note: Option<String>,
}

/// Team-wide settings; a single record, not a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub team_name: String,
    /// User id the CLI acts as when no `--user` is given.
    #[serde(default)]
    pub default_actor: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            team_name: "Production".to_string(),
            default_actor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_levels_are_ordered() {
        assert!(RoleLevel::Owner > RoleLevel::Manager);
        assert!(RoleLevel::Manager > RoleLevel::Member);
    }

    #[test]
    fn role_level_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RoleLevel::Owner).unwrap(), "\"owner\"");
        let parsed: RoleLevel = serde_json::from_str("\"manager\"").unwrap();
        assert_eq!(parsed, RoleLevel::Manager);
    }

    #[test]
    fn acting_user_carries_id_and_role() {
        let user = User::new("Ana", "role-member");
        let acting = user.acting();
        assert_eq!(acting.user_id, user.id);
        assert_eq!(acting.role_id, "role-member");
    }

    #[test]
    fn overtime_entry_roundtrip_keeps_typed_date() {
        let entry = OvertimeEntry {
            id: "ot-1".to_string(),
            user_id: "user-a".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            hours: 2.5,
            note: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: OvertimeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }
}
