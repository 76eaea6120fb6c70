use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A two-valued permission. Stored as `1` (allow) or `0` (deny).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Deny,
    Allow,
}

impl Permission {
    pub fn is_allowed(self) -> bool {
        self == Permission::Allow
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Permission::Allow => 1,
            Permission::Deny => 0,
        }
    }
}

impl From<bool> for Permission {
    fn from(allowed: bool) -> Self {
        if allowed {
            Permission::Allow
        } else {
            Permission::Deny
        }
    }
}

impl TryFrom<i64> for Permission {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Permission::Allow),
            0 => Ok(Permission::Deny),
            other => Err(Error::Validation(format!(
                "permission must be 1 (allow) or 0 (deny), got {other}"
            ))),
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    /// Accepts the same words as management commands (`on`, `deny`, `1`, ...).
    fn from_str(s: &str) -> Result<Self> {
        crate::command::parse_toggle(s)
            .ok_or_else(|| Error::Validation(format!("not a permission value: {s:?}")))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Allow => f.write_str("allow"),
            Permission::Deny => f.write_str("deny"),
        }
    }
}

/// A member's role inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Admins and owners are governed by a feature's admin default.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(Error::Validation(format!("unknown role: {s:?}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => f.write_str("member"),
            Role::Admin => f.write_str("admin"),
            Role::Owner => f.write_str("owner"),
        }
    }
}

/// Who a permission check is made for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    /// A user speaking inside a group.
    Group {
        user_id: String,
        group_id: String,
        role: Role,
    },
    /// A user in a private conversation.
    Private { user_id: String },
}

impl Actor {
    pub fn group(user_id: impl Into<String>, group_id: impl Into<String>, role: Role) -> Self {
        Actor::Group {
            user_id: user_id.into(),
            group_id: group_id.into(),
            role,
        }
    }

    pub fn private(user_id: impl Into<String>) -> Self {
        Actor::Private {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Actor::Group { user_id, .. } | Actor::Private { user_id } => user_id,
        }
    }
}

/// Default permissions of a registered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDefaults {
    /// Applies to group admins and owners.
    pub admin: Permission,
    /// Kill switch and fallback for group members.
    pub group: Permission,
    /// Kill switch and fallback for individual users.
    pub user: Permission,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            admin: Permission::Allow,
            group: Permission::Allow,
            user: Permission::Allow,
        }
    }
}

impl FeatureDefaults {
    pub fn new(admin: Permission, group: Permission, user: Permission) -> Self {
        Self { admin, group, user }
    }
}

/// A partial update of [`FeatureDefaults`]. Unset fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureUpdate {
    pub admin: Option<Permission>,
    pub group: Option<Permission>,
    pub user: Option<Permission>,
}

impl FeatureUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admin(mut self, value: Permission) -> Self {
        self.admin = Some(value);
        self
    }

    pub fn group(mut self, value: Permission) -> Self {
        self.group = Some(value);
        self
    }

    pub fn user(mut self, value: Permission) -> Self {
        self.user = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.admin.is_none() && self.group.is_none() && self.user.is_none()
    }

    /// Apply this update on top of `base`.
    pub fn apply(&self, base: FeatureDefaults) -> FeatureDefaults {
        FeatureDefaults {
            admin: self.admin.unwrap_or(base.admin),
            group: self.group.unwrap_or(base.group),
            user: self.user.unwrap_or(base.user),
        }
    }
}

impl From<FeatureDefaults> for FeatureUpdate {
    fn from(d: FeatureDefaults) -> Self {
        Self {
            admin: Some(d.admin),
            group: Some(d.group),
            user: Some(d.user),
        }
    }
}

/// A registered feature and its defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub plugin: String,
    pub feature: String,
    #[serde(flatten)]
    pub defaults: FeatureDefaults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_integer_domain_is_closed() {
        assert_eq!(Permission::try_from(1).unwrap(), Permission::Allow);
        assert_eq!(Permission::try_from(0).unwrap(), Permission::Deny);
        assert!(matches!(Permission::try_from(2), Err(Error::Validation(_))));
        assert!(matches!(Permission::try_from(-1), Err(Error::Validation(_))));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Owner".parse::<Role>().unwrap(), Role::Owner);
        assert!(Role::Admin.is_admin());
        assert!(!Role::Member.is_admin());
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let base = FeatureDefaults::new(Permission::Allow, Permission::Deny, Permission::Allow);
        let merged = FeatureUpdate::new().admin(Permission::Deny).apply(base);
        assert_eq!(
            merged,
            FeatureDefaults::new(Permission::Deny, Permission::Deny, Permission::Allow)
        );
        assert!(FeatureUpdate::new().is_empty());
    }

    #[test]
    fn test_feature_entry_serializes_flat() {
        let entry = FeatureEntry {
            plugin: "p".into(),
            feature: "f".into(),
            defaults: FeatureDefaults::default(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["plugin"], "p");
        assert_eq!(json["group"], "allow");
    }
}
