//! Chat management commands for permission overrides.
//!
//! `group <plugin.feature> <on|off>` sets an override for the sender's group;
//! `user <plugin.feature> <on|off> [user_id]` sets one for a user (the sender
//! by default). Both are guarded by features of [`MANAGEMENT_PLUGIN`].

use crate::{Actor, Error, FeatureDefaults, Permission, PermissionService, Result};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// The plugin under which the management features are registered.
pub const MANAGEMENT_PLUGIN: &str = "permission_plugin";

const TRUE_WORDS: [&str; 6] = ["true", "yes", "1", "on", "enable", "allow"];
const FALSE_WORDS: [&str; 6] = ["false", "no", "0", "off", "disable", "deny"];

/// Parse a yes/no style word. Any other integer counts as allow when non-zero.
pub fn parse_toggle(word: &str) -> Option<Permission> {
    let word = word.trim().to_ascii_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        return Some(Permission::Allow);
    }
    if FALSE_WORDS.contains(&word.as_str()) {
        return Some(Permission::Deny);
    }
    word.parse::<i64>().ok().map(|n| Permission::from(n != 0))
}

/// A `plugin.feature` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRef {
    pub plugin: String,
    pub feature: String,
}

impl FromStr for FeatureRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((plugin, feature)) if !plugin.is_empty() && !feature.is_empty() => Ok(Self {
                plugin: plugin.to_string(),
                feature: feature.to_string(),
            }),
            _ => Err(Error::Command("Please provide a valid feature.".into())),
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plugin, self.feature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCommand {
    Group {
        target: FeatureRef,
        state: Permission,
    },
    User {
        target: FeatureRef,
        state: Permission,
        user_id: Option<String>,
    },
}

impl ManagementCommand {
    /// Parse the arguments of the `kind` subcommand (`group` or `user`).
    pub fn parse(kind: &str, args: &str) -> Result<Self> {
        let args: Vec<&str> = args.split_whitespace().collect();
        if args.len() < 2 {
            return Err(Error::Command(
                "Please provide a feature and a permission level.".into(),
            ));
        }
        let target: FeatureRef = args[0].parse()?;
        let state = parse_toggle(args[1])
            .ok_or_else(|| Error::Command("Please provide a valid permission level.".into()))?;

        match kind {
            "group" => Ok(ManagementCommand::Group { target, state }),
            "user" => Ok(ManagementCommand::User {
                target,
                state,
                user_id: args.get(2).map(|s| s.to_string()),
            }),
            other => Err(Error::Command(format!("Unknown command: {other}"))),
        }
    }

    /// The management feature that guards this command.
    pub fn feature(&self) -> &'static str {
        match self {
            ManagementCommand::Group { .. } => "group",
            ManagementCommand::User { .. } => "user",
        }
    }

    /// Apply the command on behalf of `actor` and return a confirmation.
    pub fn execute(&self, service: &PermissionService, actor: &Actor) -> Result<String> {
        if !service.check_permission(actor, MANAGEMENT_PLUGIN, self.feature())? {
            return Err(Error::Command("Permission denied.".into()));
        }

        match self {
            ManagementCommand::Group { target, state } => {
                let Actor::Group { group_id, .. } = actor else {
                    return Err(Error::Command(
                        "Group permissions can only be set inside a group.".into(),
                    ));
                };
                service.update_group_permission(&target.plugin, &target.feature, group_id, *state)?;
                info!(
                    feature = %target,
                    group_id,
                    state = %state,
                    by = actor.user_id(),
                    "Group override set"
                );
                Ok(format!("{target} permission in group {group_id} set to {state}"))
            }
            ManagementCommand::User {
                target,
                state,
                user_id,
            } => {
                let user_id = user_id.as_deref().unwrap_or(actor.user_id());
                service.update_user_permission(&target.plugin, &target.feature, user_id, *state)?;
                info!(
                    feature = %target,
                    user_id,
                    state = %state,
                    by = actor.user_id(),
                    "User override set"
                );
                Ok(format!("{target} permission for user {user_id} set to {state}"))
            }
        }
    }
}

/// Register the features guarding the management commands.
///
/// Group overrides are open to everyone whose group allows it. User
/// overrides have the group kill switch closed, leaving them to superusers.
pub fn register_management_features(service: &PermissionService) -> Result<()> {
    service.update_feature_permission(
        MANAGEMENT_PLUGIN,
        "group",
        FeatureDefaults::default().into(),
    )?;
    service.update_feature_permission(
        MANAGEMENT_PLUGIN,
        "user",
        FeatureDefaults::new(Permission::Allow, Permission::Deny, Permission::Deny).into(),
    )
}
