//! Permission resolution.

use crate::store::validate_key;
use crate::{Actor, FeatureDefaults, PermissionStore, Result, Role};
use std::sync::Arc;
use tracing::debug;

/// Decides whether an actor may use a feature.
///
/// Cheap to clone; clones share the same [`PermissionStore`].
#[derive(Clone)]
pub struct Engine {
    store: Arc<PermissionStore>,
}

impl Engine {
    pub fn new(store: Arc<PermissionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PermissionStore {
        &self.store
    }

    /// Whether the actor is a group admin/owner or a superuser.
    ///
    /// Private actors are admins only when they are superusers.
    pub fn is_admin(&self, actor: &Actor) -> Result<bool> {
        if let Actor::Group { role, .. } = actor
            && role.is_admin()
        {
            return Ok(true);
        }
        self.store.is_superuser(actor.user_id())
    }

    /// Resolve a permission check.
    ///
    /// Precedence, highest first: superuser, the feature's group or user
    /// kill switch, the admin default (for admins and owners), explicit
    /// overrides, the feature's defaults. Unregistered features deny.
    pub fn check_permission(&self, actor: &Actor, plugin: &str, feature: &str) -> Result<bool> {
        validate_key(plugin, feature)?;

        if self.store.is_superuser(actor.user_id())? {
            debug!(plugin, feature, user_id = actor.user_id(), "Superuser bypass");
            return Ok(true);
        }

        let Some(defaults) = self.store.feature_defaults(plugin, feature)? else {
            debug!(plugin, feature, "Feature not registered, denying");
            return Ok(false);
        };

        match actor {
            Actor::Group {
                user_id,
                group_id,
                role,
            } => self.check_group(plugin, feature, &defaults, user_id, group_id, *role),
            Actor::Private { user_id } => self.check_private(plugin, feature, &defaults, user_id),
        }
    }

    fn check_group(
        &self,
        plugin: &str,
        feature: &str,
        defaults: &FeatureDefaults,
        user_id: &str,
        group_id: &str,
        role: Role,
    ) -> Result<bool> {
        if !defaults.group.is_allowed() {
            return Ok(false);
        }

        let group_state = if role.is_admin() {
            defaults.admin.is_allowed()
        } else {
            self.store
                .group_override(plugin, feature, group_id)?
                .unwrap_or(defaults.group)
                .is_allowed()
        };

        let user_state = self
            .store
            .user_override(plugin, feature, user_id)?
            .unwrap_or(defaults.user)
            .is_allowed();

        debug!(
            plugin,
            feature,
            group_id,
            user_id,
            group_state,
            user_state,
            "Group check"
        );
        Ok(group_state && user_state)
    }

    fn check_private(
        &self,
        plugin: &str,
        feature: &str,
        defaults: &FeatureDefaults,
        user_id: &str,
    ) -> Result<bool> {
        if !defaults.user.is_allowed() {
            return Ok(false);
        }

        // The kill switch above is open, so a missing override allows.
        let user_state = self
            .store
            .user_override(plugin, feature, user_id)?
            .is_none_or(|state| state.is_allowed());

        debug!(plugin, feature, user_id, user_state, "Private check");
        Ok(user_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Permission::{Allow, Deny};
    use crate::{Error, FeatureUpdate, Permission};
    use storage::{MemoryStore, SqliteStore, Store};

    fn engine_with(store: Arc<dyn Store>) -> Engine {
        Engine::new(Arc::new(PermissionStore::new(store).unwrap()))
    }

    fn engine() -> Engine {
        engine_with(Arc::new(MemoryStore::new()))
    }

    fn register(
        engine: &Engine,
        feature: &str,
        admin: Permission,
        group: Permission,
        user: Permission,
    ) {
        let defaults = FeatureDefaults::new(admin, group, user);
        engine
            .store()
            .update_feature_permission("p", feature, defaults.into())
            .unwrap();
    }

    fn member(user: &str, group: &str) -> Actor {
        Actor::group(user, group, Role::Member)
    }

    #[test]
    fn test_unregistered_feature_denies_everyone() {
        let engine = engine();
        for actor in [
            member("U1", "G1"),
            Actor::group("U1", "G1", Role::Owner),
            Actor::private("U1"),
        ] {
            assert!(!engine.check_permission(&actor, "p", "missing").unwrap());
        }
    }

    #[test]
    fn test_superuser_bypasses_everything() {
        let engine = engine();
        register(&engine, "f", Deny, Deny, Deny);
        engine.store().update_user_permission("p", "f", "U1", Deny).unwrap();
        engine.store().set_superuser("U1").unwrap();

        assert!(engine.check_permission(&member("U1", "G1"), "p", "f").unwrap());
        assert!(engine.check_permission(&Actor::private("U1"), "p", "f").unwrap());
        assert!(engine.check_permission(&Actor::private("U1"), "other", "unregistered").unwrap());
        assert!(!engine.check_permission(&Actor::private("U2"), "p", "f").unwrap());
    }

    #[test]
    fn test_group_kill_switch_dominates_overrides() {
        let engine = engine();
        register(&engine, "f", Allow, Deny, Allow);
        engine.store().update_group_permission("p", "f", "G1", Allow).unwrap();
        engine.store().update_user_permission("p", "f", "U1", Allow).unwrap();

        assert!(!engine.check_permission(&member("U1", "G1"), "p", "f").unwrap());
        assert!(!engine
            .check_permission(&Actor::group("U1", "G1", Role::Owner), "p", "f")
            .unwrap());
    }

    #[test]
    fn test_admin_default_overrides_group_override() {
        let engine = engine();
        register(&engine, "f", Deny, Allow, Allow);
        engine.store().update_group_permission("p", "f", "G1", Allow).unwrap();

        let admin = Actor::group("U1", "G1", Role::Admin);
        assert!(!engine.check_permission(&admin, "p", "f").unwrap());
        assert!(engine.check_permission(&member("U2", "G1"), "p", "f").unwrap());

        // A group override cannot lock admins out either.
        register(&engine, "g", Allow, Allow, Allow);
        engine.store().update_group_permission("p", "g", "G1", Deny).unwrap();
        assert!(engine.check_permission(&admin, "p", "g").unwrap());
        assert!(!engine.check_permission(&member("U2", "G1"), "p", "g").unwrap());
    }

    #[test]
    fn test_cascading_defaults() {
        let engine = engine();
        register(&engine, "f", Allow, Allow, Allow);
        let actor = member("U2", "G1");
        assert!(engine.check_permission(&actor, "p", "f").unwrap());

        engine.store().update_group_permission("p", "f", "G1", Deny).unwrap();
        assert!(!engine.check_permission(&actor, "p", "f").unwrap());
        assert!(engine.check_permission(&member("U2", "G2"), "p", "f").unwrap());
    }

    #[test]
    fn test_user_gate_applies_inside_groups() {
        let engine = engine();
        register(&engine, "f", Allow, Allow, Deny);
        assert!(!engine.check_permission(&member("U1", "G1"), "p", "f").unwrap());

        engine.store().update_user_permission("p", "f", "U1", Allow).unwrap();
        assert!(engine.check_permission(&member("U1", "G1"), "p", "f").unwrap());

        register(&engine, "g", Allow, Allow, Allow);
        engine.store().update_user_permission("p", "g", "U1", Deny).unwrap();
        assert!(!engine
            .check_permission(&Actor::group("U1", "G1", Role::Owner), "p", "g")
            .unwrap());
    }

    #[test]
    fn test_private_path_ignores_group_rules() {
        let engine = engine();
        register(&engine, "f", Allow, Deny, Allow);
        engine.store().update_group_permission("p", "f", "G1", Deny).unwrap();
        assert!(engine.check_permission(&Actor::private("U1"), "p", "f").unwrap());

        engine.store().update_user_permission("p", "f", "U1", Deny).unwrap();
        assert!(!engine.check_permission(&Actor::private("U1"), "p", "f").unwrap());
    }

    #[test]
    fn test_private_user_kill_switch_dominates_override() {
        let engine = engine();
        register(&engine, "f", Allow, Allow, Deny);
        engine.store().update_user_permission("p", "f", "U1", Allow).unwrap();
        assert!(!engine.check_permission(&Actor::private("U1"), "p", "f").unwrap());
    }

    #[test]
    fn test_partial_update_changes_decision() {
        let engine = engine();
        register(&engine, "f", Allow, Allow, Allow);
        let admin = Actor::group("U1", "G1", Role::Admin);
        assert!(engine.check_permission(&admin, "p", "f").unwrap());

        engine
            .store()
            .update_feature_permission("p", "f", FeatureUpdate::new().admin(Deny))
            .unwrap();
        assert!(!engine.check_permission(&admin, "p", "f").unwrap());
        assert!(engine.check_permission(&member("U2", "G1"), "p", "f").unwrap());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.check_permission(&Actor::private("U1"), "", "f"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine.check_permission(&Actor::private("U1"), "p", ""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_is_admin() {
        let engine = engine();
        assert!(engine.is_admin(&Actor::group("U1", "G1", Role::Admin)).unwrap());
        assert!(engine.is_admin(&Actor::group("U1", "G1", Role::Owner)).unwrap());
        assert!(!engine.is_admin(&member("U1", "G1")).unwrap());
        assert!(!engine.is_admin(&Actor::private("U1")).unwrap());

        engine.store().set_superuser("U1").unwrap();
        assert!(engine.is_admin(&member("U1", "G1")).unwrap());
        assert!(engine.is_admin(&Actor::private("U1")).unwrap());
    }

    #[test]
    fn test_sqlite_backend_resolves_identically() {
        let engine = engine_with(Arc::new(SqliteStore::in_memory().unwrap()));
        register(&engine, "f", Allow, Allow, Allow);
        engine.store().update_group_permission("p", "f", "G1", Deny).unwrap();

        assert!(!engine.check_permission(&member("U2", "G1"), "p", "f").unwrap());
        assert!(engine.check_permission(&member("U2", "G2"), "p", "f").unwrap());
        assert!(engine.check_permission(&Actor::private("U2"), "p", "f").unwrap());
    }
}
