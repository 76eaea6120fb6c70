//! The administrative entry point.

use crate::checker::{ActorSource, CheckerGenerator, Rule};
use crate::{
    Actor, Engine, Error, FeatureDefaults, FeatureUpdate, Permission, PermissionStore, Result,
};
use std::sync::{Arc, OnceLock};
use storage::Store;
use tracing::info;

/// A permission system that is set up once at startup and then shared.
///
/// Every operation fails with [`Error::Uninitialized`] until [`init`](Self::init)
/// has succeeded.
#[derive(Default)]
pub struct PermissionService {
    engine: OnceLock<Engine>,
}

impl PermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the permission tables in `store` and optionally seed a superuser.
    pub fn init(&self, store: Arc<dyn Store>, superuser: Option<&str>) -> Result<()> {
        if self.engine.get().is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let permissions = PermissionStore::new(store)?;
        if let Some(user_id) = superuser {
            permissions.set_superuser(user_id)?;
        }

        self.engine
            .set(Engine::new(Arc::new(permissions)))
            .map_err(|_| Error::AlreadyInitialized)?;
        info!("Permission system initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    pub fn engine(&self) -> Result<&Engine> {
        self.engine.get().ok_or(Error::Uninitialized)
    }

    pub fn set_superuser(&self, user_id: &str) -> Result<()> {
        self.engine()?.store().set_superuser(user_id)
    }

    pub fn remove_superuser(&self, user_id: &str) -> Result<()> {
        self.engine()?.store().remove_superuser(user_id)
    }

    pub fn update_feature_permission(
        &self,
        plugin: &str,
        feature: &str,
        update: FeatureUpdate,
    ) -> Result<()> {
        self.engine()?
            .store()
            .update_feature_permission(plugin, feature, update)
    }

    pub fn update_group_permission(
        &self,
        plugin: &str,
        feature: &str,
        group_id: &str,
        state: Permission,
    ) -> Result<()> {
        self.engine()?
            .store()
            .update_group_permission(plugin, feature, group_id, state)
    }

    pub fn update_user_permission(
        &self,
        plugin: &str,
        feature: &str,
        user_id: &str,
        state: Permission,
    ) -> Result<()> {
        self.engine()?
            .store()
            .update_user_permission(plugin, feature, user_id, state)
    }

    pub fn check_permission(&self, actor: &Actor, plugin: &str, feature: &str) -> Result<bool> {
        self.engine()?.check_permission(actor, plugin, feature)
    }

    pub fn checker<E: ActorSource + 'static>(
        &self,
        plugin: &str,
        feature: &str,
    ) -> Result<Rule<E>> {
        self.engine()?.checker(plugin, feature)
    }

    pub fn checker_generator<E: ActorSource + 'static>(
        &self,
        plugin: &str,
        defaults: FeatureDefaults,
        gate: Rule<E>,
    ) -> Result<CheckerGenerator<E>> {
        self.engine()?.checker_generator(plugin, defaults, gate)
    }
}
