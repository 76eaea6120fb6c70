//! Persistence of feature defaults, overrides and superusers.

use crate::{Error, FeatureDefaults, FeatureEntry, FeatureUpdate, Permission, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use storage::{ColumnType, Record, Schema, Store};
use tracing::{debug, error, info};

pub(crate) const FEATURES: &str = "features";
pub(crate) const GROUPS: &str = "groups";
pub(crate) const USERS: &str = "users";
pub(crate) const SUPERUSERS: &str = "superusers";

// `group` is an SQL keyword, so the group default lives in `group_perm`.
const GROUP_PERM: &str = "group_perm";

fn tables() -> [(&'static str, Schema); 4] {
    let key = || {
        Schema::new()
            .column("id", ColumnType::PrimaryKey)
            .column("plugin", ColumnType::Text)
            .column("feature", ColumnType::Text)
    };
    [
        (
            FEATURES,
            key()
                .column("admin", ColumnType::Integer)
                .column(GROUP_PERM, ColumnType::Integer)
                .column("user", ColumnType::Integer),
        ),
        (
            GROUPS,
            key()
                .column("group_id", ColumnType::Text)
                .column("state", ColumnType::Integer),
        ),
        (
            USERS,
            key()
                .column("user_id", ColumnType::Text)
                .column("state", ColumnType::Integer),
        ),
        (
            SUPERUSERS,
            Schema::new()
                .column("id", ColumnType::PrimaryKey)
                .column("user_id", ColumnType::Text),
        ),
    ]
}

/// Owner of the four permission tables.
///
/// Every write goes through the select-then-insert-or-update helpers below,
/// which keep each natural key to at most one row. Writers are serialized
/// on `write` for the whole select-then-write sequence.
pub struct PermissionStore {
    store: Arc<dyn Store>,
    write: Mutex<()>,
}

impl PermissionStore {
    /// Wrap `store` and create the permission tables if they are missing.
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        let permissions = Self {
            store,
            write: Mutex::new(()),
        };
        permissions.create_tables()?;
        Ok(permissions)
    }

    /// Create all tables. Idempotent.
    pub fn create_tables(&self) -> Result<()> {
        for (name, schema) in tables() {
            self.store.create_table(name, &schema).map_err(|e| {
                error!(table = name, error = %e, "Failed to create permission table");
                Error::Init(e)
            })?;
        }
        debug!("Permission tables ready");
        Ok(())
    }

    pub fn set_superuser(&self, user_id: &str) -> Result<()> {
        require("user id", user_id)?;
        let _guard = self.write_lock()?;
        let inserted = self.insert_if_absent(SUPERUSERS, Record::new().with("user_id", user_id))?;
        if inserted {
            info!(user_id, "Superuser added");
        }
        Ok(())
    }

    pub fn remove_superuser(&self, user_id: &str) -> Result<()> {
        require("user id", user_id)?;
        let _guard = self.write_lock()?;
        let removed = self.delete_if_present(SUPERUSERS, Record::new().with("user_id", user_id))?;
        if removed {
            info!(user_id, "Superuser removed");
        }
        Ok(())
    }

    pub fn is_superuser(&self, user_id: &str) -> Result<bool> {
        let rows = self
            .store
            .select(SUPERUSERS, &Record::new().with("user_id", user_id))?;
        Ok(!rows.is_empty())
    }

    /// All superuser ids, in the order they were added.
    pub fn superusers(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .select(SUPERUSERS, &Record::new())?
            .iter()
            .filter_map(|row| row.get_text("user_id").map(str::to_string))
            .collect())
    }

    /// Register or partially update a feature's defaults.
    ///
    /// A missing row is created with unset fields taken from
    /// [`FeatureDefaults::default`]; an existing row keeps its unset fields.
    /// An empty update touches nothing.
    pub fn update_feature_permission(
        &self,
        plugin: &str,
        feature: &str,
        update: FeatureUpdate,
    ) -> Result<()> {
        validate_key(plugin, feature)?;
        if update.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock()?;
        let base = self
            .feature_defaults(plugin, feature)?
            .unwrap_or_default();
        let merged = update.apply(base);
        let values = Record::new()
            .with("admin", merged.admin.as_i64())
            .with(GROUP_PERM, merged.group.as_i64())
            .with("user", merged.user.as_i64());
        self.upsert(FEATURES, feature_key(plugin, feature), values)?;

        debug!(
            plugin,
            feature,
            admin = %merged.admin,
            group = %merged.group,
            user = %merged.user,
            "Feature permission updated"
        );
        Ok(())
    }

    pub fn update_group_permission(
        &self,
        plugin: &str,
        feature: &str,
        group_id: &str,
        state: Permission,
    ) -> Result<()> {
        validate_key(plugin, feature)?;
        require("group id", group_id)?;
        let _guard = self.write_lock()?;
        self.upsert(
            GROUPS,
            feature_key(plugin, feature).with("group_id", group_id),
            Record::new().with("state", state.as_i64()),
        )?;
        debug!(plugin, feature, group_id, state = %state, "Group permission updated");
        Ok(())
    }

    pub fn update_user_permission(
        &self,
        plugin: &str,
        feature: &str,
        user_id: &str,
        state: Permission,
    ) -> Result<()> {
        validate_key(plugin, feature)?;
        require("user id", user_id)?;
        let _guard = self.write_lock()?;
        self.upsert(
            USERS,
            feature_key(plugin, feature).with("user_id", user_id),
            Record::new().with("state", state.as_i64()),
        )?;
        debug!(plugin, feature, user_id, state = %state, "User permission updated");
        Ok(())
    }

    /// The defaults of a feature, or `None` if it was never registered.
    pub fn feature_defaults(&self, plugin: &str, feature: &str) -> Result<Option<FeatureDefaults>> {
        let rows = self.store.select(FEATURES, &feature_key(plugin, feature))?;
        rows.first().map(defaults_from_row).transpose()
    }

    pub fn group_override(
        &self,
        plugin: &str,
        feature: &str,
        group_id: &str,
    ) -> Result<Option<Permission>> {
        self.state(
            GROUPS,
            feature_key(plugin, feature).with("group_id", group_id),
        )
    }

    pub fn user_override(
        &self,
        plugin: &str,
        feature: &str,
        user_id: &str,
    ) -> Result<Option<Permission>> {
        self.state(USERS, feature_key(plugin, feature).with("user_id", user_id))
    }

    /// Every registered feature, in registration order.
    pub fn features(&self) -> Result<Vec<FeatureEntry>> {
        self.store
            .select(FEATURES, &Record::new())?
            .iter()
            .map(|row| {
                Ok(FeatureEntry {
                    plugin: text(row, "plugin")?,
                    feature: text(row, "feature")?,
                    defaults: defaults_from_row(row)?,
                })
            })
            .collect()
    }

    fn state(&self, table: &str, key: Record) -> Result<Option<Permission>> {
        let rows = self.store.select(table, &key)?;
        rows.first().map(|row| permission(row, "state")).transpose()
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write
            .lock()
            .map_err(|_| Error::Store(storage::Error::Poisoned))
    }

    // The helpers below expect the caller to hold `write`.

    fn upsert(&self, table: &str, key: Record, values: Record) -> Result<()> {
        let existing = self.store.select(table, &key)?;
        if existing.is_empty() {
            let mut record = key;
            for (column, value) in values.iter() {
                record.set(column, value.clone());
            }
            self.store
                .insert(table, &record)
                .map_err(|e| write_failed(table, e))
        } else {
            self.store
                .update(table, &values, &key)
                .map(|_| ())
                .map_err(|e| write_failed(table, e))
        }
    }

    fn insert_if_absent(&self, table: &str, record: Record) -> Result<bool> {
        if !self.store.select(table, &record)?.is_empty() {
            return Ok(false);
        }
        self.store
            .insert(table, &record)
            .map_err(|e| write_failed(table, e))?;
        Ok(true)
    }

    fn delete_if_present(&self, table: &str, record: Record) -> Result<bool> {
        if self.store.select(table, &record)?.is_empty() {
            return Ok(false);
        }
        self.store
            .delete(table, &record)
            .map_err(|e| write_failed(table, e))?;
        Ok(true)
    }
}

fn write_failed(table: &str, e: storage::Error) -> Error {
    error!(table, error = %e, "Permission write failed");
    Error::Store(e)
}

fn feature_key(plugin: &str, feature: &str) -> Record {
    Record::new().with("plugin", plugin).with("feature", feature)
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{what} must be a non-empty string")));
    }
    Ok(())
}

pub(crate) fn validate_key(plugin: &str, feature: &str) -> Result<()> {
    require("plugin name", plugin)?;
    require("feature name", feature)
}

fn text(row: &Record, column: &str) -> Result<String> {
    row.get_text(column)
        .map(str::to_string)
        .ok_or_else(|| Error::Validation(format!("stored row has no text column {column}")))
}

fn permission(row: &Record, column: &str) -> Result<Permission> {
    let value = row
        .get_integer(column)
        .ok_or_else(|| Error::Validation(format!("stored row has no integer column {column}")))?;
    Permission::try_from(value)
}

fn defaults_from_row(row: &Record) -> Result<FeatureDefaults> {
    Ok(FeatureDefaults {
        admin: permission(row, "admin")?,
        group: permission(row, GROUP_PERM)?,
        user: permission(row, "user")?,
    })
}
