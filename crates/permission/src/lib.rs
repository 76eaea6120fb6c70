//! Hierarchical, persisted feature permissions.
//!
//! Decides whether a feature of a plugin may run for an [`Actor`]: a user
//! inside a group (with a [`Role`]) or a user in a private conversation.
//!
//! # Resolution
//!
//! Checks walk a fixed cascade, highest priority first:
//!
//! 1. **Superuser** — superusers are allowed everything, registered or not.
//! 2. **Registration** — a feature without [`FeatureDefaults`] is denied.
//! 3. **Kill switch** — the feature's `group` default closes it for all
//!    groups; its `user` default closes it for private conversations.
//! 4. **Role** — group admins and owners follow the feature's `admin`
//!    default; group overrides do not apply to them.
//! 5. **Overrides** — explicit per-group and per-user [`Permission`]s.
//! 6. **Defaults** — otherwise the feature's `group`/`user` defaults.
//!
//! Inside a group both the group gate and the user gate must be open.
//!
//! # Components
//!
//! - [`PermissionStore`] — owns the four tables and all writes to them.
//! - [`Engine`] — read-only resolution plus dispatcher [`Rule`]s.
//! - [`PermissionService`] — set up once, then shared by management plugins.
//! - [`command`] — parsing and execution of chat management commands.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use permission::{Actor, FeatureDefaults, PermissionService, Role};
//! use storage::MemoryStore;
//!
//! let service = PermissionService::new();
//! service.init(Arc::new(MemoryStore::new()), Some("10001"))?;
//!
//! let always = permission::Rule::<Actor>::always();
//! let generator = service.checker_generator("chat", FeatureDefaults::default(), always)?;
//! let ask = generator.checker("ask")?;
//!
//! assert!(ask.check(&Actor::group("20002", "G1", Role::Member)));
//!
//! service.update_group_permission("chat", "ask", "G1", permission::Permission::Deny)?;
//! assert!(!ask.check(&Actor::group("20002", "G1", Role::Member)));
//! assert!(ask.check(&Actor::group("10001", "G1", Role::Member)));
//! # Ok::<(), permission::Error>(())
//! ```

mod checker;
pub mod command;
mod engine;
mod error;
mod model;
mod service;
mod store;

pub use checker::{ActorSource, CheckerGenerator, Rule};
pub use engine::Engine;
pub use error::{Error, Result};
pub use model::{Actor, FeatureDefaults, FeatureEntry, FeatureUpdate, Permission, Role};
pub use service::PermissionService;
pub use store::PermissionStore;
