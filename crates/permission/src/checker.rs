//! Predicates for event dispatchers.

use crate::store::validate_key;
use crate::{Actor, Engine, FeatureDefaults, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifies a dispatcher event as an [`Actor`].
///
/// Events that return `None` are denied by every checker.
pub trait ActorSource {
    fn actor(&self) -> Option<Actor>;
}

impl ActorSource for Actor {
    fn actor(&self) -> Option<Actor> {
        Some(self.clone())
    }
}

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A boolean gate over events of type `E`.
///
/// Rules combine with [`Rule::and`]; a rule holds only when every part does.
pub struct Rule<E> {
    parts: Vec<Predicate<E>>,
}

impl<E> Clone for Rule<E> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
        }
    }
}

impl<E> Rule<E> {
    pub fn new(f: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            parts: vec![Arc::new(f)],
        }
    }

    /// A rule that always holds.
    pub fn always() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn and(mut self, other: Rule<E>) -> Self {
        self.parts.extend(other.parts);
        self
    }

    /// Evaluate left to right, stopping at the first part that fails.
    pub fn check(&self, event: &E) -> bool {
        self.parts.iter().all(|part| part(event))
    }
}

impl Engine {
    /// A rule that holds when the event's actor may use `plugin.feature`.
    ///
    /// The rule never fails: events without an actor and store errors both
    /// resolve to `false`.
    pub fn checker<E: ActorSource + 'static>(
        &self,
        plugin: &str,
        feature: &str,
    ) -> Result<Rule<E>> {
        validate_key(plugin, feature)?;
        let engine = self.clone();
        let plugin = plugin.to_string();
        let feature = feature.to_string();
        Ok(Rule::new(move |event: &E| engine.check_event(event, &plugin, &feature)))
    }

    /// A factory that registers each feature with `defaults` and returns its
    /// checker combined with `gate`.
    pub fn checker_generator<E: ActorSource + 'static>(
        &self,
        plugin: &str,
        defaults: FeatureDefaults,
        gate: Rule<E>,
    ) -> Result<CheckerGenerator<E>> {
        validate_key(plugin, "any")?;
        Ok(CheckerGenerator {
            engine: self.clone(),
            plugin: plugin.to_string(),
            defaults,
            gate,
        })
    }

    fn check_event<E: ActorSource>(&self, event: &E, plugin: &str, feature: &str) -> bool {
        let Some(actor) = event.actor() else {
            debug!(plugin, feature, "Event has no actor, denying");
            return false;
        };
        match self.check_permission(&actor, plugin, feature) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    plugin,
                    feature,
                    user_id = actor.user_id(),
                    error = %e,
                    "Permission check failed, denying"
                );
                false
            }
        }
    }
}

/// Produced by [`Engine::checker_generator`].
pub struct CheckerGenerator<E> {
    engine: Engine,
    plugin: String,
    defaults: FeatureDefaults,
    gate: Rule<E>,
}

impl<E: ActorSource + 'static> CheckerGenerator<E> {
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Register `feature` and return its guard.
    pub fn checker(&self, feature: &str) -> Result<Rule<E>> {
        self.engine
            .store()
            .update_feature_permission(&self.plugin, feature, self.defaults.into())?;
        Ok(self
            .engine
            .checker(&self.plugin, feature)?
            .and(self.gate.clone()))
    }
}
