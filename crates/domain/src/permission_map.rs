use std::collections::{BTreeMap, BTreeSet};

use modgate_core::ModuleId;
use serde::{Deserialize, Serialize};

use crate::{Action, ActionSet};

/// Per-module action sets held by a plan ceiling or a role grant.
///
/// An absent key and an empty set both mean "no actions"; `set` removes the
/// key when given an empty set so the two never diverge in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<ModuleId, ActionSet>);

impl PermissionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the action set stored for a module, if any.
    #[must_use]
    pub fn get(&self, module_id: &str) -> Option<&ActionSet> {
        self.0.get(module_id)
    }

    /// Returns the actions for a module, empty when the module is absent.
    #[must_use]
    pub fn actions(&self, module_id: &str) -> ActionSet {
        self.0.get(module_id).cloned().unwrap_or_default()
    }

    /// Returns whether the action is present for the module.
    #[must_use]
    pub fn allows(&self, module_id: &str, action: Action) -> bool {
        self.0
            .get(module_id)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Replaces the actions of one module.
    pub fn set(&mut self, module_id: ModuleId, actions: ActionSet) {
        if actions.is_empty() {
            self.0.remove(module_id.as_str());
        } else {
            self.0.insert(module_id, actions);
        }
    }

    /// Iterates modules with their stored action sets.
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, &ActionSet)> {
        self.0.iter()
    }

    /// Iterates stored module ids.
    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.0.keys()
    }

    /// Returns modules with at least one action.
    #[must_use]
    pub fn granted_modules(&self) -> BTreeSet<ModuleId> {
        self.0
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(module_id, _)| module_id.clone())
            .collect()
    }

    /// Returns modules where the given action is present.
    #[must_use]
    pub fn modules_with(&self, action: Action) -> BTreeSet<ModuleId> {
        self.0
            .iter()
            .filter(|(_, actions)| actions.contains(&action))
            .map(|(module_id, _)| module_id.clone())
            .collect()
    }

    /// Returns whether no module carries any action.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

impl FromIterator<(ModuleId, ActionSet)> for PermissionMap {
    fn from_iter<T: IntoIterator<Item = (ModuleId, ActionSet)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (module_id, actions) in iter {
            map.set(module_id, actions);
        }
        map
    }
}
