use std::collections::BTreeSet;

use modgate_core::{AppError, AppResult, ModuleId, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{Action, ActionSet};

/// Unvalidated module payload used for storage and transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Stable module id.
    pub id: String,
    /// Human readable label.
    pub display_name: String,
    /// Grouping label used by catalogs.
    #[serde(default)]
    pub category: String,
    /// Universe of actions that plans and roles may grant.
    pub available_actions: ActionSet,
    /// Modules that must be viewable for this module to work.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Core modules must always keep `view` grantable.
    #[serde(default)]
    pub is_core: bool,
    /// Display ordering, ascending.
    #[serde(default)]
    pub order: i32,
}

impl ModuleDefinition {
    /// Starts a definition exposing every known action and no dependencies.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category: String::new(),
            available_actions: Action::all().iter().copied().collect(),
            dependencies: BTreeSet::new(),
            is_core: false,
            order: 0,
        }
    }

    /// Restricts the actions the module exposes.
    #[must_use]
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.available_actions = actions.into_iter().collect();
        self
    }

    /// Adds dependency edges.
    #[must_use]
    pub fn depends_on(mut self, module_ids: impl IntoIterator<Item = &'static str>) -> Self {
        self.dependencies
            .extend(module_ids.into_iter().map(str::to_owned));
        self
    }

    /// Marks the module as core.
    #[must_use]
    pub fn core(mut self) -> Self {
        self.is_core = true;
        self
    }
}

/// Feature unit gating a set of possible actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModuleDefinition", into = "ModuleDefinition")]
pub struct Module {
    id: ModuleId,
    display_name: NonEmptyString,
    category: String,
    available_actions: ActionSet,
    dependencies: BTreeSet<ModuleId>,
    is_core: bool,
    order: i32,
}

impl Module {
    /// Creates a validated module.
    pub fn new(definition: ModuleDefinition) -> AppResult<Self> {
        let id = ModuleId::new(definition.id)?;

        if definition.available_actions.is_empty() {
            return Err(AppError::Validation(format!(
                "module '{id}' must expose at least one action"
            )));
        }

        if definition.is_core && !definition.available_actions.contains(&Action::View) {
            return Err(AppError::Validation(format!(
                "core module '{id}' must expose the 'view' action"
            )));
        }

        let dependencies = definition
            .dependencies
            .into_iter()
            .map(ModuleId::new)
            .collect::<AppResult<BTreeSet<_>>>()?;

        if dependencies.contains(&id) {
            return Err(AppError::Validation(format!(
                "module '{id}' cannot depend on itself"
            )));
        }

        Ok(Self {
            display_name: NonEmptyString::new(definition.display_name)?,
            category: definition.category.trim().to_owned(),
            available_actions: definition.available_actions,
            dependencies,
            is_core: definition.is_core,
            order: definition.order,
            id,
        })
    }

    /// Returns the module id.
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the catalog category.
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_str()
    }

    /// Returns the actions any plan or role may grant for this module.
    #[must_use]
    pub fn available_actions(&self) -> &ActionSet {
        &self.available_actions
    }

    /// Returns whether the module exposes the action.
    #[must_use]
    pub fn supports(&self, action: Action) -> bool {
        self.available_actions.contains(&action)
    }

    /// Returns direct dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &BTreeSet<ModuleId> {
        &self.dependencies
    }

    /// Returns whether the module is core.
    #[must_use]
    pub fn is_core(&self) -> bool {
        self.is_core
    }

    /// Returns display ordering.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }
}

impl TryFrom<ModuleDefinition> for Module {
    type Error = AppError;

    fn try_from(value: ModuleDefinition) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Module> for ModuleDefinition {
    fn from(value: Module) -> Self {
        Self {
            id: value.id.into(),
            display_name: value.display_name.into(),
            category: value.category,
            available_actions: value.available_actions,
            dependencies: value.dependencies.into_iter().map(String::from).collect(),
            is_core: value.is_core,
            order: value.order,
        }
    }
}
