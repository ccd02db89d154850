//! Effective permission resolution.
//!
//! Resolution is a pure function of one consistent snapshot: the module
//! graph, the user, the user's organization and role, and the organization's
//! plan. It never fails for missing data. Missing or inactive records close
//! the layer they belong to and dangling references come back as conflicts.

use modgate_core::UserId;
use serde::{Deserialize, Serialize};

use crate::{
    Action, ActionSet, Module, ModuleGraph, Organization, PermissionConflict, PermissionMap, Role,
    SubscriptionPlan, User,
};

/// Placeholder module id used by conflicts about whole records rather than
/// one module.
pub const ALL_MODULES: &str = "*";

/// Layer that blocks an action the other layer requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictedBy {
    /// The role requests the action but the plan ceiling excludes it.
    Subscription,
    /// The plan allows the action but the role never requested it.
    Role,
    /// Nothing blocks: the action is granted, or nobody asked for it.
    None,
}

/// Outcome of one `(module, action)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Both layers allow the action.
    Granted,
    /// Exactly one layer requests the action.
    Restricted,
    /// Neither layer requests the action.
    Absent,
}

/// Derived permission entry; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    /// Module the entry applies to.
    pub module_id: String,
    /// Action the entry applies to.
    pub action: Action,
    /// Whether the user may perform the action.
    pub granted: bool,
    /// Blocking layer for restricted entries.
    pub restricted_by: RestrictedBy,
}

/// Full resolution result for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissionSet {
    /// Granted and restricted entries, in module display order.
    pub permissions: Vec<EffectivePermission>,
    /// Structural problems found while resolving.
    pub conflicts: Vec<PermissionConflict>,
}

impl EffectivePermissionSet {
    /// Returns whether the action is granted.
    #[must_use]
    pub fn is_granted(&self, module_id: &str, action: Action) -> bool {
        self.permissions
            .iter()
            .any(|entry| entry.granted && entry.module_id == module_id && entry.action == action)
    }

    /// Returns granted actions for one module.
    #[must_use]
    pub fn granted_actions(&self, module_id: &str) -> ActionSet {
        self.permissions
            .iter()
            .filter(|entry| entry.granted && entry.module_id == module_id)
            .map(|entry| entry.action)
            .collect()
    }

    /// Returns the entry for a pair, if one was emitted.
    #[must_use]
    pub fn entry(&self, module_id: &str, action: Action) -> Option<&EffectivePermission> {
        self.permissions
            .iter()
            .find(|entry| entry.module_id == module_id && entry.action == action)
    }
}

/// Single-triple resolution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    /// Whether the user may perform the action.
    pub granted: bool,
    /// Blocking layer, `none` when granted or absent.
    pub restricted_by: RestrictedBy,
    /// Granted, restricted, or absent.
    pub state: PermissionState,
}

impl PermissionCheck {
    fn from_layers(subscription_allows: bool, role_allows: bool) -> Self {
        let (state, restricted_by) = match (subscription_allows, role_allows) {
            (true, true) => (PermissionState::Granted, RestrictedBy::None),
            (false, true) => (PermissionState::Restricted, RestrictedBy::Subscription),
            (true, false) => (PermissionState::Restricted, RestrictedBy::Role),
            (false, false) => (PermissionState::Absent, RestrictedBy::None),
        };

        Self {
            granted: state == PermissionState::Granted,
            restricted_by,
            state,
        }
    }

    fn absent() -> Self {
        Self::from_layers(false, false)
    }
}

/// Records needed to resolve one user, as read from one consistent snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AccessSnapshot<'a> {
    /// Module catalog.
    pub graph: &'a ModuleGraph,
    /// User being resolved.
    pub user_id: &'a UserId,
    /// User record, `None` when the id is unknown.
    pub user: Option<&'a User>,
    /// The user's organization, `None` when missing.
    pub organization: Option<&'a Organization>,
    /// The user's role, `None` when missing.
    pub role: Option<&'a Role>,
    /// The organization's plan, `None` when missing.
    pub plan: Option<&'a SubscriptionPlan>,
}

impl<'a> AccessSnapshot<'a> {
    /// Plan ceiling, or `None` when the subscription layer is closed.
    fn subscription_layer(&self) -> Option<&'a PermissionMap> {
        let organization = self.organization?;
        let plan = self.plan?;
        (organization.is_active()
            && plan.is_active()
            && plan.id() == organization.subscription_plan_id())
        .then(|| plan.modules())
    }

    /// Role grant, or `None` when the role layer is closed.
    fn role_layer(&self) -> Option<&'a PermissionMap> {
        let user = self.user?;
        let role = self.role?;
        (user.is_active()
            && role.is_active()
            && role.id() == user.role_id()
            && role.organization_id() == user.organization_id())
        .then(|| role.permissions())
    }
}

/// Resolves every granted or restricted `(module, action)` pair for a user.
#[must_use]
pub fn resolve_effective_permissions(snapshot: &AccessSnapshot<'_>) -> EffectivePermissionSet {
    let subscription_layer = snapshot.subscription_layer();
    let role_layer = snapshot.role_layer();
    let mut result = EffectivePermissionSet {
        permissions: Vec::new(),
        conflicts: reference_conflicts(snapshot),
    };

    for module in snapshot.graph.modules_in_display_order() {
        let mut granted_any = false;

        for action in module.available_actions() {
            let check = PermissionCheck::from_layers(
                layer_allows(subscription_layer, module, *action),
                layer_allows(role_layer, module, *action),
            );

            if check.state == PermissionState::Absent {
                continue;
            }

            granted_any |= check.granted;
            result.permissions.push(EffectivePermission {
                module_id: module.id().to_string(),
                action: *action,
                granted: check.granted,
                restricted_by: check.restricted_by,
            });
        }

        if module.is_core() && !granted_any {
            result.conflicts.push(PermissionConflict::invalid_action(
                module.id().as_str(),
                Some(Action::View),
                format!(
                    "core module '{}' grants no actions to user '{}'",
                    module.id(),
                    snapshot.user_id
                ),
            ));
        }
    }

    result
}

/// Resolves a single `(module, action)` pair for a user.
///
/// Unknown modules and actions outside the module's `available_actions`
/// resolve as absent.
#[must_use]
pub fn resolve_permission(
    snapshot: &AccessSnapshot<'_>,
    module_id: &str,
    action: Action,
) -> PermissionCheck {
    let Some(module) = snapshot.graph.get(module_id) else {
        return PermissionCheck::absent();
    };

    if !module.supports(action) {
        return PermissionCheck::absent();
    }

    PermissionCheck::from_layers(
        layer_allows(snapshot.subscription_layer(), module, action),
        layer_allows(snapshot.role_layer(), module, action),
    )
}

fn layer_allows(layer: Option<&PermissionMap>, module: &Module, action: Action) -> bool {
    layer.is_some_and(|map| map.allows(module.id().as_str(), action))
}

fn reference_conflicts(snapshot: &AccessSnapshot<'_>) -> Vec<PermissionConflict> {
    let mut conflicts = Vec::new();

    let Some(user) = snapshot.user else {
        conflicts.push(dangling_record(format!(
            "user '{}' does not exist",
            snapshot.user_id
        )));
        return conflicts;
    };

    match snapshot.organization {
        None => conflicts.push(dangling_record(format!(
            "organization '{}' referenced by user '{}' does not exist",
            user.organization_id(),
            user.id()
        ))),
        Some(organization) => match snapshot.plan {
            None => conflicts.push(dangling_record(format!(
                "plan '{}' referenced by organization '{}' does not exist",
                organization.subscription_plan_id(),
                organization.id()
            ))),
            Some(plan) => conflicts.extend(dangling_map_entries(
                snapshot.graph,
                plan.modules(),
                &format!("plan '{}'", plan.id()),
            )),
        },
    }

    match snapshot.role {
        None => conflicts.push(dangling_record(format!(
            "role '{}' referenced by user '{}' does not exist",
            user.role_id(),
            user.id()
        ))),
        Some(role) if role.organization_id() != user.organization_id() => {
            conflicts.push(dangling_record(format!(
                "role '{}' belongs to organization '{}', not to user '{}' organization '{}'",
                role.id(),
                role.organization_id(),
                user.id(),
                user.organization_id()
            )));
        }
        Some(role) => conflicts.extend(dangling_map_entries(
            snapshot.graph,
            role.permissions(),
            &format!("role '{}'", role.id()),
        )),
    }

    conflicts
}

/// Reports module ids missing from the graph and actions a module does not
/// expose. Both are ignored by resolution.
fn dangling_map_entries(
    graph: &ModuleGraph,
    map: &PermissionMap,
    owner: &str,
) -> Vec<PermissionConflict> {
    let mut conflicts = Vec::new();

    for (module_id, actions) in map.iter() {
        let Some(module) = graph.get(module_id.as_str()) else {
            conflicts.push(PermissionConflict::invalid_action(
                module_id.as_str(),
                None,
                format!("{owner} references unknown module '{module_id}'"),
            ));
            continue;
        };

        for action in actions.iter().filter(|action| !module.supports(**action)) {
            conflicts.push(PermissionConflict::invalid_action(
                module_id.as_str(),
                Some(*action),
                format!("{owner} references action '{action}' not available on module '{module_id}'"),
            ));
        }
    }

    conflicts
}

fn dangling_record(description: String) -> PermissionConflict {
    PermissionConflict::invalid_action(ALL_MODULES, None, description)
}
