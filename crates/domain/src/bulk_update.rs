use std::collections::BTreeSet;
use std::str::FromStr;

use modgate_core::{AppError, AppResult, ModuleId, RoleId};
use serde::{Deserialize, Serialize};

use crate::{
    Action, ActionSet, AuditRecordId, ModuleGraph, PermissionConflict, PermissionMap, Role,
};

/// How a module update combines with the existing action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    /// Union with the existing actions.
    Add,
    /// Existing actions minus the given ones.
    Remove,
    /// Exactly the given actions.
    Replace,
}

impl UpdateOperation {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

impl FromStr for UpdateOperation {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "replace" => Ok(Self::Replace),
            _ => Err(AppError::Validation(format!(
                "unknown update operation '{value}'"
            ))),
        }
    }
}

/// One module's change inside a bulk update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUpdate {
    /// Module being changed.
    pub module_id: ModuleId,
    /// Actions the operation applies.
    pub actions: ActionSet,
    /// Combination rule.
    pub operation: UpdateOperation,
}

impl ModuleUpdate {
    /// Computes the resulting action set.
    #[must_use]
    pub fn apply(&self, existing: &ActionSet) -> ActionSet {
        match self.operation {
            UpdateOperation::Add => existing.union(&self.actions).copied().collect(),
            UpdateOperation::Remove => existing.difference(&self.actions).copied().collect(),
            UpdateOperation::Replace => self.actions.clone(),
        }
    }
}

/// Kind of record a bulk update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkTargetType {
    /// Role grants.
    Role,
    /// Subscription plan ceilings.
    Subscription,
}

impl BulkTargetType {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Subscription => "subscription",
        }
    }
}

impl FromStr for BulkTargetType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "role" => Ok(Self::Role),
            "subscription" => Ok(Self::Subscription),
            _ => Err(AppError::Validation(format!(
                "unknown bulk target type '{value}'"
            ))),
        }
    }
}

/// Permission changes applied to several roles or plans at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPermissionUpdate {
    /// Kind of the targets.
    pub target_type: BulkTargetType,
    /// Role or plan ids, depending on `target_type`.
    pub target_ids: Vec<String>,
    /// Changes applied to every target, in order.
    pub module_updates: Vec<ModuleUpdate>,
    /// Free-text justification copied into the audit log.
    pub reason: String,
}

impl BulkPermissionUpdate {
    /// Rejects requests that are malformed as a whole.
    pub fn validate(&self) -> AppResult<()> {
        if self.target_ids.is_empty() {
            return Err(AppError::Validation(
                "bulk update must name at least one target".to_owned(),
            ));
        }

        if self.target_ids.iter().any(|target_id| target_id.trim().is_empty()) {
            return Err(AppError::Validation(
                "bulk update target ids must not be blank".to_owned(),
            ));
        }

        if self.module_updates.is_empty() {
            return Err(AppError::Validation(
                "bulk update must contain at least one module update".to_owned(),
            ));
        }

        if self.reason.trim().is_empty() {
            return Err(AppError::Validation(
                "bulk update reason must not be blank".to_owned(),
            ));
        }

        Ok(())
    }

    /// Returns target ids in request order with duplicates removed.
    #[must_use]
    pub fn unique_target_ids(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.target_ids
            .iter()
            .map(String::as_str)
            .filter(|target_id| seen.insert(*target_id))
            .collect()
    }
}

/// Before and after action sets of one touched module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleChange {
    /// Touched module.
    pub module_id: ModuleId,
    /// Actions before the change.
    pub before: ActionSet,
    /// Actions after the change.
    pub after: ActionSet,
}

impl ModuleChange {
    /// Returns actions present before but not after.
    #[must_use]
    pub fn removed_actions(&self) -> ActionSet {
        self.before.difference(&self.after).copied().collect()
    }
}

/// Prospective result of applying module updates to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// Resulting permission map.
    pub permissions: PermissionMap,
    /// Touched modules in first-touch order.
    pub changes: Vec<ModuleChange>,
    /// Conflicts found against the prospective map.
    pub conflicts: Vec<PermissionConflict>,
}

impl PlannedUpdate {
    /// Returns whether any blocking conflict rejects the target.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.conflicts.iter().any(PermissionConflict::is_blocking)
    }
}

/// Applies module updates to a target's current map and validates the result.
///
/// Unknown modules and actions outside a module's `available_actions` block
/// the target before anything else is checked. Otherwise the prospective map
/// is checked for dependency closure and for touched core modules that would
/// lose `view`.
#[must_use]
pub fn plan_update(
    graph: &ModuleGraph,
    current: &PermissionMap,
    updates: &[ModuleUpdate],
) -> PlannedUpdate {
    let input_conflicts = input_conflicts(graph, updates);
    if !input_conflicts.is_empty() {
        return PlannedUpdate {
            permissions: current.clone(),
            changes: Vec::new(),
            conflicts: input_conflicts,
        };
    }

    let mut permissions = current.clone();
    let mut touched: Vec<ModuleId> = Vec::new();

    for update in updates {
        let next = update.apply(&permissions.actions(update.module_id.as_str()));
        permissions.set(update.module_id.clone(), next);
        if !touched.contains(&update.module_id) {
            touched.push(update.module_id.clone());
        }
    }

    let changes: Vec<ModuleChange> = touched
        .into_iter()
        .map(|module_id| ModuleChange {
            before: current.actions(module_id.as_str()),
            after: permissions.actions(module_id.as_str()),
            module_id,
        })
        .collect();

    let mut conflicts = graph.dependency_conflicts(&permissions);
    for change in &changes {
        let is_core = graph
            .get(change.module_id.as_str())
            .is_some_and(|module| module.is_core());
        if is_core && !change.after.contains(&Action::View) {
            conflicts.push(PermissionConflict::invalid_action(
                change.module_id.as_str(),
                Some(Action::View),
                format!("core module '{}' must keep 'view'", change.module_id),
            ));
        }
    }

    PlannedUpdate {
        permissions,
        changes,
        conflicts,
    }
}

fn input_conflicts(graph: &ModuleGraph, updates: &[ModuleUpdate]) -> Vec<PermissionConflict> {
    let mut conflicts = Vec::new();

    for update in updates {
        let Some(module) = graph.get(update.module_id.as_str()) else {
            conflicts.push(PermissionConflict::invalid_action(
                update.module_id.as_str(),
                None,
                format!("unknown module '{}'", update.module_id),
            ));
            continue;
        };

        for action in update.actions.iter().filter(|action| !module.supports(**action)) {
            conflicts.push(PermissionConflict::invalid_action(
                update.module_id.as_str(),
                Some(*action),
                format!(
                    "action '{action}' is not available on module '{}'",
                    update.module_id
                ),
            ));
        }
    }

    conflicts
}

/// Lists ceiling actions removed from a plan that active roles still request.
#[must_use]
pub fn ceiling_reductions(changes: &[ModuleChange], roles: &[Role]) -> Vec<PermissionConflict> {
    let mut conflicts = Vec::new();

    for change in changes {
        for action in change.removed_actions() {
            let affected_roles: Vec<RoleId> = roles
                .iter()
                .filter(|role| role.is_active() && role.requests(change.module_id.as_str(), action))
                .map(|role| role.id().clone())
                .collect();

            if !affected_roles.is_empty() {
                conflicts.push(PermissionConflict::ceiling_reduced(
                    &change.module_id,
                    action,
                    affected_roles,
                ));
            }
        }
    }

    conflicts
}

/// Outcome for one bulk update target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTargetResult {
    /// Role or plan id.
    pub target_id: String,
    /// Whether the target was committed.
    pub success: bool,
    /// Blocking or informational conflicts.
    pub conflicts: Vec<PermissionConflict>,
    /// Failure unrelated to conflicts, such as an unknown target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Audit record written on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_record_id: Option<AuditRecordId>,
}

impl BulkTargetResult {
    /// Target rejected by blocking conflicts.
    #[must_use]
    pub fn rejected(target_id: impl Into<String>, conflicts: Vec<PermissionConflict>) -> Self {
        Self {
            target_id: target_id.into(),
            success: false,
            conflicts,
            error: None,
            audit_record_id: None,
        }
    }

    /// Target that failed before validation or during the write.
    #[must_use]
    pub fn failed(target_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            success: false,
            conflicts: Vec::new(),
            error: Some(error.into()),
            audit_record_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use modgate_core::{ModuleId, OrganizationId, RoleId};
    use proptest::prelude::*;

    use super::{
        BulkPermissionUpdate, BulkTargetType, ModuleUpdate, UpdateOperation, ceiling_reductions,
        plan_update,
    };
    use crate::{
        Action, ConflictType, Module, ModuleDefinition, ModuleGraph, PermissionMap, Role,
    };

    fn module_id(value: &str) -> ModuleId {
        ModuleId::new(value).unwrap_or_else(|_| unreachable!())
    }

    fn actions(values: &[Action]) -> BTreeSet<Action> {
        values.iter().copied().collect()
    }

    fn update(module: &str, values: &[Action], operation: UpdateOperation) -> ModuleUpdate {
        ModuleUpdate {
            module_id: module_id(module),
            actions: actions(values),
            operation,
        }
    }

    fn graph() -> ModuleGraph {
        ModuleGraph::new(vec![
            Module::new(ModuleDefinition::new("crm", "CRM")).unwrap_or_else(|_| unreachable!()),
            Module::new(ModuleDefinition::new("billing", "Billing").depends_on(["crm"]))
                .unwrap_or_else(|_| unreachable!()),
            Module::new(
                ModuleDefinition::new("dashboard", "Dashboard")
                    .with_actions([Action::View, Action::Edit])
                    .core(),
            )
            .unwrap_or_else(|_| unreachable!()),
        ])
        .unwrap_or_else(|_| unreachable!())
    }

    fn request(target_ids: &[&str], reason: &str) -> BulkPermissionUpdate {
        BulkPermissionUpdate {
            target_type: BulkTargetType::Role,
            target_ids: target_ids.iter().map(|id| (*id).to_owned()).collect(),
            module_updates: vec![update("crm", &[Action::View], UpdateOperation::Add)],
            reason: reason.to_owned(),
        }
    }

    #[test]
    fn operations_combine_with_existing_actions() {
        let existing = actions(&[Action::View, Action::Edit]);

        assert_eq!(
            update("crm", &[Action::Manage], UpdateOperation::Add).apply(&existing),
            actions(&[Action::View, Action::Edit, Action::Manage])
        );
        assert_eq!(
            update("crm", &[Action::Edit], UpdateOperation::Remove).apply(&existing),
            actions(&[Action::View])
        );
        assert_eq!(
            update("crm", &[Action::Disable], UpdateOperation::Replace).apply(&existing),
            actions(&[Action::Disable])
        );
    }

    #[test]
    fn whole_request_shape_is_validated() {
        assert!(request(&["manager"], "quarterly review").validate().is_ok());
        assert!(request(&[], "quarterly review").validate().is_err());
        assert!(request(&["manager"], "  ").validate().is_err());
        assert!(request(&[" "], "quarterly review").validate().is_err());

        let mut empty_updates = request(&["manager"], "quarterly review");
        empty_updates.module_updates.clear();
        assert!(empty_updates.validate().is_err());
    }

    #[test]
    fn duplicate_targets_are_applied_once() {
        let update = request(&["b", "a", "b"], "cleanup");
        assert_eq!(update.unique_target_ids(), vec!["b", "a"]);
    }

    #[test]
    fn missing_dependency_blocks_the_target() {
        let current = PermissionMap::new();
        let planned = plan_update(
            &graph(),
            &current,
            &[update("billing", &[Action::Edit], UpdateOperation::Replace)],
        );

        assert!(planned.is_blocked());
        assert_eq!(planned.conflicts.len(), 1);
        assert_eq!(planned.conflicts[0].conflict_type, ConflictType::MissingDependency);
        assert_eq!(planned.conflicts[0].module_id, "crm");
    }

    #[test]
    fn unknown_module_and_unavailable_action_block_before_applying() {
        let current = PermissionMap::new();
        let planned = plan_update(
            &graph(),
            &current,
            &[
                update("ledger", &[Action::View], UpdateOperation::Add),
                update("dashboard", &[Action::Manage], UpdateOperation::Add),
            ],
        );

        assert!(planned.is_blocked());
        assert!(planned.changes.is_empty());
        assert_eq!(planned.permissions, current);
        assert_eq!(planned.conflicts.len(), 2);
        assert!(
            planned
                .conflicts
                .iter()
                .all(|conflict| conflict.conflict_type == ConflictType::InvalidAction)
        );
    }

    #[test]
    fn core_module_must_keep_view() {
        let current = PermissionMap::from_iter([(
            module_id("dashboard"),
            actions(&[Action::View, Action::Edit]),
        )]);
        let planned = plan_update(
            &graph(),
            &current,
            &[update("dashboard", &[Action::View], UpdateOperation::Remove)],
        );

        assert!(planned.is_blocked());
        assert_eq!(planned.conflicts[0].module_id, "dashboard");
    }

    #[test]
    fn changes_record_before_and_after_per_touched_module() {
        let current = PermissionMap::from_iter([(module_id("crm"), actions(&[Action::View]))]);
        let planned = plan_update(
            &graph(),
            &current,
            &[
                update("crm", &[Action::Edit], UpdateOperation::Add),
                update("billing", &[Action::View], UpdateOperation::Add),
                update("crm", &[Action::Manage], UpdateOperation::Add),
            ],
        );

        assert!(!planned.is_blocked());
        assert_eq!(planned.changes.len(), 2);
        assert_eq!(planned.changes[0].module_id.as_str(), "crm");
        assert_eq!(planned.changes[0].before, actions(&[Action::View]));
        assert_eq!(
            planned.changes[0].after,
            actions(&[Action::View, Action::Edit, Action::Manage])
        );
        assert_eq!(planned.changes[1].before, BTreeSet::new());
    }

    #[test]
    fn shrinking_ceiling_lists_active_roles_that_rely_on_it() {
        let organization_id = OrganizationId::new("acme").unwrap_or_else(|_| unreachable!());
        let role = |id: &str, active: bool| {
            Role::new(
                RoleId::new(id).unwrap_or_else(|_| unreachable!()),
                organization_id.clone(),
                PermissionMap::from_iter([(module_id("crm"), actions(&[Action::View, Action::Edit]))]),
            )
            .with_active(active)
        };
        let roles = vec![role("manager", true), role("retired", false)];

        let current = PermissionMap::from_iter([(module_id("crm"), actions(&[Action::View]))]);
        let planned = plan_update(
            &graph(),
            &current,
            &[update("crm", &[], UpdateOperation::Replace)],
        );
        assert!(!planned.is_blocked());

        let notices = ceiling_reductions(&planned.changes, &roles);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].conflict_type, ConflictType::CeilingReduced);
        assert!(!notices[0].is_blocking());
        assert_eq!(
            notices[0].affected_roles,
            vec![RoleId::new("manager").unwrap_or_else(|_| unreachable!())]
        );
    }

    fn action_set() -> impl Strategy<Value = BTreeSet<Action>> {
        proptest::sample::subsequence(Action::all().to_vec(), 0..=Action::all().len())
            .prop_map(|values| values.into_iter().collect())
    }

    proptest! {
        #[test]
        fn replace_is_idempotent(
            current_crm in action_set(),
            current_billing in action_set(),
            replacement in action_set(),
        ) {
            let current = PermissionMap::from_iter([
                (module_id("crm"), current_crm),
                (module_id("billing"), current_billing),
            ]);
            let updates = vec![ModuleUpdate {
                module_id: module_id("crm"),
                actions: replacement,
                operation: UpdateOperation::Replace,
            }];

            let first = plan_update(&graph(), &current, &updates);
            let second = plan_update(&graph(), &first.permissions, &updates);
            prop_assert_eq!(&first.permissions, &second.permissions);
        }

        #[test]
        fn unblocked_plans_keep_dependency_closure(
            crm in action_set(),
            billing in action_set(),
        ) {
            let updates = vec![
                ModuleUpdate { module_id: module_id("crm"), actions: crm, operation: UpdateOperation::Replace },
                ModuleUpdate { module_id: module_id("billing"), actions: billing, operation: UpdateOperation::Replace },
            ];
            let planned = plan_update(&graph(), &PermissionMap::new(), &updates);

            if !planned.is_blocked() && !planned.permissions.actions("billing").is_empty() {
                prop_assert!(planned.permissions.allows("crm", Action::View));
            }
        }
    }
}
