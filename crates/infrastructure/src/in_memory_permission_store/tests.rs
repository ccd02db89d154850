use std::collections::BTreeSet;
use std::sync::Arc;

use modgate_application::{
    BulkUpdateService, CatalogLock, PermissionResolutionService, PermissionStore,
};
use modgate_core::{AppError, CallerIdentity, ModuleId, PlanId, RoleId, UserId};
use modgate_domain::{
    Action, BulkPermissionUpdate, BulkTargetType, ConflictType, ModuleUpdate, PermissionMap,
    RestrictedBy, UpdateOperation,
};

use super::InMemoryPermissionStore;
use crate::{InMemoryAuditLogRepository, PermissionSnapshot, SystemClock};

const SAMPLE: &str = include_str!("../../fixtures/sample_snapshot.json");

fn seeded_store() -> InMemoryPermissionStore {
    let snapshot = PermissionSnapshot::from_json(SAMPLE).unwrap_or_else(|_| unreachable!());
    InMemoryPermissionStore::from_snapshot(snapshot).unwrap_or_else(|_| unreachable!())
}

fn user_id(value: &str) -> UserId {
    UserId::new(value).unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn access_records_follow_user_references() {
    let store = seeded_store();

    let records = store
        .load_access_records(&user_id("carol"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(records.graph.len(), 4);
    assert_eq!(
        records.role.as_ref().map(|role| role.id().as_str()),
        Some("globex-sales")
    );
    assert_eq!(
        records.plan.as_ref().map(|plan| plan.id().as_str()),
        Some("basic")
    );

    let unknown = store
        .load_access_records(&user_id("mallory"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(unknown.user.is_none());
    assert!(unknown.organization.is_none());
}

#[tokio::test]
async fn plan_lookups_cover_subscribed_organizations() {
    let store = seeded_store();
    let pro = PlanId::new("pro").unwrap_or_else(|_| unreachable!());

    let organizations = store
        .list_organizations_for_plan(&pro)
        .await
        .unwrap_or_default();
    assert_eq!(organizations.len(), 1);
    assert_eq!(organizations[0].id().as_str(), "acme");

    let roles = store.list_roles_for_plan(&pro).await.unwrap_or_default();
    let role_ids: Vec<&str> = roles.iter().map(|role| role.id().as_str()).collect();
    assert_eq!(role_ids, vec!["manager", "viewer"]);
}

#[tokio::test]
async fn writes_to_unknown_records_are_not_found() {
    let store = seeded_store();
    let ghost = RoleId::new("ghost").unwrap_or_else(|_| unreachable!());

    let saved = store
        .save_role_permissions(&ghost, &PermissionMap::new())
        .await;
    assert!(matches!(saved, Err(AppError::NotFound(_))));

    let deleted = store.delete_module("ledger").await;
    assert!(matches!(deleted, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn bulk_update_is_visible_to_the_next_resolution() {
    let store = Arc::new(seeded_store());
    let audit_log = Arc::new(InMemoryAuditLogRepository::new());
    let resolver = PermissionResolutionService::new(store.clone());
    let coordinator = BulkUpdateService::new(
        store.clone(),
        audit_log,
        Arc::new(SystemClock),
        CatalogLock::new(),
    );
    let alice = user_id("alice");
    let actor = CallerIdentity::new("ops@acme").unwrap_or_else(|_| unreachable!());

    let before = resolver
        .check_permission(&alice, "crm", Action::Manage)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!before.granted);
    assert_eq!(before.restricted_by, RestrictedBy::Role);

    let results = coordinator
        .apply(
            &actor,
            BulkPermissionUpdate {
                target_type: BulkTargetType::Role,
                target_ids: vec!["manager".to_owned()],
                module_updates: vec![ModuleUpdate {
                    module_id: ModuleId::new("crm").unwrap_or_else(|_| unreachable!()),
                    actions: BTreeSet::from([Action::Manage]),
                    operation: UpdateOperation::Add,
                }],
                reason: "promote managers".to_owned(),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(results[0].success);

    let after = resolver
        .check_permission(&alice, "crm", Action::Manage)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(after.granted);
}

#[tokio::test]
async fn plan_ceiling_applies_to_roles_requesting_more() {
    let store = Arc::new(seeded_store());
    let resolver = PermissionResolutionService::new(store);

    let set = resolver
        .resolve_effective_permissions(&user_id("carol"))
        .await
        .unwrap_or_else(|_| unreachable!());

    let edit = set
        .entry("crm", Action::Edit)
        .unwrap_or_else(|| unreachable!());
    assert!(!edit.granted);
    assert_eq!(edit.restricted_by, RestrictedBy::Subscription);
    assert!(
        set.conflicts
            .iter()
            .all(|conflict| conflict.conflict_type != ConflictType::CircularDependency)
    );
}
