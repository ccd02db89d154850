use std::sync::Arc;

use modgate_core::{AppError, CallerIdentity};
use modgate_domain::{
    Action, AuditEntityType, AuditOperation, ConflictType, Module, ModuleDefinition,
};

use crate::test_support::{
    FakeAuditLog, FakeCache, FakeStore, FixedClock, module, organization_id, role_id,
};
use crate::{CatalogLock, EffectivePermissionCache};

use super::ModuleCatalogService;

fn actor() -> CallerIdentity {
    CallerIdentity::new("platform-admin").unwrap_or_else(|_| unreachable!())
}

fn service(store: Arc<FakeStore>, audit_log: Arc<FakeAuditLog>) -> ModuleCatalogService {
    ModuleCatalogService::new(store, audit_log, Arc::new(FixedClock), CatalogLock::new())
}

fn reports(dependencies: [&'static str; 1]) -> Module {
    module(ModuleDefinition::new("reports", "Reports").depends_on(dependencies))
}

#[tokio::test]
async fn seeded_catalog_validates_cleanly() {
    let service = service(
        Arc::new(FakeStore::seeded()),
        Arc::new(FakeAuditLog::default()),
    );

    let conflicts = service
        .validate_module_graph()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(conflicts.is_empty());

    let modules = service.list_modules().await.unwrap_or_else(|_| unreachable!());
    assert_eq!(modules.len(), 3);
}

#[tokio::test]
async fn adding_a_module_is_audited_and_invalidates_the_cache() {
    let store = Arc::new(FakeStore::seeded());
    let audit_log = Arc::new(FakeAuditLog::default());
    let cache = Arc::new(FakeCache::default());
    let service = service(store.clone(), audit_log.clone()).with_cache(cache.clone());

    let outcome = service
        .add_module(&actor(), reports(["billing"]), "launch reporting")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(outcome.success);
    assert!(outcome.audit_record_id.is_some());
    assert_eq!(outcome.error, None);

    let records = audit_log.records.lock().await;
    assert_eq!(records[0].entity_type, AuditEntityType::Module);
    assert_eq!(records[0].operation, AuditOperation::ModuleAdded);
    assert_eq!(records[0].entity_id, "reports");
    assert_eq!(records[0].changes[0].after.len(), Action::all().len());

    let generation = cache
        .generation(&organization_id("acme"), &role_id("manager"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(generation.global, 1);
}

#[tokio::test]
async fn adding_a_module_with_unknown_dependency_is_rejected() {
    let store = Arc::new(FakeStore::seeded());
    let audit_log = Arc::new(FakeAuditLog::default());
    let service = service(store.clone(), audit_log.clone());

    let outcome = service
        .add_module(&actor(), reports(["ledger"]), "launch reporting")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!outcome.success);
    assert_eq!(outcome.conflicts[0].conflict_type, ConflictType::MissingDependency);
    assert_eq!(outcome.conflicts[0].module_id, "ledger");
    assert!(audit_log.records.lock().await.is_empty());
    assert_eq!(store.state.lock().await.modules.len(), 3);
}

#[tokio::test]
async fn adding_an_existing_id_is_a_conflict_error() {
    let service = service(
        Arc::new(FakeStore::seeded()),
        Arc::new(FakeAuditLog::default()),
    );

    let result = service
        .add_module(
            &actor(),
            module(ModuleDefinition::new("crm", "CRM v2")),
            "redefine",
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn removing_a_dependency_of_another_module_is_rejected() {
    let store = Arc::new(FakeStore::seeded());
    let service = service(store.clone(), Arc::new(FakeAuditLog::default()));

    let outcome = service
        .remove_module(&actor(), "crm", "sunset")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!outcome.success);
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(
        outcome.conflicts[0]
            .required_by
            .as_ref()
            .map(|module_id| module_id.as_str()),
        Some("billing")
    );
}

#[tokio::test]
async fn removing_a_leaf_module_is_audited() {
    let store = Arc::new(FakeStore::seeded());
    let audit_log = Arc::new(FakeAuditLog::default());
    let service = service(store.clone(), audit_log.clone());

    let outcome = service
        .remove_module(&actor(), "billing", "sunset")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(outcome.success);

    let records = audit_log.records.lock().await;
    assert_eq!(records[0].operation, AuditOperation::ModuleRemoved);
    assert!(records[0].changes[0].after.is_empty());
    assert_eq!(store.state.lock().await.modules.len(), 2);
}

#[tokio::test]
async fn removing_unknown_module_is_not_found() {
    let service = service(
        Arc::new(FakeStore::seeded()),
        Arc::new(FakeAuditLog::default()),
    );

    let result = service.remove_module(&actor(), "ledger", "sunset").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let blank_reason = service.remove_module(&actor(), "billing", " ").await;
    assert!(matches!(blank_reason, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn committed_addition_is_audited_when_invalidation_fails() {
    let store = Arc::new(FakeStore::seeded());
    let audit_log = Arc::new(FakeAuditLog::default());
    let service =
        service(store.clone(), audit_log.clone()).with_cache(Arc::new(FakeCache::offline()));

    let outcome = service
        .add_module(&actor(), reports(["billing"]), "launch reporting")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(outcome.success);
    assert!(outcome.audit_record_id.is_some());
    assert!(
        outcome
            .error
            .as_deref()
            .is_some_and(|error| error.contains("cache invalidation failed"))
    );

    assert!(
        store
            .state
            .lock()
            .await
            .modules
            .iter()
            .any(|module| module.id().as_str() == "reports")
    );
    assert_eq!(audit_log.records.lock().await.len(), 1);
}

#[tokio::test]
async fn committed_removal_reports_audit_failure_without_failing() {
    let store = Arc::new(FakeStore::seeded());
    let service = service(store.clone(), Arc::new(FakeAuditLog::offline()));

    let outcome = service
        .remove_module(&actor(), "billing", "sunset")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(outcome.success);
    assert_eq!(outcome.audit_record_id, None);
    assert!(
        outcome
            .error
            .as_deref()
            .is_some_and(|error| error.contains("audit append failed"))
    );
    assert_eq!(store.state.lock().await.modules.len(), 2);
}
