use std::collections::BTreeSet;
use std::sync::Arc;

use modgate_core::{AppError, AppResult, CallerIdentity};
use modgate_domain::{
    AuditEntityType, AuditOperation, AuditRecordId, Module, ModuleChange, ModuleGraph,
    NewAuditRecord, PermissionConflict,
};
use tracing::{info, warn};

use crate::{AuditLogRepository, CatalogLock, Clock, EffectivePermissionCache, PermissionStore};

/// Result of a catalog mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogChangeOutcome {
    /// Whether the change was committed.
    pub success: bool,
    /// Conflicts found in the prospective graph.
    pub conflicts: Vec<PermissionConflict>,
    /// Audit record written on success.
    pub audit_record_id: Option<AuditRecordId>,
    /// Cache or audit failure after the change was committed.
    pub error: Option<String>,
}

/// Maintains the module catalog and validates its dependency graph.
#[derive(Clone)]
pub struct ModuleCatalogService {
    store: Arc<dyn PermissionStore>,
    audit_log: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn EffectivePermissionCache>>,
    catalog_lock: CatalogLock,
}

impl ModuleCatalogService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionStore>,
        audit_log: Arc<dyn AuditLogRepository>,
        clock: Arc<dyn Clock>,
        catalog_lock: CatalogLock,
    ) -> Self {
        Self {
            store,
            audit_log,
            clock,
            cache: None,
            catalog_lock,
        }
    }

    /// Enables synchronous invalidation of the effective permission cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn EffectivePermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Lists modules in display order.
    pub async fn list_modules(&self) -> AppResult<Vec<Module>> {
        let graph = self.load_graph().await?;
        Ok(graph
            .modules_in_display_order()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Validates the stored dependency graph.
    pub async fn validate_module_graph(&self) -> AppResult<Vec<PermissionConflict>> {
        Ok(self.load_graph().await?.validate())
    }

    /// Adds a module when the resulting graph has no blocking conflict.
    ///
    /// An existing id is a `Conflict` error; use a new id to redefine a module.
    pub async fn add_module(
        &self,
        actor: &CallerIdentity,
        module: Module,
        reason: &str,
    ) -> AppResult<CatalogChangeOutcome> {
        let reason = required_reason(reason)?;
        let _catalog = self.catalog_lock.write().await;
        let graph = self.load_graph().await?;

        if graph.contains(module.id().as_str()) {
            return Err(AppError::Conflict(format!(
                "module '{}' already exists",
                module.id()
            )));
        }

        let conflicts = graph.with_module(module.clone()).validate();
        if let Some(introduced) = introduced_blocking(&graph, &conflicts) {
            warn!(module_id = %module.id(), conflicts = introduced.len(), "module addition rejected");
            return Ok(rejected(introduced));
        }

        let change = ModuleChange {
            module_id: module.id().clone(),
            before: BTreeSet::new(),
            after: module.available_actions().clone(),
        };
        let module_id = module.id().to_string();
        self.store.save_module(module).await?;

        info!(module_id = %module_id, performed_by = actor.subject(), "module added");
        Ok(self
            .finish_commit(
                actor,
                &module_id,
                AuditOperation::ModuleAdded,
                change,
                reason,
                conflicts,
            )
            .await)
    }

    /// Removes a module when no remaining module depends on it.
    pub async fn remove_module(
        &self,
        actor: &CallerIdentity,
        module_id: &str,
        reason: &str,
    ) -> AppResult<CatalogChangeOutcome> {
        let reason = required_reason(reason)?;
        let _catalog = self.catalog_lock.write().await;
        let graph = self.load_graph().await?;

        let Some((prospective, existing)) = graph.without_module(module_id) else {
            return Err(AppError::NotFound(format!(
                "module '{module_id}' does not exist"
            )));
        };

        let conflicts = prospective.validate();
        if let Some(introduced) = introduced_blocking(&graph, &conflicts) {
            warn!(module_id, conflicts = introduced.len(), "module removal rejected");
            return Ok(rejected(introduced));
        }

        self.store.delete_module(module_id).await?;

        let change = ModuleChange {
            module_id: existing.id().clone(),
            before: existing.available_actions().clone(),
            after: BTreeSet::new(),
        };

        info!(module_id, performed_by = actor.subject(), "module removed");
        Ok(self
            .finish_commit(
                actor,
                module_id,
                AuditOperation::ModuleRemoved,
                change,
                reason,
                conflicts,
            )
            .await)
    }

    async fn load_graph(&self) -> AppResult<ModuleGraph> {
        ModuleGraph::new(self.store.list_modules().await?)
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        match &self.cache {
            Some(cache) => cache.invalidate_all().await,
            None => Ok(()),
        }
    }

    /// Invalidates the cache and audits a committed change. Failures here are
    /// reported on the outcome; the catalog change itself stays committed.
    async fn finish_commit(
        &self,
        actor: &CallerIdentity,
        module_id: &str,
        operation: AuditOperation,
        change: ModuleChange,
        reason: &str,
        conflicts: Vec<PermissionConflict>,
    ) -> CatalogChangeOutcome {
        let mut follow_up_errors = Vec::new();
        if let Err(error) = self.invalidate_all().await {
            follow_up_errors.push(format!("cache invalidation failed: {error}"));
        }

        let audit_record_id = match self
            .append_audit(actor, module_id, operation, change, reason)
            .await
        {
            Ok(audit_record_id) => Some(audit_record_id),
            Err(error) => {
                follow_up_errors.push(format!("audit append failed: {error}"));
                None
            }
        };

        let error = (!follow_up_errors.is_empty()).then(|| follow_up_errors.join("; "));
        if let Some(error) = &error {
            warn!(module_id, error = %error, "module catalog change follow-up failed");
        }

        CatalogChangeOutcome {
            success: true,
            conflicts,
            audit_record_id,
            error,
        }
    }

    async fn append_audit(
        &self,
        actor: &CallerIdentity,
        module_id: &str,
        operation: AuditOperation,
        change: ModuleChange,
        reason: &str,
    ) -> AppResult<AuditRecordId> {
        self.audit_log
            .append(NewAuditRecord {
                entity_type: AuditEntityType::Module,
                entity_id: module_id.to_owned(),
                operation,
                changes: vec![change],
                performed_by: actor.subject().to_owned(),
                timestamp: self.clock.now(),
                reason: reason.to_owned(),
            })
            .await
    }
}

fn required_reason(reason: &str) -> AppResult<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation(
            "catalog change reason must not be blank".to_owned(),
        ));
    }

    Ok(reason)
}

/// Returns blocking conflicts the change would add to the current graph.
/// Conflicts already present do not block unrelated changes.
fn introduced_blocking(
    current: &ModuleGraph,
    prospective: &[PermissionConflict],
) -> Option<Vec<PermissionConflict>> {
    let existing = current.validate();
    let introduced: Vec<PermissionConflict> = prospective
        .iter()
        .filter(|conflict| conflict.is_blocking() && !existing.contains(conflict))
        .cloned()
        .collect();

    (!introduced.is_empty()).then_some(introduced)
}

fn rejected(conflicts: Vec<PermissionConflict>) -> CatalogChangeOutcome {
    CatalogChangeOutcome {
        success: false,
        conflicts,
        audit_record_id: None,
        error: None,
    }
}

#[cfg(test)]
mod tests;
