use std::sync::Arc;

use modgate_core::{AppError, AppResult, CallerIdentity, PlanId, RoleId};
use modgate_domain::{
    AuditEntityType, AuditOperation, AuditRecordId, BulkPermissionUpdate, BulkTargetResult,
    BulkTargetType, ModuleChange, ModuleGraph, ModuleUpdate, NewAuditRecord, PermissionConflict,
    PlannedUpdate, ceiling_reductions, plan_update,
};
use tracing::{info, warn};

use crate::write_locks::TargetLocks;
use crate::{AuditLogRepository, CatalogLock, Clock, EffectivePermissionCache, PermissionStore};

/// Applies permission changes to many roles or plans, committing each
/// target independently.
#[derive(Clone)]
pub struct BulkUpdateService {
    store: Arc<dyn PermissionStore>,
    audit_log: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn EffectivePermissionCache>>,
    catalog_lock: CatalogLock,
    target_locks: TargetLocks,
}

struct UpdateContext<'a> {
    actor: &'a CallerIdentity,
    target_type: BulkTargetType,
    graph: &'a ModuleGraph,
    module_updates: &'a [ModuleUpdate],
    reason: &'a str,
}

struct Committed {
    conflicts: Vec<PermissionConflict>,
    audit_record_id: Option<AuditRecordId>,
    follow_up_error: Option<String>,
}

enum TargetFailure {
    Rejected(Vec<PermissionConflict>),
    Failed(String),
}

impl From<AppError> for TargetFailure {
    fn from(error: AppError) -> Self {
        Self::Failed(error.to_string())
    }
}

impl BulkUpdateService {
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
            target_locks: TargetLocks::default(),
        }
    }

    /// Enables synchronous invalidation of the effective permission cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn EffectivePermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Applies the update to every target and reports one result per
    /// distinct target id.
    ///
    /// A malformed request fails as a whole before any target is read.
    /// Everything after that is reported per target: one target's rejection
    /// or storage failure never rolls back another's commit.
    pub async fn apply(
        &self,
        actor: &CallerIdentity,
        update: BulkPermissionUpdate,
    ) -> AppResult<Vec<BulkTargetResult>> {
        update.validate()?;

        let _catalog = self.catalog_lock.read().await;
        let graph = ModuleGraph::new(self.store.list_modules().await?)?;
        let context = UpdateContext {
            actor,
            target_type: update.target_type,
            graph: &graph,
            module_updates: &update.module_updates,
            reason: update.reason.trim(),
        };

        let mut results = Vec::new();
        for target_id in update.unique_target_ids() {
            let _target = self
                .target_locks
                .acquire(update.target_type, target_id)
                .await;

            let outcome = match update.target_type {
                BulkTargetType::Role => self.apply_to_role(&context, target_id).await,
                BulkTargetType::Subscription => self.apply_to_plan(&context, target_id).await,
            };

            let result = match outcome {
                Ok(committed) => {
                    info!(
                        target_type = update.target_type.as_str(),
                        target_id,
                        performed_by = actor.subject(),
                        "bulk permission update committed"
                    );
                    if let Some(error) = &committed.follow_up_error {
                        warn!(target_id, error = %error, "bulk permission update follow-up failed");
                    }
                    BulkTargetResult {
                        target_id: target_id.to_owned(),
                        success: true,
                        conflicts: committed.conflicts,
                        error: committed.follow_up_error,
                        audit_record_id: committed.audit_record_id,
                    }
                }
                Err(TargetFailure::Rejected(conflicts)) => {
                    warn!(
                        target_type = update.target_type.as_str(),
                        target_id,
                        conflicts = conflicts.len(),
                        "bulk permission update rejected"
                    );
                    BulkTargetResult::rejected(target_id, conflicts)
                }
                Err(TargetFailure::Failed(error)) => {
                    warn!(
                        target_type = update.target_type.as_str(),
                        target_id,
                        error = %error,
                        "bulk permission update failed"
                    );
                    BulkTargetResult::failed(target_id, error)
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    async fn apply_to_role(
        &self,
        context: &UpdateContext<'_>,
        target_id: &str,
    ) -> Result<Committed, TargetFailure> {
        let role_id = RoleId::new(target_id)?;
        let role = self
            .store
            .find_role(&role_id)
            .await?
            .ok_or_else(|| TargetFailure::Failed(format!("role '{role_id}' does not exist")))?;

        let planned = checked(plan_update(
            context.graph,
            role.permissions(),
            context.module_updates,
        ))?;

        self.store
            .save_role_permissions(&role_id, &planned.permissions)
            .await?;

        // Committed from here on: later failures are reported, not rolled back.
        let invalidated = match &self.cache {
            Some(cache) => cache.invalidate_role(role.organization_id(), &role_id).await,
            None => Ok(()),
        };

        Ok(self
            .finish_commit(
                context,
                role_id.as_str(),
                planned.changes,
                planned.conflicts,
                invalidated,
            )
            .await)
    }

    async fn apply_to_plan(
        &self,
        context: &UpdateContext<'_>,
        target_id: &str,
    ) -> Result<Committed, TargetFailure> {
        let plan_id = PlanId::new(target_id)?;
        let plan = self
            .store
            .find_plan(&plan_id)
            .await?
            .ok_or_else(|| TargetFailure::Failed(format!("plan '{plan_id}' does not exist")))?;

        let planned = checked(plan_update(
            context.graph,
            plan.modules(),
            context.module_updates,
        ))?;

        let roles = self.store.list_roles_for_plan(&plan_id).await?;
        let mut conflicts = planned.conflicts;
        conflicts.extend(ceiling_reductions(&planned.changes, &roles));

        self.store
            .save_plan_modules(&plan_id, &planned.permissions)
            .await?;

        let invalidated = self.invalidate_plan_subscribers(&plan_id).await;

        Ok(self
            .finish_commit(
                context,
                plan_id.as_str(),
                planned.changes,
                conflicts,
                invalidated,
            )
            .await)
    }

    async fn invalidate_plan_subscribers(&self, plan_id: &PlanId) -> AppResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        for organization in self.store.list_organizations_for_plan(plan_id).await? {
            cache.invalidate_organization(organization.id()).await?;
        }

        Ok(())
    }

    async fn finish_commit(
        &self,
        context: &UpdateContext<'_>,
        entity_id: &str,
        changes: Vec<ModuleChange>,
        conflicts: Vec<PermissionConflict>,
        invalidated: AppResult<()>,
    ) -> Committed {
        let mut follow_up_errors = Vec::new();
        if let Err(error) = invalidated {
            follow_up_errors.push(format!("cache invalidation failed: {error}"));
        }

        let appended = self
            .audit_log
            .append(NewAuditRecord {
                entity_type: AuditEntityType::from(context.target_type),
                entity_id: entity_id.to_owned(),
                operation: AuditOperation::BulkPermissionUpdate,
                changes,
                performed_by: context.actor.subject().to_owned(),
                timestamp: self.clock.now(),
                reason: context.reason.to_owned(),
            })
            .await;

        let audit_record_id = match appended {
            Ok(audit_record_id) => Some(audit_record_id),
            Err(error) => {
                follow_up_errors.push(format!("audit append failed: {error}"));
                None
            }
        };

        Committed {
            conflicts,
            audit_record_id,
            follow_up_error: (!follow_up_errors.is_empty()).then(|| follow_up_errors.join("; ")),
        }
    }
}

fn checked(planned: PlannedUpdate) -> Result<PlannedUpdate, TargetFailure> {
    if planned.is_blocked() {
        return Err(TargetFailure::Rejected(planned.conflicts));
    }

    Ok(planned)
}
