//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action;
mod audit;
mod bulk_update;
mod conflict;
mod module;
mod module_graph;
mod permission_map;
mod resolution;
mod role;
mod subscription;
mod tenancy;

pub use action::{Action, ActionSet};
pub use audit::{
    AuditCursor, AuditEntityType, AuditFilter, AuditOperation, AuditRecord, AuditRecordId,
    NewAuditRecord,
};
pub use bulk_update::{
    BulkPermissionUpdate, BulkTargetResult, BulkTargetType, ModuleChange, ModuleUpdate,
    PlannedUpdate, UpdateOperation, ceiling_reductions, plan_update,
};
pub use conflict::{ConflictSeverity, ConflictType, PermissionConflict};
pub use module::{Module, ModuleDefinition};
pub use module_graph::ModuleGraph;
pub use permission_map::PermissionMap;
pub use resolution::{
    ALL_MODULES, AccessSnapshot, EffectivePermission, EffectivePermissionSet, PermissionCheck,
    PermissionState, RestrictedBy, resolve_effective_permissions, resolve_permission,
};
pub use role::Role;
pub use subscription::SubscriptionPlan;
pub use tenancy::{Organization, User};
