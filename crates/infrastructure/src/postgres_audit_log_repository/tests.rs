use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use modgate_application::{AuditLogRepository, AuditLogService};
use modgate_core::ModuleId;
use modgate_domain::{
    Action, AuditEntityType, AuditFilter, AuditOperation, ModuleChange, NewAuditRecord,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::PostgresAuditLogRepository;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit log tests: {error}");
    }

    Some(pool)
}

fn record(performed_by: &str, entity_id: &str, minutes_ago: i64) -> NewAuditRecord {
    let now = Utc::now()
        .duration_trunc(Duration::seconds(1))
        .unwrap_or_else(|_| unreachable!());

    NewAuditRecord {
        entity_type: AuditEntityType::Role,
        entity_id: entity_id.to_owned(),
        operation: AuditOperation::BulkPermissionUpdate,
        changes: vec![ModuleChange {
            module_id: ModuleId::new("crm").unwrap_or_else(|_| unreachable!()),
            before: BTreeSet::from([Action::View]),
            after: BTreeSet::from([Action::View, Action::Edit]),
        }],
        performed_by: performed_by.to_owned(),
        timestamp: now - Duration::minutes(minutes_ago),
        reason: "access review".to_owned(),
    }
}

#[tokio::test]
async fn appended_records_are_read_back_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = Arc::new(PostgresAuditLogRepository::new(pool));
    let actor = format!("auditor-{}", uuid::Uuid::new_v4().simple());

    for (entity_id, minutes_ago) in [("manager", 30), ("viewer", 10), ("manager", 20)] {
        let appended = repository
            .append(record(actor.as_str(), entity_id, minutes_ago))
            .await;
        assert!(appended.is_ok());
    }

    let service = AuditLogService::new(repository, 2).unwrap_or_else(|_| unreachable!());
    let records = service
        .query(AuditFilter {
            performed_by: Some(actor.clone()),
            ..AuditFilter::default()
        })
        .unwrap_or_else(|_| unreachable!())
        .collect_all()
        .await
        .unwrap_or_else(|_| unreachable!());

    let entity_ids: Vec<&str> = records
        .iter()
        .map(|record| record.entity_id.as_str())
        .collect();
    assert_eq!(entity_ids, vec!["viewer", "manager", "manager"]);
    assert_eq!(records[0].changes[0].after.len(), 2);
}

#[tokio::test]
async fn filters_narrow_by_entity_and_date_range() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAuditLogRepository::new(pool);
    let actor = format!("auditor-{}", uuid::Uuid::new_v4().simple());

    for (entity_id, minutes_ago) in [("manager", 120), ("manager", 5), ("viewer", 5)] {
        assert!(
            repository
                .append(record(actor.as_str(), entity_id, minutes_ago))
                .await
                .is_ok()
        );
    }

    let recent_managers = repository
        .list_page(
            &AuditFilter {
                entity_type: Some(AuditEntityType::Role),
                entity_id: Some("manager".to_owned()),
                performed_by: Some(actor),
                from: Some(Utc::now() - Duration::hours(1)),
                to: None,
            },
            None,
            10,
        )
        .await
        .unwrap_or_default();

    assert_eq!(recent_managers.len(), 1);
    assert_eq!(recent_managers[0].entity_id, "manager");
}
