use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Contract for one seeded request, used by `verify` to confirm the
/// database matches what the SQL fixture promises.
struct SeedRequestContract {
    request_id: &'static str,
    kind: &'static str,
    requester_id: &'static str,
    status: &'static str,
    approver_id: Option<&'static str>,
    has_audit_row: bool,
}

const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        request_id: "req-seed-pending-001",
        kind: "leave",
        requester_id: "u-intern-01",
        status: "pending",
        approver_id: None,
        has_audit_row: false,
    },
    SeedRequestContract {
        request_id: "req-seed-approved-001",
        kind: "leave",
        requester_id: "u-paralegal-01",
        status: "approved",
        approver_id: Some("u-senior-01"),
        has_audit_row: true,
    },
    SeedRequestContract {
        request_id: "req-seed-rejected-001",
        kind: "expense",
        requester_id: "u-associate-01",
        status: "rejected",
        approver_id: Some("u-counsel-01"),
        has_audit_row: true,
    },
];

/// One user per role; handler smoke tests and the CLI seed command both
/// rely on these ids being present.
pub const SEED_USER_IDS: &[&str] = &[
    "u-intern-01",
    "u-paralegal-01",
    "u-associate-01",
    "u-senior-01",
    "u-counsel-01",
    "u-office-01",
];

/// Deterministic development/demo fixtures: every role represented in the
/// directory and one request in each workflow state.
pub struct SeedDataset;

#[derive(Debug)]
pub struct SeedVerification {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl SeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Load the fixture set in a single transaction. Idempotent.
    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Verify the database contains the seed contract.
    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
        let mut checks = Vec::new();

        let placeholders = vec!["?"; SEED_USER_IDS.len()].join(", ");
        let user_count_statement =
            format!("SELECT COUNT(1) FROM users WHERE id IN ({placeholders})");
        let mut user_count_query = sqlx::query_scalar(&user_count_statement);
        for id in SEED_USER_IDS {
            user_count_query = user_count_query.bind(*id);
        }
        let user_count: i64 = user_count_query.fetch_one(pool).await?;
        checks.push(("seed-users".to_string(), user_count == SEED_USER_IDS.len() as i64));

        for contract in SEED_REQUESTS {
            let request_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM workflow_request
                     WHERE id = ?1 AND kind = ?2 AND requester_id = ?3 AND status = ?4
                       AND (approver_id IS ?5)
                 )",
            )
            .bind(contract.request_id)
            .bind(contract.kind)
            .bind(contract.requester_id)
            .bind(contract.status)
            .bind(contract.approver_id)
            .fetch_one(pool)
            .await?;
            checks.push((contract.request_id.to_string(), request_ok == 1));

            let audit_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM request_audit_log WHERE request_id = ?1")
                    .bind(contract.request_id)
                    .fetch_one(pool)
                    .await?;
            let expected = i64::from(contract.has_audit_row);
            checks.push((format!("{}:audit", contract.request_id), audit_count == expected));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(SeedVerification { all_present, checks })
    }
}
