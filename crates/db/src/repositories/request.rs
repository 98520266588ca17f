use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use caseflow_core::domain::request::{
    LeaveWindow, RequestId, RequestKind, RequestStatus, UserId, WorkflowRequest,
};
use caseflow_core::workflow::AdjudicationOutcome;

use super::{PageRequest, RepositoryError, RequestFilter, RequestPage, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    raw.parse::<NaiveDate>()
        .map_err(|e| RepositoryError::Decode(format!("bad date `{raw}`: {e}")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowRequest, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let kind: String = decode(row.try_get("kind"))?;
    let requester_id: String = decode(row.try_get("requester_id"))?;
    let approver_id: Option<String> = decode(row.try_get("approver_id"))?;
    let status: String = decode(row.try_get("status"))?;
    let comments: Option<String> = decode(row.try_get("comments"))?;
    let leave_start: Option<String> = decode(row.try_get("leave_start_date"))?;
    let leave_end: Option<String> = decode(row.try_get("leave_end_date"))?;
    let leave_reason: Option<String> = decode(row.try_get("leave_reason"))?;
    let submitted_at: String = decode(row.try_get("submitted_at"))?;
    let adjudicated_at: Option<String> = decode(row.try_get("adjudicated_at"))?;

    let leave = match (leave_start, leave_end, leave_reason) {
        (Some(start), Some(end), Some(reason)) => Some(LeaveWindow {
            start_date: parse_date(&start)?,
            end_date: parse_date(&end)?,
            reason,
        }),
        (None, None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(format!(
                "request `{id}` has a partial leave window"
            )))
        }
    };

    Ok(WorkflowRequest {
        id: RequestId(id.clone()),
        kind: kind
            .parse::<RequestKind>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        requester_id: UserId(requester_id),
        approver_id: approver_id.map(UserId),
        status: status
            .parse::<RequestStatus>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        comments,
        leave,
        submitted_at: parse_timestamp(&submitted_at)?,
        adjudicated_at: adjudicated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

const SELECT_COLUMNS: &str = "SELECT id, kind, requester_id, approver_id, status, comments,
        leave_start_date, leave_end_date, leave_reason, submitted_at, adjudicated_at
 FROM workflow_request";

fn filter_clauses(filter: &RequestFilter) -> Vec<&'static str> {
    let mut clauses = Vec::new();
    if filter.status.is_some() {
        clauses.push("status = ?");
    }
    if filter.kind.is_some() {
        clauses.push("kind = ?");
    }
    if filter.requester_id.is_some() {
        clauses.push("requester_id = ?");
    }
    clauses
}

fn bind_filter<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &'q RequestFilter,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(kind) = filter.kind {
        query = query.bind(kind.as_str());
    }
    if let Some(requester_id) = &filter.requester_id {
        query = query.bind(&requester_id.0);
    }
    query
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn create(&self, request: WorkflowRequest) -> Result<(), RepositoryError> {
        let (leave_start, leave_end, leave_reason) = match &request.leave {
            Some(window) => (
                Some(window.start_date.to_string()),
                Some(window.end_date.to_string()),
                Some(window.reason.clone()),
            ),
            None => (None, None, None),
        };

        sqlx::query(
            "INSERT INTO workflow_request (id, kind, requester_id, approver_id, status, comments,
                                           leave_start_date, leave_end_date, leave_reason,
                                           submitted_at, adjudicated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(request.kind.as_str())
        .bind(&request.requester_id.0)
        .bind(request.approver_id.as_ref().map(|id| id.0.clone()))
        .bind(request.status.as_str())
        .bind(&request.comments)
        .bind(&leave_start)
        .bind(&leave_end)
        .bind(&leave_reason)
        .bind(request.submitted_at.to_rfc3339())
        .bind(request.adjudicated_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<WorkflowRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<RequestPage, RepositoryError> {
        let clauses = filter_clauses(filter);
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_statement = format!("SELECT COUNT(*) AS count FROM workflow_request{where_clause}");
        let total: i64 = bind_filter(sqlx::query(&count_statement), filter)
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let list_statement = format!(
            "{SELECT_COLUMNS}{where_clause} ORDER BY submitted_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = bind_filter(sqlx::query(&list_statement), filter)
            .bind(page.page_size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;
        Ok(RequestPage { items, total: total.max(0) as u64 })
    }

    async fn adjudicate(
        &self,
        id: &RequestId,
        outcome: &AdjudicationOutcome,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The WHERE status = 'pending' guard makes exactly one of two racing
        // adjudications win; the loser sees zero affected rows.
        let updated = sqlx::query(
            "UPDATE workflow_request
             SET status = ?,
                 approver_id = ?,
                 adjudicated_at = ?,
                 comments = COALESCE(?, comments)
             WHERE id = ? AND status = 'pending'",
        )
        .bind(outcome.to.as_str())
        .bind(&outcome.approver_id.0)
        .bind(outcome.adjudicated_at.to_rfc3339())
        .bind(&outcome.comments)
        .bind(&id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO request_audit_log (id, request_id, actor_id, action, comment, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id.0)
        .bind(&outcome.approver_id.0)
        .bind(outcome.to.as_str())
        .bind(&outcome.comments)
        .bind(outcome.adjudicated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sqlx::Row;

    use caseflow_core::domain::principal::Role;
    use caseflow_core::domain::request::{
        LeaveWindow, RequestId, RequestKind, RequestStatus, UserId, WorkflowRequest,
    };
    use caseflow_core::workflow::AdjudicationOutcome;

    use super::SqlRequestRepository;
    use crate::repositories::{
        PageRequest, RequestFilter, RequestRepository, SqlUserDirectory, UserRecord,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    /// Insert a directory user so the requester/approver FKs are satisfied.
    async fn insert_user(pool: &sqlx::SqlitePool, id: &str, role: Role) {
        let directory = SqlUserDirectory::new(pool.clone());
        directory
            .upsert(&UserRecord {
                id: UserId(id.to_string()),
                name: format!("User {id}"),
                email: format!("{id}@firm.example"),
                role,
            })
            .await
            .expect("insert user");
    }

    fn sample_request(id: &str, requester: &str, kind: RequestKind) -> WorkflowRequest {
        let now = Utc::now();
        let leave = matches!(kind, RequestKind::Leave).then(|| LeaveWindow {
            start_date: now.date_naive() + Duration::days(7),
            end_date: now.date_naive() + Duration::days(9),
            reason: "Family event travel".to_string(),
        });

        WorkflowRequest {
            id: RequestId(id.to_string()),
            kind,
            requester_id: UserId(requester.to_string()),
            approver_id: None,
            status: RequestStatus::Pending,
            comments: None,
            leave,
            submitted_at: now,
            adjudicated_at: None,
        }
    }

    fn approval_outcome(approver: &str) -> AdjudicationOutcome {
        AdjudicationOutcome {
            from: RequestStatus::Pending,
            to: RequestStatus::Approved,
            approver_id: UserId(approver.to_string()),
            adjudicated_at: Utc::now(),
            comments: Some("Enjoy".to_string()),
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trips_the_leave_window() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;

        let repo = SqlRequestRepository::new(pool);
        let request = sample_request("REQ-001", "u-intern", RequestKind::Leave);

        repo.create(request.clone()).await.expect("create");
        let found = repo
            .find_by_id(&RequestId("REQ-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.kind, RequestKind::Leave);
        assert_eq!(found.status, RequestStatus::Pending);
        assert_eq!(found.leave, request.leave);
        assert!(found.approver_id.is_none());
        assert!(found.adjudicated_at.is_none());
    }

    #[tokio::test]
    async fn find_unknown_id_returns_none() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);

        let found = repo.find_by_id(&RequestId("REQ-404".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_applies_the_filter_conjunction() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;
        insert_user(&pool, "u-paralegal", Role::Paralegal).await;
        insert_user(&pool, "u-senior", Role::SeniorAssociate).await;

        let repo = SqlRequestRepository::new(pool);
        repo.create(sample_request("REQ-001", "u-intern", RequestKind::Leave))
            .await
            .expect("create 1");
        repo.create(sample_request("REQ-002", "u-intern", RequestKind::Expense))
            .await
            .expect("create 2");
        repo.create(sample_request("REQ-003", "u-paralegal", RequestKind::Leave))
            .await
            .expect("create 3");

        repo.adjudicate(&RequestId("REQ-003".to_string()), &approval_outcome("u-senior"))
            .await
            .expect("adjudicate 3");

        let intern_leave = repo
            .list(
                &RequestFilter {
                    status: Some(RequestStatus::Pending),
                    kind: Some(RequestKind::Leave),
                    requester_id: Some(UserId("u-intern".to_string())),
                },
                PageRequest::default(),
            )
            .await
            .expect("list");
        assert_eq!(intern_leave.total, 1);
        assert_eq!(intern_leave.items[0].id.0, "REQ-001");

        let approved = repo
            .list(
                &RequestFilter {
                    status: Some(RequestStatus::Approved),
                    ..RequestFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .expect("list approved");
        assert_eq!(approved.total, 1);
        assert_eq!(approved.items[0].id.0, "REQ-003");
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_paginates_with_total() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;

        let repo = SqlRequestRepository::new(pool);
        let base = Utc::now();
        for index in 0..5 {
            let mut request =
                sample_request(&format!("REQ-{index:03}"), "u-intern", RequestKind::Other);
            request.submitted_at = base + Duration::seconds(index);
            repo.create(request).await.expect("create");
        }

        let first_page = repo
            .list(&RequestFilter::default(), PageRequest::new(1, 2))
            .await
            .expect("page 1");
        assert_eq!(first_page.total, 5);
        assert_eq!(
            first_page.items.iter().map(|r| r.id.0.as_str()).collect::<Vec<_>>(),
            vec!["REQ-004", "REQ-003"],
        );

        let last_page = repo
            .list(&RequestFilter::default(), PageRequest::new(3, 2))
            .await
            .expect("page 3");
        assert_eq!(last_page.items.len(), 1);
        assert_eq!(last_page.items[0].id.0, "REQ-000");
    }

    #[tokio::test]
    async fn adjudicate_claims_the_pending_row_exactly_once() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;
        insert_user(&pool, "u-senior", Role::SeniorAssociate).await;
        insert_user(&pool, "u-counsel", Role::LegalCounsel).await;

        let repo = SqlRequestRepository::new(pool);
        let id = RequestId("REQ-001".to_string());
        repo.create(sample_request("REQ-001", "u-intern", RequestKind::Leave))
            .await
            .expect("create");

        let first = repo.adjudicate(&id, &approval_outcome("u-senior")).await.expect("first");
        assert!(first, "first adjudication should claim the pending row");

        let mut losing = approval_outcome("u-counsel");
        losing.to = RequestStatus::Rejected;
        let second = repo.adjudicate(&id, &losing).await.expect("second");
        assert!(!second, "second adjudication must lose the conditional update");

        let stored = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.approver_id, Some(UserId("u-senior".to_string())));
        assert_eq!(stored.comments.as_deref(), Some("Enjoy"));
        assert!(stored.adjudicated_at.is_some());
    }

    #[tokio::test]
    async fn adjudicate_appends_one_audit_row_in_the_same_transaction() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;
        insert_user(&pool, "u-senior", Role::SeniorAssociate).await;

        let repo = SqlRequestRepository::new(pool.clone());
        let id = RequestId("REQ-001".to_string());
        repo.create(sample_request("REQ-001", "u-intern", RequestKind::Leave))
            .await
            .expect("create");

        repo.adjudicate(&id, &approval_outcome("u-senior")).await.expect("adjudicate");
        // Losing attempt must not leave an audit row behind.
        repo.adjudicate(&id, &approval_outcome("u-senior")).await.expect("losing attempt");

        let rows =
            sqlx::query("SELECT actor_id, action, comment FROM request_audit_log WHERE request_id = ?")
                .bind("REQ-001")
                .fetch_all(&pool)
                .await
                .expect("audit rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("actor_id"), "u-senior");
        assert_eq!(rows[0].get::<String, _>("action"), "approved");
        assert_eq!(rows[0].get::<String, _>("comment"), "Enjoy");
    }

    #[tokio::test]
    async fn adjudicate_without_comment_keeps_submission_context() {
        let pool = setup().await;
        insert_user(&pool, "u-intern", Role::Intern).await;
        insert_user(&pool, "u-senior", Role::SeniorAssociate).await;

        let repo = SqlRequestRepository::new(pool);
        let id = RequestId("REQ-001".to_string());
        let mut request = sample_request("REQ-001", "u-intern", RequestKind::Other);
        request.comments = Some("Context from submission".to_string());
        repo.create(request).await.expect("create");

        let mut outcome = approval_outcome("u-senior");
        outcome.comments = None;
        repo.adjudicate(&id, &outcome).await.expect("adjudicate");

        let stored = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.comments.as_deref(), Some("Context from submission"));
    }
}
