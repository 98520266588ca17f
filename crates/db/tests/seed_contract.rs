//! Contract tests for the seed fixture set: loading must be idempotent and
//! everything it writes must decode through the repositories.

use caseflow_core::domain::principal::Role;
use caseflow_core::domain::request::{RequestId, RequestStatus, UserId};

use caseflow_db::repositories::{
    RequestFilter, RequestRepository, SqlRequestRepository, SqlUserDirectory, UserDirectory,
};
use caseflow_db::{connect_with_settings, migrations, DbPool, SeedDataset};

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    SeedDataset::load(&pool).await.expect("seed");
    pool
}

#[tokio::test]
async fn verify_passes_after_load() {
    let pool = seeded_pool().await;

    let verification = SeedDataset::verify(&pool).await.expect("verify");
    assert!(
        verification.all_present,
        "seed verification failed: {:?}",
        verification.checks.iter().filter(|(_, ok)| !ok).collect::<Vec<_>>(),
    );
}

#[tokio::test]
async fn verify_fails_on_an_unseeded_database() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");

    let verification = SeedDataset::verify(&pool).await.expect("verify");
    assert!(!verification.all_present);
}

#[tokio::test]
async fn reloading_is_idempotent() {
    let pool = seeded_pool().await;
    SeedDataset::load(&pool).await.expect("second load");

    let repo = SqlRequestRepository::new(pool.clone());
    let page = repo
        .list(&RequestFilter::default(), Default::default())
        .await
        .expect("list");
    assert_eq!(page.total, 3, "re-seeding must not duplicate requests");

    let verification = SeedDataset::verify(&pool).await.expect("verify");
    assert!(verification.all_present);
}

#[tokio::test]
async fn seeded_rows_decode_through_the_repositories() {
    let pool = seeded_pool().await;

    let directory = SqlUserDirectory::new(pool.clone());
    let senior = directory
        .find_by_id(&UserId("u-senior-01".to_string()))
        .await
        .expect("find user")
        .expect("seeded approver exists");
    assert_eq!(senior.role, Role::SeniorAssociate);

    let repo = SqlRequestRepository::new(pool);
    let approved = repo
        .find_by_id(&RequestId("req-seed-approved-001".to_string()))
        .await
        .expect("find request")
        .expect("seeded request exists");
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.approver_id, Some(UserId("u-senior-01".to_string())));
    let window = approved.leave.expect("leave request keeps its window");
    assert!(window.start_date < window.end_date);

    let pending = repo
        .find_by_id(&RequestId("req-seed-pending-001".to_string()))
        .await
        .expect("find request")
        .expect("seeded request exists");
    assert_eq!(pending.status, RequestStatus::Pending);
    assert!(pending.approver_id.is_none());
    assert!(pending.adjudicated_at.is_none());
}
