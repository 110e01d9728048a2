//! Runs against a live PostgreSQL. Set DATABASE_URL and run with
//! `cargo test -p berth-store -- --ignored`.

use berth_core::repository::{TicketStore, UnitOfWork};
use berth_core::{PoolLayout, StoreError};
use berth_shared::{BerthKind, BerthStatus, HistoryAction, HistoryEvent, Passenger, Ticket, TicketStatus, Tier};
use berth_store::app_config::DatabaseConfig;
use berth_store::{DbClient, PgTicketStore};
use chrono::Utc;
use std::time::Duration;

async fn fresh_store(lock_timeout: Duration) -> PgTicketStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let config = DatabaseConfig { url, max_connections: 4 };
    let db = DbClient::new(&config, Duration::from_secs(5)).await.unwrap();
    db.migrate().await.unwrap();

    sqlx::query("TRUNCATE ticket_history, passengers, tickets, berths CASCADE")
        .execute(&db.pool)
        .await
        .unwrap();

    PgTicketStore::new(db.pool, lock_timeout)
}

#[tokio::test]
#[ignore]
async fn test_postgres_unit_of_work() {
    let store = fresh_store(Duration::from_secs(1)).await;
    assert_eq!(store.initialize_pool(&PoolLayout::new(1, 1, 1, 0)).await.unwrap(), 3);
    assert_eq!(store.initialize_pool(&PoolLayout::new(1, 1, 1, 0)).await.unwrap(), 0);

    // Committed admission is visible afterwards.
    let mut uow = store.begin().await.unwrap();
    let mut berth = uow.free_berths(&[BerthKind::Lower]).await.unwrap().remove(0);
    berth.hold();
    uow.save_berth(&berth).await.unwrap();

    let now = uow.now().await.unwrap();
    let passenger = Passenger::new("Kavya", 64, None, false, 5);
    let ticket = Ticket::admit(Tier::Confirmed, passenger, Some(berth.id), now);
    uow.save_ticket(&ticket).await.unwrap();
    uow.append_history(&HistoryEvent::new(ticket.id, HistoryAction::Admitted, now)).await.unwrap();
    assert_eq!(uow.tier_counts().await.unwrap().confirmed, 1);
    uow.commit().await.unwrap();

    // The next unit of work's clock starts past the recorded event.
    let mut uow = store.begin().await.unwrap();
    let later = uow.now().await.unwrap();
    assert!(later > now);
    assert!(uow.now().await.unwrap() >= later);
    assert_eq!(uow.history(ticket.id).await.unwrap().len(), 1);
    drop(uow);

    let stored = store.find_ticket(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.berth_id, Some(berth.id));
    assert_eq!(stored.passenger.age(), 64);
    assert_eq!(store.history(ticket.id).await.unwrap().len(), 1);
    assert_eq!(store.list_berths(Some(BerthStatus::Held)).await.unwrap().len(), 1);

    // Dropping a unit of work rolls it back.
    let mut uow = store.begin().await.unwrap();
    let mut released = stored.clone();
    let freed = released.release(Utc::now()).unwrap();
    let mut berth = uow.find_berth(freed).await.unwrap().unwrap();
    berth.free();
    uow.save_berth(&berth).await.unwrap();
    uow.save_ticket(&released).await.unwrap();
    drop(uow);

    let unchanged = store.find_ticket(ticket.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TicketStatus::Admitted);
    assert_eq!(store.list_berths(Some(BerthStatus::Held)).await.unwrap().len(), 1);

    // A second writer times out while the first holds the lock.
    let held = store.begin().await.unwrap();
    let err = match store.begin().await {
        Ok(_) => panic!("second unit of work acquired the lock"),
        Err(err) => err,
    };
    assert!(matches!(err, StoreError::LockTimeout(_)), "got {:?}", err);
    drop(held);
    // The rollback is flushed when the connection goes back to the pool.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Deleting cascades to passenger and history.
    let mut uow = store.begin().await.unwrap();
    uow.delete_ticket(ticket.id).await.unwrap();
    uow.commit().await.unwrap();
    assert!(store.find_ticket(ticket.id).await.unwrap().is_none());
    assert!(store.history(ticket.id).await.unwrap().is_empty());
}
