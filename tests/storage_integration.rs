use chrono::{TimeZone, Utc};
use std::env;
use uuid::Uuid;

use feedforward_api::db::Database;
use feedforward_api::models::{Cancellation, InsertOutcome, NewSubscription};
use feedforward_api::subscription_store::{PgSubscriptionStore, SubscriptionStore};

/// Round-trip against a real Postgres.
/// Marked ignored so it never runs against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn subscription_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let bootstrap = sqlx::PgPool::connect(&db_url).await?;
    sqlx::raw_sql(include_str!("../migrations/0001_create_subscriptions.sql"))
        .execute(&bootstrap)
        .await?;

    let db = Database::new(&db_url).await?;
    let store = PgSubscriptionStore::new(db.pool.clone());

    // Unique id so repeated runs do not collide
    let subscription_id = format!("sub_test_{}", Uuid::new_v4().simple());
    let new = NewSubscription {
        stripe_subscription_id: subscription_id.clone(),
        supabase_user_id: Uuid::new_v4().to_string(),
        stripe_customer_id: Some("cus_test".to_string()),
        status: "active".to_string(),
        price_id: Some("price_test".to_string()),
        price: Some(1000),
        product_name: Some("Pro".to_string()),
        current_period_start: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        current_period_end: Utc.timestamp_opt(1_702_592_000, 0).unwrap(),
    };

    assert_eq!(store.insert_if_absent(&new).await?, InsertOutcome::Inserted);
    assert_eq!(store.insert_if_absent(&new).await?, InsertOutcome::Duplicate);

    let stored = store
        .find(&subscription_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("inserted subscription not found"))?;
    assert_eq!(stored, new.clone().into_record());

    let canceled_at = Utc.timestamp_opt(1_700_100_000, 0).unwrap();
    let touched = store
        .apply_cancellation(
            &subscription_id,
            &Cancellation {
                status: "active".to_string(),
                cancel_at_period_end: true,
                canceled_at: Some(canceled_at),
            },
        )
        .await?;
    assert_eq!(touched, 1);

    let stored = store
        .find(&subscription_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("subscription vanished after cancellation"))?;
    assert!(stored.cancel_at_period_end);
    assert_eq!(stored.canceled_at, Some(canceled_at));
    assert_eq!(stored.current_period_end, new.current_period_end);

    let missing = store
        .apply_cancellation(
            "sub_does_not_exist",
            &Cancellation {
                status: "canceled".to_string(),
                cancel_at_period_end: true,
                canceled_at: None,
            },
        )
        .await?;
    assert_eq!(missing, 0);

    sqlx::query("DELETE FROM subscriptions WHERE stripe_subscription_id = $1")
        .bind(&subscription_id)
        .execute(&db.pool)
        .await?;

    Ok(())
}
