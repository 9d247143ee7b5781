use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::{Cancellation, InsertOutcome, NewSubscription, SubscriptionRecord};

/// Persistence for subscription records, keyed by `stripe_subscription_id`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert the record unless one with the same subscription id exists.
    async fn insert_if_absent(&self, sub: &NewSubscription) -> Result<InsertOutcome, AppError>;

    /// Overwrite status and cancellation fields; returns the number of rows touched.
    async fn apply_cancellation(
        &self,
        stripe_subscription_id: &str,
        cancellation: &Cancellation,
    ) -> Result<u64, AppError>;

    async fn find(&self, stripe_subscription_id: &str)
        -> Result<Option<SubscriptionRecord>, AppError>;
}

/// Postgres-backed subscription storage
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert_if_absent(&self, sub: &NewSubscription) -> Result<InsertOutcome, AppError> {
        // The unique constraint makes redelivered events a no-op
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                supabase_user_id, stripe_subscription_id, stripe_customer_id, status,
                price_id, price, product_name, current_period_start, current_period_end,
                cancel_at_period_end, canceled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false, NULL)
            ON CONFLICT (stripe_subscription_id) DO NOTHING
            "#,
        )
        .bind(&sub.supabase_user_id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_customer_id)
        .bind(&sub.status)
        .bind(&sub.price_id)
        .bind(sub.price)
        .bind(&sub.product_name)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::info!(
                "Subscription {} already stored, skipping insert",
                sub.stripe_subscription_id
            );
            return Ok(InsertOutcome::Duplicate);
        }

        tracing::debug!("Stored subscription {}", sub.stripe_subscription_id);
        Ok(InsertOutcome::Inserted)
    }

    async fn apply_cancellation(
        &self,
        stripe_subscription_id: &str,
        cancellation: &Cancellation,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET cancel_at_period_end = $2,
                canceled_at = $3,
                status = $4,
                updated_at = now()
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(cancellation.cancel_at_period_end)
        .bind(cancellation.canceled_at)
        .bind(&cancellation.status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                "No subscription row found to cancel: stripe_subscription_id={}",
                stripe_subscription_id
            );
        }

        Ok(result.rows_affected())
    }

    async fn find(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT stripe_subscription_id, supabase_user_id, stripe_customer_id, status,
                   price_id, price, product_name, current_period_start, current_period_end,
                   cancel_at_period_end, canceled_at
            FROM subscriptions
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

/// In-memory store that counts every call. Used by tests and local runs
/// without a database.
#[derive(Default)]
pub struct FakeSubscriptionStore {
    records: Mutex<HashMap<String, SubscriptionRecord>>,
    calls: AtomicU64,
    fail_writes: AtomicBool,
}

impl FakeSubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, record: SubscriptionRecord) {
        self.records
            .lock()
            .await
            .insert(record.stripe_subscription_id.clone(), record);
    }

    /// Every subsequent write fails with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of trait calls made so far (reads and writes).
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn get(&self, stripe_subscription_id: &str) -> Option<SubscriptionRecord> {
        self.records
            .lock()
            .await
            .get(stripe_subscription_id)
            .cloned()
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for FakeSubscriptionStore {
    async fn insert_if_absent(&self, sub: &NewSubscription) -> Result<InsertOutcome, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut records = self.records.lock().await;
        if records.contains_key(&sub.stripe_subscription_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        records.insert(
            sub.stripe_subscription_id.clone(),
            sub.clone().into_record(),
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn apply_cancellation(
        &self,
        stripe_subscription_id: &str,
        cancellation: &Cancellation,
    ) -> Result<u64, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut records = self.records.lock().await;
        match records.get_mut(stripe_subscription_id) {
            Some(record) => {
                record.cancel_at_period_end = cancellation.cancel_at_period_end;
                record.canceled_at = cancellation.canceled_at;
                record.status = cancellation.status.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(stripe_subscription_id).await)
    }
}
