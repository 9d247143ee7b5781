use serde::Serialize;
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::{Cancellation, InsertOutcome, NewSubscription};
use crate::stripe_client::PaymentsProvider;
use crate::stripe_models::{CheckoutSession, StripeEvent, CHECKOUT_SESSION_COMPLETED};
use crate::subscription_store::SubscriptionStore;

/// What happened to one verified webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// A new subscription record was stored.
    Inserted,
    /// The subscription was already stored by an earlier delivery.
    Duplicate,
    /// The event lacked correlation data and was dropped.
    Skipped,
    /// The event type needs no action.
    Ignored,
}

/// Keeps the local `subscriptions` table in step with the payments provider.
///
/// Each call is an independent unit of work. Failures abort the remaining
/// steps and are reported to the caller; recovery relies on the provider
/// redelivering the event.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    provider: Arc<dyn PaymentsProvider>,
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionReconciler {
    pub fn new(provider: Arc<dyn PaymentsProvider>, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> &Arc<dyn PaymentsProvider> {
        &self.provider
    }

    /// Dispatches a verified event.
    pub async fn handle_event(&self, event: &StripeEvent) -> Result<EventOutcome, AppError> {
        match event.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session = match event.checkout_session() {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::warn!("Skipping event {}: {}", event.id, e);
                        return Ok(EventOutcome::Skipped);
                    }
                };
                self.reconcile_checkout(&session).await
            }
            other => {
                tracing::info!("Unhandled event type {} ({})", other, event.id);
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Creates the subscription record for a completed checkout.
    ///
    /// Flow:
    /// 1. Require the user id metadata and a subscription id (skip otherwise).
    /// 2. Short-circuit when the subscription is already stored.
    /// 3. Fetch the first line item, its product and the subscription.
    /// 4. Insert, tolerating a concurrent insert of the same id.
    pub async fn reconcile_checkout(
        &self,
        session: &CheckoutSession,
    ) -> Result<EventOutcome, AppError> {
        let Some(user_id) = session.user_id() else {
            tracing::warn!(
                "Checkout session {} has no supabase_user_id metadata, skipping",
                session.id
            );
            return Ok(EventOutcome::Skipped);
        };

        let Some(subscription_id) = session.subscription_id() else {
            tracing::warn!(
                "Checkout session {} has no subscription, skipping",
                session.id
            );
            return Ok(EventOutcome::Skipped);
        };

        if self.store.find(subscription_id).await?.is_some() {
            tracing::info!(
                "Subscription {} already reconciled, acknowledging redelivery",
                subscription_id
            );
            return Ok(EventOutcome::Duplicate);
        }

        let line_items = self.provider.list_line_items(&session.id, 1).await?;
        let price = line_items
            .into_iter()
            .next()
            .and_then(|item| item.price)
            .ok_or_else(|| {
                AppError::Upstream(format!(
                    "Checkout session {} has no priced line item",
                    session.id
                ))
            })?;

        let product_name = match price.product.as_object() {
            Some(product) => product.name.clone(),
            None => self.provider.retrieve_product(price.product.id()).await?.name,
        };

        let subscription = self.provider.retrieve_subscription(subscription_id).await?;
        let (period_start, period_end) = subscription.billing_period().ok_or_else(|| {
            AppError::Upstream(format!(
                "Subscription {} has no current billing period",
                subscription_id
            ))
        })?;

        let record = NewSubscription {
            stripe_subscription_id: subscription_id.to_string(),
            supabase_user_id: user_id.to_string(),
            stripe_customer_id: session.customer_id().map(str::to_string),
            status: subscription.status.clone(),
            price_id: Some(price.id.clone()),
            price: price.unit_amount,
            product_name: Some(product_name),
            current_period_start: period_start,
            current_period_end: period_end,
        };

        let outcome = self.store.insert_if_absent(&record).await?;
        tracing::info!(
            "Reconciled checkout {} -> subscription {} ({:?})",
            session.id,
            subscription_id,
            outcome
        );

        Ok(match outcome {
            InsertOutcome::Inserted => EventOutcome::Inserted,
            InsertOutcome::Duplicate => EventOutcome::Duplicate,
        })
    }

    /// Schedules cancellation at period end and mirrors the provider's answer.
    ///
    /// The provider is called first; if it fails, nothing is written.
    pub async fn cancel(&self, subscription_id: &str) -> Result<Cancellation, AppError> {
        let subscription_id = subscription_id.trim();
        if subscription_id.is_empty() {
            return Err(AppError::Validation("subscriptionId is required".to_string()));
        }

        let canceled = self.provider.schedule_cancellation(subscription_id).await?;

        let cancellation = Cancellation {
            status: canceled.status.clone(),
            cancel_at_period_end: true,
            canceled_at: canceled.canceled_at_utc(),
        };

        let updated = self
            .store
            .apply_cancellation(subscription_id, &cancellation)
            .await?;
        if updated == 0 {
            return Err(AppError::NotFound(format!(
                "No stored subscription {}",
                subscription_id
            )));
        }

        tracing::info!(
            "Subscription {} scheduled to cancel at period end (status={})",
            subscription_id,
            cancellation.status
        );
        Ok(cancellation)
    }
}
