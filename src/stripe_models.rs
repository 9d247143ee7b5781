use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::AppError;

/// Event type that creates the local subscription record.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Metadata key carrying the application's user id on checkout sessions.
pub const USER_ID_METADATA_KEY: &str = "supabase_user_id";

/// Stripe webhook event envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Event ID (evt_...)
    pub id: String,

    /// Event type (e.g., "checkout.session.completed")
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation
    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub livemode: bool,

    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object the event is about; shape depends on `type`
    pub object: Value,
}

impl StripeEvent {
    /// Interpret the event object as a checkout session
    pub fn checkout_session(&self) -> Result<CheckoutSession, AppError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            AppError::Validation(format!(
                "Event {} does not carry a checkout session: {}",
                self.id, e
            ))
        })
    }
}

/// Either a bare object id or the expanded object
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

/// Objects that can appear expanded in place of their id
pub trait StripeObject {
    fn object_id(&self) -> &str;
}

impl<T: StripeObject> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(object) => object.object_id(),
        }
    }

    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    pub id: String,

    /// Raw customer data
    #[serde(flatten)]
    pub raw: Value,
}

impl StripeObject for StripeCustomer {
    fn object_id(&self) -> &str {
        &self.id
    }
}

/// Checkout session (cs_...)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,

    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub customer: Option<Expandable<StripeCustomer>>,

    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,

    /// Stripe sends `null` or an object of string values
    #[serde(default, deserialize_with = "nullable_metadata")]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(|c| c.id())
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.id())
    }

    /// User id the checkout was created for, ignoring blank values
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

fn nullable_metadata<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<HashMap<String, String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Generic Stripe list wrapper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Price {
    pub id: String,
    pub product: Expandable<Product>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
}

impl StripeObject for Product {
    fn object_id(&self) -> &str {
        &self.id
    }
}

/// Subscription (sub_...)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    pub id: String,

    pub status: String,

    #[serde(default)]
    pub customer: Option<Expandable<StripeCustomer>>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub canceled_at: Option<i64>,

    #[serde(default)]
    pub start_date: Option<i64>,

    /// Present on API versions before period fields moved onto items
    #[serde(default)]
    pub current_period_start: Option<i64>,

    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,

    #[serde(default)]
    pub plan: Option<Plan>,
}

impl StripeObject for StripeSubscription {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Plan {
    #[serde(default)]
    pub nickname: Option<String>,
}

impl StripeSubscription {
    /// Current billing period, read from the first subscription item and
    /// falling back to the top-level fields
    pub fn billing_period(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first_item = self.items.as_ref().and_then(|items| items.data.first());

        let start = first_item
            .and_then(|item| item.current_period_start)
            .or(self.current_period_start)?;
        let end = first_item
            .and_then(|item| item.current_period_end)
            .or(self.current_period_end)?;

        Some((unix_to_utc(start)?, unix_to_utc(end)?))
    }

    pub fn canceled_at_utc(&self) -> Option<DateTime<Utc>> {
        self.canceled_at.and_then(unix_to_utc)
    }
}

/// Error envelope returned by the Stripe API on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

pub fn unix_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_completed_event() {
        let json = r#"
        {
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1735689600,
            "livemode": false,
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "object": "checkout.session",
                    "mode": "subscription",
                    "customer": "cus_1",
                    "subscription": "sub_123",
                    "metadata": {"supabase_user_id": "user-1"}
                }
            }
        }
        "#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, CHECKOUT_SESSION_COMPLETED);

        let session = event.checkout_session().unwrap();
        assert_eq!(session.customer_id(), Some("cus_1"));
        assert_eq!(session.subscription_id(), Some("sub_123"));
        assert_eq!(session.user_id(), Some("user-1"));
    }

    #[test]
    fn test_expanded_customer_and_null_metadata() {
        let json = r#"
        {
            "id": "cs_test_2",
            "customer": {"id": "cus_9", "email": "a@b.co"},
            "subscription": null,
            "metadata": null
        }
        "#;

        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.customer_id(), Some("cus_9"));
        assert_eq!(session.subscription_id(), None);
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn test_billing_period_prefers_items() {
        let json = r#"
        {
            "id": "sub_1",
            "status": "active",
            "current_period_start": 100,
            "current_period_end": 200,
            "items": {"data": [{"id": "si_1", "current_period_start": 1700000000, "current_period_end": 1702592000}]}
        }
        "#;

        let sub: StripeSubscription = serde_json::from_str(json).unwrap();
        let (start, end) = sub.billing_period().unwrap();
        assert_eq!(start.timestamp(), 1_700_000_000);
        assert_eq!(end.timestamp(), 1_702_592_000);
    }

    #[test]
    fn test_billing_period_falls_back_to_top_level() {
        let json = r#"{"id": "sub_1", "status": "active", "current_period_start": 100, "current_period_end": 200}"#;

        let sub: StripeSubscription = serde_json::from_str(json).unwrap();
        let (start, end) = sub.billing_period().unwrap();
        assert_eq!(start.timestamp(), 100);
        assert_eq!(end.timestamp(), 200);
    }
}
