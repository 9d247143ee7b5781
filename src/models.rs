use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::FromRow;

// ============ Project & Feedback Models ============

/// Kind of artifact a project collects feedback on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Design,
    Demo,
    Plan,
}

/// Who can open a project's feedback page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityType {
    Public,
    /// Reachable by link only. Forms submit this as `unlisted`.
    #[serde(alias = "unlisted")]
    Limited,
    Private,
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

/// A shareable artifact submitted for structured feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub project_type: ProjectType,
    pub resource_url: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub visibility_type: VisibilityType,
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub app_notifications: bool,
    pub status: ProjectStatus,
    #[serde(default)]
    pub evaluation_type: Option<String>,
}

/// Public profile of a project owner or reviewer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// One named axis a project is rated on.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_type: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

/// One numeric score for one criterion within one feedback submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub criteria_id: String,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A single reviewer's full submission for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub overall_comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ratings: Vec<RatingEntry>,
}

/// A project together with every feedback submitted for it and its criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithFeedback {
    pub project: Project,
    #[serde(default)]
    pub feedbacks: Vec<Feedback>,
    #[serde(default)]
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    #[serde(default)]
    pub owner: Option<User>,
}

/// Mean rating for one criterion. Derived on read, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRating {
    pub criteria_id: String,
    pub title: String,
    pub rating: f64,
}

// ============ Subscription Models ============

/// Local mirror of a payments-provider subscription, keyed by `stripe_subscription_id`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub stripe_subscription_id: String,
    pub supabase_user_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    /// Unit amount in the currency's minor unit.
    pub price: Option<i64>,
    pub product_name: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Row to create when a checkout completes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub stripe_subscription_id: String,
    pub supabase_user_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    pub price: Option<i64>,
    pub product_name: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

impl NewSubscription {
    /// The record as first stored: not scheduled for cancellation, never canceled.
    pub fn into_record(self) -> SubscriptionRecord {
        SubscriptionRecord {
            stripe_subscription_id: self.stripe_subscription_id,
            supabase_user_id: self.supabase_user_id,
            stripe_customer_id: self.stripe_customer_id,
            status: self.status,
            price_id: self.price_id,
            price: self.price,
            product_name: self.product_name,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            cancel_at_period_end: false,
            canceled_at: None,
        }
    }
}

/// Fields overwritten when a cancellation is scheduled with the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    pub status: String,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Result of an idempotent insert keyed by subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Parses a lowercase/snake_case label through the type's serde renames.
pub fn parse_label<T: DeserializeOwned>(label: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(label.to_string())).ok()
}
