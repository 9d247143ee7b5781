use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{
    parse_label, EvaluationCriterion, Feedback, Project, ProjectWithFeedback, RatingEntry, User,
};

/// Read access to projects and the feedback submitted for them.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn load_with_feedback(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectWithFeedback>, AppError>;
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    user_id: String,
    title: String,
    description: String,
    project_type: String,
    resource_url: String,
    deadline: Option<NaiveDate>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    visibility_type: String,
    email_notifications: bool,
    app_notifications: bool,
    status: String,
    evaluation_type: Option<String>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str, value: &str| {
            AppError::Internal(format!(
                "Project {} has unknown {} '{}'",
                row.id, field, value
            ))
        };

        Ok(Project {
            project_type: parse_label(&row.project_type)
                .ok_or_else(|| invalid("project_type", &row.project_type))?,
            visibility_type: parse_label(&row.visibility_type)
                .ok_or_else(|| invalid("visibility_type", &row.visibility_type))?,
            status: parse_label(&row.status).ok_or_else(|| invalid("status", &row.status))?,
            id: row.id.clone(),
            user_id: row.user_id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            resource_url: row.resource_url.clone(),
            deadline: row.deadline,
            created_at: row.created_at,
            updated_at: row.updated_at,
            email_notifications: row.email_notifications,
            app_notifications: row.app_notifications,
            evaluation_type: row.evaluation_type.clone(),
        })
    }
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: String,
    user_id: Option<String>,
    is_anonymous: bool,
    overall_comment: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct RatingRow {
    feedback_id: String,
    id: String,
    criteria_id: String,
    rating: f64,
    comment: Option<String>,
}

/// Postgres-backed project reads
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn load_with_feedback(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectWithFeedback>, AppError> {
        // Keys are UUIDs; anything else cannot name a project
        let Ok(project_key) = Uuid::parse_str(project_id) else {
            tracing::debug!("Project id {} is not a UUID", project_id);
            return Ok(None);
        };

        let Some(row) = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id::text, user_id::text, title, description, project_type::text,
                   resource_url, deadline::date, created_at, updated_at,
                   visibility_type::text, email_notifications, app_notifications,
                   status::text, evaluation_type
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_key)
        .fetch_optional(&self.pool)
        .await
        .context("Loading project")?
        else {
            return Ok(None);
        };
        let project = Project::try_from(row)?;

        // Creation order is the declared criteria order
        let evaluation_criteria = sqlx::query_as::<_, EvaluationCriterion>(
            r#"
            SELECT id::text, name, description, evaluation_type, template_id::text
            FROM evaluation_criteria
            WHERE project_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(project_key)
        .fetch_all(&self.pool)
        .await
        .context("Loading evaluation criteria")?;

        let feedback_rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id::text, user_id::text, is_anonymous, overall_comment, created_at
            FROM feedbacks
            WHERE project_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_key)
        .fetch_all(&self.pool)
        .await
        .context("Loading feedbacks")?;

        let rating_rows = sqlx::query_as::<_, RatingRow>(
            r#"
            SELECT fr.feedback_id::text, fr.id::text, fr.criteria_id::text,
                   fr.rating::float8 AS rating, fr.comment
            FROM feedback_ratings fr
            JOIN feedbacks f ON f.id = fr.feedback_id
            WHERE f.project_id = $1
            "#,
        )
        .bind(project_key)
        .fetch_all(&self.pool)
        .await
        .context("Loading feedback ratings")?;

        let mut ratings_by_feedback: HashMap<String, Vec<RatingEntry>> = HashMap::new();
        for row in rating_rows {
            ratings_by_feedback
                .entry(row.feedback_id)
                .or_default()
                .push(RatingEntry {
                    id: Some(row.id),
                    criteria_id: row.criteria_id,
                    rating: row.rating,
                    comment: row.comment,
                });
        }

        let feedbacks = feedback_rows
            .into_iter()
            .map(|row| Feedback {
                ratings: ratings_by_feedback.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                is_anonymous: row.is_anonymous,
                overall_comment: row.overall_comment,
                created_at: row.created_at,
            })
            .collect();

        let owner = match Uuid::parse_str(&project.user_id) {
            Ok(owner_key) => sqlx::query_as::<_, User>(
                r#"
                SELECT id::text, email, display_name, avatar_url, bio, website
                FROM profiles
                WHERE id = $1
                "#,
            )
            .bind(owner_key)
            .fetch_optional(&self.pool)
            .await
            .context("Loading project owner")?,
            Err(_) => None,
        };

        Ok(Some(ProjectWithFeedback {
            project,
            feedbacks,
            evaluation_criteria,
            owner,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_non_uuid_id_is_absent_without_querying() {
        // Lazy pool pointing nowhere: any query would fail with a connection error
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(50))
            .connect_lazy("postgresql://nobody@127.0.0.1:1/none")
            .unwrap();
        let repository = PgProjectRepository::new(pool);

        for id in ["abc123", "", "1 OR 1=1", "00000000-0000-0000-0000"] {
            assert!(repository.load_with_feedback(id).await.unwrap().is_none());
        }
    }
}
