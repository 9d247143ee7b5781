use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::AppError;

pub const PROJECT_TYPES: &[&str] = &["design", "demo", "plan"];
pub const EVALUATION_TYPES: &[&str] = &[
    "uiDesignEvaluation",
    "uxDesignEvaluation",
    "demoEvaluation",
    "planEvaluation",
    "customEvaluation",
];
pub const VISIBILITY_TYPES: &[&str] = &["public", "unlisted", "private"];

const CUSTOM_EVALUATION: &str = "customEvaluation";

/// Project creation form. Missing fields deserialize empty and fail validation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateProjectForm {
    #[validate(length(
        min = 2,
        max = 50,
        message = "Project title must be between 2 and 50 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 10,
        max = 500,
        message = "Project description must be between 10 and 500 characters"
    ))]
    pub description: String,

    #[validate(custom(function = validate_project_type))]
    pub project_type: String,

    #[validate(custom(function = validate_deadline))]
    pub deadline: String,

    #[validate(url(message = "Resource must be a valid URL"))]
    pub resource_url: String,

    #[validate(custom(function = validate_evaluation_type))]
    pub evaluation_type: String,

    #[validate(custom(function = validate_visibility_type))]
    pub visibility_type: String,

    pub email_notifications: Option<bool>,

    pub app_notifications: Option<bool>,
}

/// One custom evaluation criterion entered on the update form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CriterionInput {
    #[validate(length(min = 1, message = "Criterion name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Criterion description is required"))]
    pub description: String,
}

/// Project edit form. The description is required but unbounded here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProjectForm {
    #[validate(length(
        min = 2,
        max = 50,
        message = "Project title must be between 2 and 50 characters"
    ))]
    pub title: String,

    #[validate(length(min = 1, message = "Project description is required"))]
    pub description: String,

    #[validate(custom(function = validate_project_type))]
    pub project_type: String,

    #[validate(custom(function = validate_deadline))]
    pub deadline: String,

    #[validate(url(message = "Resource must be a valid URL"))]
    pub resource_url: String,

    #[validate(custom(function = validate_evaluation_type))]
    pub evaluation_type: String,

    #[validate(
        length(
            min = 1,
            max = 3,
            message = "Between 1 and 3 evaluation criteria are allowed"
        ),
        nested
    )]
    pub criteria_template: Option<Vec<CriterionInput>>,

    #[validate(custom(function = validate_visibility_type))]
    pub visibility_type: String,

    pub email_notifications: Option<bool>,

    pub app_notifications: Option<bool>,
}

impl CreateProjectForm {
    pub fn check(&self) -> Result<(), AppError> {
        self.validate().map_err(AppError::from)
    }
}

impl UpdateProjectForm {
    /// Field rules plus: a custom evaluation needs at least one criterion.
    pub fn check(&self) -> Result<(), AppError> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let has_criteria = self
            .criteria_template
            .as_ref()
            .map(|c| !c.is_empty())
            .unwrap_or(false);
        if self.evaluation_type == CUSTOM_EVALUATION && !has_criteria {
            errors.add(
                "criteria_template",
                error_with(
                    "custom_criteria_required",
                    "Custom evaluation needs at least one criterion",
                ),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

fn error_with(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn one_of(value: &str, allowed: &[&str], message: &'static str) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(error_with("one_of", message))
    }
}

fn validate_project_type(value: &str) -> Result<(), ValidationError> {
    one_of(value, PROJECT_TYPES, "Project type is required")
}

fn validate_evaluation_type(value: &str) -> Result<(), ValidationError> {
    one_of(value, EVALUATION_TYPES, "Evaluation template is required")
}

fn validate_visibility_type(value: &str) -> Result<(), ValidationError> {
    one_of(value, VISIBILITY_TYPES, "Visibility is required")
}

fn validate_deadline(value: &str) -> Result<(), ValidationError> {
    validate_deadline_on(value, Utc::now().date_naive()).map(|_| ())
}

fn deadline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})/(\d{2})/(\d{2})$").expect("valid deadline pattern"))
}

/// Parses a `YYYY/MM/DD` deadline that must not lie before `today`.
pub fn validate_deadline_on(value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '/') {
        return Err(error_with(
            "deadline_charset",
            "Dates may only contain digits and slashes",
        ));
    }

    let caps = deadline_regex().captures(value).ok_or_else(|| {
        error_with("deadline_format", "Dates must use the YYYY/MM/DD format")
    })?;

    let part = |i: usize| caps[i].parse::<u32>().unwrap_or_default();
    let date = NaiveDate::from_ymd_opt(part(1) as i32, part(2), part(3))
        .ok_or_else(|| error_with("deadline_invalid", "Enter a real calendar date"))?;

    if date < today {
        return Err(error_with(
            "deadline_past",
            "The deadline must be today or later",
        ));
    }
    Ok(date)
}
