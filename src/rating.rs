use std::collections::HashMap;

use crate::models::{AggregatedRating, ProjectWithFeedback};

/// Computes the mean rating of every evaluation criterion of a project.
///
/// Returns exactly one entry per criterion, in the project's declared criteria
/// order. Criteria without any rating get `0.0`. Ratings that reference a
/// criterion the project does not declare are ignored.
///
/// Each bucket is summed in ascending value order, so the result is identical
/// for any submission order of feedback or ratings.
pub fn compute_aggregates(project: &ProjectWithFeedback) -> Vec<AggregatedRating> {
    let mut buckets: HashMap<&str, Vec<f64>> = HashMap::new();

    for feedback in &project.feedbacks {
        for entry in &feedback.ratings {
            buckets
                .entry(entry.criteria_id.as_str())
                .or_default()
                .push(entry.rating);
        }
    }

    project
        .evaluation_criteria
        .iter()
        .map(|criterion| AggregatedRating {
            criteria_id: criterion.id.clone(),
            title: criterion.name.clone(),
            rating: buckets
                .get_mut(criterion.id.as_str())
                .map(|values| mean(values))
                .unwrap_or(0.0),
        })
        .collect()
}

fn mean(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    values.iter().sum::<f64>() / values.len() as f64
}
