// src/services/review.rs
//! Review workflow: accept/reject decisions and the aggregates derived from
//! them.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{InsightError, InsightResult};
use crate::repository::{InsightRepository, RepositoryManager, ReviewRepository};
use crate::storage::{InsightCategory, ReviewStatus, ReviewTable, StrategicInsight};

/// Add a pending entry for every insight the table has not seen yet.
///
/// Existing decisions are kept, including ones for insights that no longer
/// exist. Returns whether anything was added.
pub fn sync_review_table(table: &mut ReviewTable, insights: &[StrategicInsight]) -> bool {
    let mut changed = false;
    for insight in insights {
        if !table.contains_key(&insight.id) {
            table.insert(insight.id.clone(), ReviewStatus::Pending);
            changed = true;
        }
    }
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Not explicitly accepted or rejected
    pub pending: usize,
    /// Rounded mean confidence of accepted insights, 0 when none
    pub overall_confidence: u8,
}

pub fn aggregate(insights: &[StrategicInsight], table: &ReviewTable) -> ReviewStats {
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut confidence_sum = 0u64;

    for insight in insights {
        match table.get(&insight.id).copied().unwrap_or_default() {
            ReviewStatus::Accepted => {
                accepted += 1;
                confidence_sum += u64::from(insight.confidence);
            }
            ReviewStatus::Rejected => rejected += 1,
            ReviewStatus::Pending => {}
        }
    }

    let overall_confidence = if accepted == 0 {
        0
    } else {
        let n = accepted as u64;
        ((confidence_sum * 2 + n) / (2 * n)) as u8
    };

    ReviewStats {
        total: insights.len(),
        accepted,
        rejected,
        pending: insights.len() - accepted - rejected,
        overall_confidence,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSection {
    pub category: InsightCategory,
    pub heading: String,
    pub insights: Vec<StrategicInsight>,
}

/// Accepted insights grouped by category, highest confidence first. Empty
/// categories are left out.
pub fn presentation_outline(
    insights: &[StrategicInsight],
    table: &ReviewTable,
) -> Vec<PresentationSection> {
    InsightCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let mut accepted: Vec<StrategicInsight> = insights
                .iter()
                .filter(|i| i.category == category)
                .filter(|i| table.get(&i.id) == Some(&ReviewStatus::Accepted))
                .cloned()
                .collect();
            if accepted.is_empty() {
                return None;
            }
            accepted.sort_by(|a, b| b.confidence.cmp(&a.confidence));
            Some(PresentationSection {
                category,
                heading: category.display_name().to_string(),
                insights: accepted,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    pub statuses: ReviewTable,
    pub stats: ReviewStats,
    pub using_fallback_data: bool,
}

pub struct ReviewService<R: RepositoryManager> {
    repos: Arc<R>,
}

impl<R: RepositoryManager> ReviewService<R> {
    pub fn new(repos: Arc<R>) -> Self {
        Self { repos }
    }

    async fn load(&self, project_id: &str) -> InsightResult<(Vec<StrategicInsight>, bool, ReviewTable)> {
        let (insights, using_fallback) = match self.repos.insights().get(project_id).await? {
            Some(record) => (record.insights, record.using_fallback_data),
            None => (Vec::new(), false),
        };
        let mut table = self.repos.reviews().get(project_id).await?;
        if sync_review_table(&mut table, &insights) {
            self.repos.reviews().set(project_id, table.clone()).await?;
        }
        Ok((insights, using_fallback, table))
    }

    pub async fn snapshot(&self, project_id: &str) -> InsightResult<ReviewSnapshot> {
        let (insights, using_fallback_data, table) = self.load(project_id).await?;
        let stats = aggregate(&insights, &table);
        Ok(ReviewSnapshot {
            statuses: table,
            stats,
            using_fallback_data,
        })
    }

    /// Record a decision. Setting the same status twice is a no-op.
    pub async fn set_status(
        &self,
        project_id: &str,
        insight_id: &str,
        status: ReviewStatus,
    ) -> InsightResult<ReviewStats> {
        let (insights, _, mut table) = self.load(project_id).await?;
        if !insights.iter().any(|i| i.id == insight_id) {
            return Err(InsightError::Validation(format!(
                "unknown insight {} in project {}",
                insight_id, project_id
            )));
        }

        table.insert(insight_id.to_string(), status);
        self.repos.reviews().set(project_id, table.clone()).await?;
        Ok(aggregate(&insights, &table))
    }

    pub async fn outline(&self, project_id: &str) -> InsightResult<Vec<PresentationSection>> {
        let (insights, _, table) = self.load(project_id).await?;
        Ok(presentation_outline(&insights, &table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InsightContent, InsightSource};

    fn insight(id: &str, category: InsightCategory, confidence: u8) -> StrategicInsight {
        StrategicInsight {
            id: id.into(),
            category,
            source: InsightSource::Document,
            confidence,
            needs_review: false,
            content: InsightContent {
                title: id.to_uppercase(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn confidence_is_zero_without_accepted_insights() {
        let insights = vec![insight("a", InsightCategory::AudienceGaps, 90)];
        let stats = aggregate(&insights, &ReviewTable::new());
        assert_eq!(stats.overall_confidence, 0);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn confidence_averages_accepted_only() {
        let insights = vec![
            insight("a", InsightCategory::AudienceGaps, 80),
            insight("b", InsightCategory::AudienceGaps, 60),
            insight("c", InsightCategory::AudienceGaps, 10),
        ];
        let mut table = ReviewTable::new();
        table.insert("a".into(), ReviewStatus::Accepted);
        table.insert("b".into(), ReviewStatus::Accepted);
        table.insert("c".into(), ReviewStatus::Rejected);

        let stats = aggregate(&insights, &table);
        assert_eq!(stats.overall_confidence, 70);
        assert_eq!((stats.accepted, stats.rejected, stats.pending), (2, 1, 0));
    }

    #[test]
    fn confidence_rounds_half_up() {
        let insights = vec![
            insight("a", InsightCategory::AudienceGaps, 80),
            insight("b", InsightCategory::AudienceGaps, 75),
        ];
        let mut table = ReviewTable::new();
        table.insert("a".into(), ReviewStatus::Accepted);
        table.insert("b".into(), ReviewStatus::Accepted);
        assert_eq!(aggregate(&insights, &table).overall_confidence, 78);
    }

    #[test]
    fn sync_preserves_choices_and_keeps_stale_entries() {
        let mut table = ReviewTable::new();
        table.insert("gone".into(), ReviewStatus::Rejected);
        table.insert("a".into(), ReviewStatus::Accepted);

        let insights = vec![
            insight("a", InsightCategory::KeyNarratives, 50),
            insight("b", InsightCategory::KeyNarratives, 50),
        ];
        assert!(sync_review_table(&mut table, &insights));
        assert!(!sync_review_table(&mut table, &insights));

        assert_eq!(table["a"], ReviewStatus::Accepted);
        assert_eq!(table["b"], ReviewStatus::Pending);
        assert_eq!(table["gone"], ReviewStatus::Rejected);
    }

    #[test]
    fn outline_groups_accepted_by_category_order() {
        let insights = vec![
            insight("n", InsightCategory::KeyNarratives, 60),
            insight("b1", InsightCategory::BusinessChallenges, 40),
            insight("b2", InsightCategory::BusinessChallenges, 90),
            insight("r", InsightCategory::AudienceGaps, 99),
        ];
        let mut table = ReviewTable::new();
        for id in ["n", "b1", "b2"] {
            table.insert(id.into(), ReviewStatus::Accepted);
        }
        table.insert("r".into(), ReviewStatus::Rejected);

        let outline = presentation_outline(&insights, &table);
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].category, InsightCategory::BusinessChallenges);
        assert_eq!(outline[0].insights[0].id, "b2");
        assert_eq!(outline[1].heading, "Key Narratives");
    }
}
