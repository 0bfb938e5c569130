// src/services/insights.rs
//! Insight persistence and merge.
//!
//! A project's insights live in one [`InsightRecord`]. Incoming batches are
//! merged by id. Website batches supersede every earlier website insight, while
//! document batches accumulate with duplicate-title suppression.

use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ai::fallback::FALLBACK_SOURCE_NOTE;
use crate::error::InsightResult;
use crate::repository::{InsightRepository, RepositoryManager};
use crate::storage::{InsightRecord, InsightSource, StrategicInsight};

/// Merge `incoming` into `existing` keyed by id.
///
/// A same-source id collision overwrites the stored insight in place. A
/// cross-source collision renames the incoming id with a `_<source>` suffix
/// so neither insight is lost.
pub fn merge_insights(
    existing: Vec<StrategicInsight>,
    incoming: Vec<StrategicInsight>,
) -> Vec<StrategicInsight> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(pos, insight)| (insight.id.clone(), pos))
        .collect();

    for mut insight in incoming {
        loop {
            match index.get(&insight.id) {
                None => {
                    index.insert(insight.id.clone(), merged.len());
                    merged.push(insight);
                    break;
                }
                Some(&pos) if merged[pos].source == insight.source => {
                    merged[pos] = insight;
                    break;
                }
                Some(_) => {
                    debug!(
                        "Insight id {} already used by another source, renaming",
                        insight.id
                    );
                    insight.id = format!("{}_{}", insight.id, insight.source);
                }
            }
        }
    }

    merged
}

fn title_key(insight: &StrategicInsight) -> String {
    insight.title().trim().to_lowercase()
}

/// Drop incoming insights whose title already exists, either in the stored
/// collection or earlier in the same batch. Untitled insights are kept.
pub fn without_duplicate_titles(
    existing: &[StrategicInsight],
    incoming: Vec<StrategicInsight>,
) -> Vec<StrategicInsight> {
    let mut seen: HashSet<String> = existing
        .iter()
        .map(title_key)
        .filter(|t| !t.is_empty())
        .collect();

    incoming
        .into_iter()
        .filter(|insight| {
            let key = title_key(insight);
            key.is_empty() || seen.insert(key)
        })
        .collect()
}

pub struct InsightStore<R: RepositoryManager> {
    repos: Arc<R>,
}

impl<R: RepositoryManager> InsightStore<R> {
    pub fn new(repos: Arc<R>) -> Self {
        Self { repos }
    }

    /// Stored record for a project, or an empty one.
    pub async fn load(&self, project_id: &str) -> InsightResult<InsightRecord> {
        Ok(self
            .repos
            .insights()
            .get(project_id)
            .await?
            .unwrap_or_else(|| InsightRecord::empty(project_id)))
    }

    pub async fn persist(
        &self,
        project_id: &str,
        insights: Vec<StrategicInsight>,
        using_fallback: bool,
        replace_existing: bool,
    ) -> InsightResult<InsightRecord> {
        if replace_existing {
            let mut record = InsightRecord::empty(project_id);
            record.insights = insights;
            record.using_fallback_data = using_fallback;
            self.repos.insights().set(record.clone()).await?;
            return Ok(record);
        }

        self.repos
            .insights()
            .merge(project_id, insights, using_fallback)
            .await
    }

    /// Replace every stored website insight with `insights`.
    pub async fn store_website_batch(
        &self,
        project_id: &str,
        insights: Vec<StrategicInsight>,
        using_fallback: bool,
    ) -> InsightResult<InsightRecord> {
        let existing = self.load(project_id).await?.insights;
        let before = existing.len();
        let kept: Vec<StrategicInsight> = existing
            .into_iter()
            .filter(|i| i.source != InsightSource::Website)
            .collect();
        info!(
            "Replacing {} website insights with {} new ones for project {}",
            before - kept.len(),
            insights.len(),
            project_id
        );

        let merged = merge_insights(kept, insights);
        self.persist(project_id, merged, using_fallback, true).await
    }

    /// Add document insights, skipping titles that are already present.
    pub async fn store_document_batch(
        &self,
        project_id: &str,
        insights: Vec<StrategicInsight>,
        using_fallback: bool,
    ) -> InsightResult<InsightRecord> {
        let existing = self.load(project_id).await?.insights;
        let received = insights.len();
        let fresh = without_duplicate_titles(&existing, insights);
        if fresh.len() < received {
            info!(
                "Suppressed {} duplicate document insights for project {}",
                received - fresh.len(),
                project_id
            );
        }
        self.persist(project_id, fresh, using_fallback, false).await
    }

    pub async fn store_batch(
        &self,
        project_id: &str,
        source: InsightSource,
        insights: Vec<StrategicInsight>,
        using_fallback: bool,
    ) -> InsightResult<InsightRecord> {
        match source {
            InsightSource::Website => {
                self.store_website_batch(project_id, insights, using_fallback)
                    .await
            }
            InsightSource::Document => {
                self.store_document_batch(project_id, insights, using_fallback)
                    .await
            }
        }
    }

    /// Drop sample insights of `source` left by earlier fallback runs. Returns
    /// how many were removed.
    ///
    /// The stored fallback flag only describes the latest write, so it is
    /// cleared even when another source still holds fallback insights.
    pub async fn discard_fallback_insights(
        &self,
        project_id: &str,
        source: InsightSource,
    ) -> InsightResult<usize> {
        let record = self.load(project_id).await?;
        let before = record.insights.len();
        let kept: Vec<StrategicInsight> = record
            .insights
            .into_iter()
            .filter(|i| {
                i.source != source || !i.content.sources.iter().any(|s| s == FALLBACK_SOURCE_NOTE)
            })
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.persist(project_id, kept, false, true).await?;
            info!("Discarded {} fallback insights for project {}", removed, project_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepositoryManager;
    use crate::storage::{InsightCategory, InsightContent};

    fn insight(id: &str, source: InsightSource, title: &str) -> StrategicInsight {
        StrategicInsight {
            id: id.into(),
            category: InsightCategory::BusinessChallenges,
            source,
            confidence: 75,
            needs_review: false,
            content: InsightContent {
                title: title.into(),
                ..Default::default()
            },
        }
    }

    fn store() -> InsightStore<MemoryRepositoryManager> {
        InsightStore::new(Arc::new(MemoryRepositoryManager::new()))
    }

    #[test]
    fn cross_source_collision_keeps_both() {
        let existing = vec![insight("x", InsightSource::Document, "Doc")];
        let merged = merge_insights(existing, vec![insight("x", InsightSource::Website, "Web")]);

        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "x_website"]);
    }

    #[test]
    fn same_source_collision_overwrites_in_place() {
        let existing = vec![
            insight("a", InsightSource::Document, "Old"),
            insight("b", InsightSource::Document, "B"),
        ];
        let merged = merge_insights(existing, vec![insight("a", InsightSource::Document, "New")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title(), "New");
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let existing = vec![insight("x", InsightSource::Document, "Doc")];
        let batch = vec![
            insight("x", InsightSource::Website, "Web"),
            insight("y", InsightSource::Website, "Other"),
        ];
        let once = merge_insights(existing, batch.clone());
        let twice = merge_insights(once.clone(), batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn renamed_id_never_overwrites_a_third_source_entry() {
        let existing = vec![
            insight("x", InsightSource::Document, "Doc x"),
            insight("x_website", InsightSource::Document, "Doc x_website"),
        ];
        let merged = merge_insights(existing, vec![insight("x", InsightSource::Website, "Web")]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].id, "x_website_website");
    }

    #[test]
    fn duplicate_titles_are_suppressed_case_insensitively() {
        let existing = vec![insight("a", InsightSource::Document, "Rising churn")];
        let fresh = without_duplicate_titles(
            &existing,
            vec![
                insight("b", InsightSource::Document, " rising CHURN "),
                insight("c", InsightSource::Document, "New market"),
                insight("d", InsightSource::Document, "New market"),
            ],
        );
        let ids: Vec<&str> = fresh.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn website_batch_replaces_previous_website_insights() {
        let store = store();
        store
            .persist(
                "p1",
                vec![
                    insight("d1", InsightSource::Document, "D1"),
                    insight("d2", InsightSource::Document, "D2"),
                    insight("w1", InsightSource::Website, "W1"),
                    insight("w2", InsightSource::Website, "W2"),
                    insight("w3", InsightSource::Website, "W3"),
                ],
                false,
                true,
            )
            .await
            .unwrap();

        let record = store
            .store_website_batch(
                "p1",
                vec![
                    insight("n1", InsightSource::Website, "N1"),
                    insight("n2", InsightSource::Website, "N2"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(record.insights.len(), 2 + 2);
        assert!(record
            .insights
            .iter()
            .all(|i| !i.id.starts_with('w')));
    }

    #[tokio::test]
    async fn document_batches_accumulate() {
        let store = store();
        store
            .store_document_batch("p1", vec![insight("a", InsightSource::Document, "A")], false)
            .await
            .unwrap();
        let record = store
            .store_document_batch(
                "p1",
                vec![
                    insight("b", InsightSource::Document, "B"),
                    insight("c", InsightSource::Document, "A"),
                ],
                true,
            )
            .await
            .unwrap();

        let ids: Vec<&str> = record.insights.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(record.using_fallback_data);
    }

    #[tokio::test]
    async fn replace_existing_overwrites_everything() {
        let store = store();
        store
            .persist("p1", vec![insight("a", InsightSource::Document, "A")], false, false)
            .await
            .unwrap();
        let record = store
            .persist("p1", vec![insight("z", InsightSource::Website, "Z")], true, true)
            .await
            .unwrap();
        assert_eq!(record.insights.len(), 1);
        assert_eq!(record.insights[0].id, "z");
    }

    #[tokio::test]
    async fn discarding_fallback_keeps_real_insights() {
        let store = store();
        let mut batch = crate::ai::fallback::fallback_insights("Retail", InsightSource::Document);
        batch.push(insight("real", InsightSource::Document, "Real finding"));
        store.store_document_batch("p1", batch, true).await.unwrap();

        let removed = store.discard_fallback_insights("p1", InsightSource::Document).await.unwrap();
        let record = store.load("p1").await.unwrap();
        assert!(removed >= 12);
        assert_eq!(record.insights.len(), 1);
        assert_eq!(record.insights[0].id, "real");
        assert!(!record.using_fallback_data);
        assert_eq!(store.discard_fallback_insights("p1", InsightSource::Document).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discarding_document_fallback_keeps_website_fallback() {
        let store = store();
        let documents = crate::ai::fallback::fallback_insights("Retail", InsightSource::Document);
        let website = crate::ai::fallback::fallback_insights("Retail", InsightSource::Website);
        let website_count = website.len();
        store.store_document_batch("p1", documents, true).await.unwrap();
        store
            .store_batch("p1", InsightSource::Website, website, true)
            .await
            .unwrap();

        store
            .discard_fallback_insights("p1", InsightSource::Document)
            .await
            .unwrap();
        let record = store.load("p1").await.unwrap();
        assert_eq!(record.insights.len(), website_count);
        assert!(record.insights.iter().all(|i| i.source == InsightSource::Website));
    }
}
