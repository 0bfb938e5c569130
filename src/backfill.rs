// src/backfill.rs
//! Re-run document analysis for projects whose insights are fallback data.

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::repository::{DocumentRepository, RepositoryManager};
use crate::services::progress::ProcessingState;
use crate::services::ServiceManager;
use crate::storage::InsightSource;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillStats {
    pub total_projects: usize,
    pub processed: usize,
    pub skipped: usize,
    /// Projects that now hold real analysis results
    pub recovered: usize,
    /// Projects where analysis fell back again
    pub still_fallback: usize,
    pub errors: usize,
}

pub async fn backfill_projects<R: RepositoryManager>(services: &ServiceManager<R>) -> Result<BackfillStats> {
    let projects = services
        .projects()
        .list()
        .await
        .context("Failed to list projects")?;

    let mut stats = BackfillStats {
        total_projects: projects.len(),
        ..Default::default()
    };

    info!("Starting backfill process for {} projects", stats.total_projects);

    for (index, project) in projects.into_iter().enumerate() {
        let project_id = project.id.clone();
        info!(
            "Processing project {}/{}: {}",
            index + 1,
            stats.total_projects,
            project.title
        );

        let record = match services.insights().load(&project_id).await {
            Ok(record) => record,
            Err(e) => {
                error!("[{}] Failed to load insights: {}", project_id, e);
                stats.errors += 1;
                continue;
            }
        };

        if !record.using_fallback_data {
            info!("[{}] Insights are not fallback data, skipping", project_id);
            stats.skipped += 1;
            continue;
        }

        let documents = services
            .repositories()
            .documents()
            .list_by_project(&project_id)
            .await
            .with_context(|| format!("Failed to list documents of project {}", project_id))?;
        if documents.is_empty() {
            warn!("[{}] No documents to analyze, skipping", project_id);
            stats.skipped += 1;
            continue;
        }

        match services.analysis().run(&project_id, InsightSource::Document).await {
            Ok(report) if report.status.status == ProcessingState::Error => {
                error!(
                    "[{}] Analysis failed: {}",
                    project_id,
                    report.error.unwrap_or_default()
                );
                stats.errors += 1;
            }
            Ok(report) if report.using_fallback => {
                warn!(
                    "[{}] Analysis fell back again: {}",
                    project_id,
                    report.error.unwrap_or_default()
                );
                stats.still_fallback += 1;
            }
            Ok(_) => {
                match services
                    .insights()
                    .discard_fallback_insights(&project_id, InsightSource::Document)
                    .await
                {
                    Ok(removed) => {
                        info!("[{}] Replaced {} fallback insights", project_id, removed);
                        stats.recovered += 1;
                    }
                    Err(e) => {
                        error!("[{}] Failed to discard fallback insights: {}", project_id, e);
                        stats.errors += 1;
                    }
                }
            }
            Err(e) => {
                error!("[{}] Could not start analysis: {}", project_id, e);
                stats.errors += 1;
            }
        }

        stats.processed += 1;

        if stats.processed % 10 == 0 {
            info!("Progress: {}/{} projects processed", stats.processed, stats.total_projects);
        }
    }

    info!("Backfill completed with stats:");
    info!("  Total projects: {}", stats.total_projects);
    info!("  Processed: {}", stats.processed);
    info!("  Skipped: {}", stats.skipped);
    info!("  Recovered: {}", stats.recovered);
    info!("  Still using fallback data: {}", stats.still_fallback);
    info!("  Errors encountered: {}", stats.errors);

    if stats.errors > 0 {
        warn!("Backfill completed with {} errors", stats.errors);
    } else {
        info!("Backfill completed successfully");
    }

    Ok(stats)
}
