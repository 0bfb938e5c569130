// src/services/analysis.rs
//! Analysis runs: dispatch, progress, persistence and the per-project job
//! registry the API reports status from.

use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::dispatcher::{drive_run, AnalysisDispatcher, AnalysisOutcome, ProgressPoller, RunTimings};
use super::insights::InsightStore;
use super::progress::{ProcessingState, ProcessingStatus, ProgressSink};
use super::projects::ProjectService;
use super::review::ReviewService;
use super::traits::{DocumentAnalysisRequest, WebsiteAnalysisRequest};
use crate::config::AnalysisConfig;
use crate::error::{InsightError, InsightResult};
use crate::repository::{DocumentRepository, RepositoryManager};
use crate::storage::{InsightSource, Project, ProjectStatus};

struct JobHandle {
    source: InsightSource,
    status: watch::Receiver<ProcessingStatus>,
    ready_for_review: Arc<AtomicBool>,
}

/// Status of the latest analysis run of a project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub source: Option<InsightSource>,
    #[serde(flatten)]
    pub status: ProcessingStatus,
    /// Set once the completion delay has passed.
    pub ready_for_review: bool,
}

/// Latest run per project. At most one active run per project.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl JobRegistry {
    /// Register and start `sink` for a project. Fails with `Conflict` while
    /// another run for the project is active.
    async fn register(&self, project_id: &str, sink: &ProgressSink) -> InsightResult<Arc<AtomicBool>> {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get(project_id) {
            if job.status.borrow().status.is_active() {
                return Err(InsightError::Conflict(format!(
                    "a {} analysis is already running for project {}",
                    job.source, project_id
                )));
            }
        }

        sink.start();
        let ready_for_review = Arc::new(AtomicBool::new(false));
        jobs.insert(
            project_id.to_string(),
            JobHandle {
                source: sink.source(),
                status: sink.subscribe(),
                ready_for_review: ready_for_review.clone(),
            },
        );
        Ok(ready_for_review)
    }

    pub async fn status(&self, project_id: &str) -> JobStatus {
        match self.jobs.lock().await.get(project_id) {
            Some(job) => JobStatus {
                source: Some(job.source),
                status: job.status.borrow().clone(),
                ready_for_review: job.ready_for_review.load(Ordering::SeqCst),
            },
            None => JobStatus {
                source: None,
                status: ProcessingStatus::idle(),
                ready_for_review: false,
            },
        }
    }

    pub async fn active_count(&self) -> usize {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|job| job.status.borrow().status.is_active())
            .count()
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub project_id: String,
    pub source: InsightSource,
    pub status: ProcessingStatus,
    /// Size of the stored collection after the run.
    pub insight_count: usize,
    pub using_fallback: bool,
    /// Why fallback data was used, or why the run failed.
    pub error: Option<String>,
    pub retriable: bool,
}

struct PreparedRun {
    project: Project,
    source: InsightSource,
    document_ids: Vec<String>,
    sink: Arc<ProgressSink>,
    ready_for_review: Arc<AtomicBool>,
}

struct RunResult {
    insight_count: usize,
    using_fallback: bool,
    fallback_reason: Option<InsightError>,
}

pub struct AnalysisService<R: RepositoryManager> {
    repos: Arc<R>,
    dispatcher: Arc<AnalysisDispatcher>,
    insights: Arc<InsightStore<R>>,
    reviews: Arc<ReviewService<R>>,
    projects: Arc<ProjectService<R>>,
    config: AnalysisConfig,
    jobs: Arc<JobRegistry>,
}

impl<R: RepositoryManager> Clone for AnalysisService<R> {
    fn clone(&self) -> Self {
        Self {
            repos: self.repos.clone(),
            dispatcher: self.dispatcher.clone(),
            insights: self.insights.clone(),
            reviews: self.reviews.clone(),
            projects: self.projects.clone(),
            config: self.config.clone(),
            jobs: self.jobs.clone(),
        }
    }
}

impl<R: RepositoryManager> AnalysisService<R> {
    pub fn new(
        repos: Arc<R>,
        dispatcher: Arc<AnalysisDispatcher>,
        insights: Arc<InsightStore<R>>,
        reviews: Arc<ReviewService<R>>,
        projects: Arc<ProjectService<R>>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            repos,
            dispatcher,
            insights,
            reviews,
            projects,
            config,
            jobs: Arc::new(JobRegistry::default()),
        }
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub async fn status(&self, project_id: &str) -> InsightResult<JobStatus> {
        self.projects.get(project_id).await?;
        Ok(self.jobs.status(project_id).await)
    }

    async fn prepare(&self, project_id: &str, source: InsightSource) -> InsightResult<PreparedRun> {
        let project = self.projects.get(project_id).await?;

        let document_ids = match source {
            InsightSource::Website => {
                if project.client_website.is_none() {
                    return Err(InsightError::Validation(format!(
                        "project {} has no client website",
                        project_id
                    )));
                }
                Vec::new()
            }
            InsightSource::Document => {
                let documents = self.repos.documents().list_by_project(project_id).await?;
                if documents.is_empty() {
                    return Err(InsightError::Validation(
                        "upload at least one document before running analysis".to_string(),
                    ));
                }
                documents.into_iter().map(|d| d.id).collect()
            }
        };

        let sink = ProgressSink::new(source);
        let ready_for_review = self.jobs.register(project_id, &sink).await?;
        Ok(PreparedRun {
            project,
            source,
            document_ids,
            sink: Arc::new(sink),
            ready_for_review,
        })
    }

    fn website_request(&self, project: &Project) -> WebsiteAnalysisRequest {
        WebsiteAnalysisRequest {
            project_id: project.id.clone(),
            website_url: project.client_website.clone().unwrap_or_default(),
            client_name: project.client_name.clone(),
            client_industry: project.industry_or_default().to_string(),
            max_pages: self.config.website_max_pages,
            timeout_seconds: self.config.website_timeout_secs,
            check_progress: false,
            test_mode: false,
            debug_mode: false,
        }
    }

    async fn dispatch(&self, run: &PreparedRun, website: Option<&WebsiteAnalysisRequest>) -> InsightResult<AnalysisOutcome> {
        let outcome = match website {
            Some(request) => {
                let outcome = self.dispatcher.dispatch_website(request).await;
                run.sink.finalize("Finalizing analysis");
                outcome
            }
            None => {
                let request = DocumentAnalysisRequest {
                    project_id: run.project.id.clone(),
                    document_ids: run.document_ids.clone(),
                    industry: run.project.industry_or_default().to_string(),
                    client_name: run.project.client_name.clone(),
                    processing_mode: self.config.processing_mode.clone(),
                };
                self.dispatcher.dispatch_documents(&request).await
            }
        };
        Ok(outcome)
    }

    /// Persist a finished dispatch. Runs after the hard timeout no longer
    /// applies, so a timed-out run never leaves a partial insight set.
    async fn store_outcome(&self, run: &PreparedRun, outcome: AnalysisOutcome) -> InsightResult<RunResult> {
        let project_id = run.project.id.as_str();
        let record = self
            .insights
            .store_batch(project_id, run.source, outcome.insights, outcome.using_fallback)
            .await?;
        // Loading the review snapshot brings the table in line with the new collection.
        self.reviews.snapshot(project_id).await?;
        if run.project.status == ProjectStatus::Draft {
            self.projects
                .update_status(project_id, ProjectStatus::InProgress)
                .await?;
        }

        Ok(RunResult {
            insight_count: record.insights.len(),
            using_fallback: outcome.using_fallback,
            fallback_reason: outcome.error,
        })
    }

    async fn execute(&self, run: PreparedRun) -> RunReport {
        let project_id = run.project.id.clone();
        let website = match run.source {
            InsightSource::Website => Some(self.website_request(&run.project)),
            InsightSource::Document => None,
        };
        let poller = website
            .as_ref()
            .filter(|_| self.dispatcher.remote_enabled())
            .map(|request| ProgressPoller {
                backend: self.dispatcher.backend(),
                request: request.clone(),
            });

        let result = match drive_run(
            &run.sink,
            self.dispatch(&run, website.as_ref()),
            poller.as_ref(),
            RunTimings::from(&self.config),
        )
        .await
        {
            Ok(outcome) => self.store_outcome(&run, outcome).await,
            Err(e) => Err(e),
        };

        let mut report = RunReport {
            project_id: project_id.clone(),
            source: run.source,
            status: ProcessingStatus::idle(),
            insight_count: 0,
            using_fallback: false,
            error: None,
            retriable: false,
        };

        match result {
            Ok(result) => {
                let message = if result.using_fallback {
                    "Analysis complete (using fallback data)".to_string()
                } else {
                    format!("Analysis complete: {} insights", result.insight_count)
                };
                let ready = run.ready_for_review.clone();
                let ready_project = project_id.clone();
                run.sink
                    .complete_then(&message, self.config.completion_delay(), move || {
                        ready.store(true, Ordering::SeqCst);
                        info!("Insights for project {} are ready for review", ready_project);
                    });

                report.insight_count = result.insight_count;
                report.using_fallback = result.using_fallback;
                if let Some(reason) = result.fallback_reason {
                    report.retriable = reason.is_retriable();
                    report.error = Some(reason.to_string());
                }
                info!("{} analysis for project {}: {}", run.source, project_id, message);
            }
            Err(e) => {
                error!("{} analysis for project {} failed: {}", run.source, project_id, e);
                run.sink.fail(&e.to_string());
                report.retriable = e.is_retriable();
                report.error = Some(e.to_string());
            }
        }

        report.status = run.sink.current();
        report
    }

    /// Execute on its own task so a panic inside the run still leaves the
    /// job in a terminal state instead of blocking the project.
    async fn execute_guarded(&self, run: PreparedRun) -> InsightResult<RunReport> {
        let sink = run.sink.clone();
        let project_id = run.project.id.clone();
        let service = self.clone();
        match tokio::spawn(async move { service.execute(run).await }).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Analysis task for project {} aborted: {}", project_id, e);
                sink.fail("Analysis stopped unexpectedly");
                Err(InsightError::Analysis(format!(
                    "analysis for project {} stopped unexpectedly",
                    project_id
                )))
            }
        }
    }

    /// Run an analysis to completion.
    pub async fn run(&self, project_id: &str, source: InsightSource) -> InsightResult<RunReport> {
        let run = self.prepare(project_id, source).await?;
        self.execute_guarded(run).await
    }

    /// Start an analysis in the background and return its initial status.
    pub async fn start(&self, project_id: &str, source: InsightSource) -> InsightResult<JobStatus> {
        let run = self.prepare(project_id, source).await?;
        let initial = JobStatus {
            source: Some(source),
            status: run.sink.current(),
            ready_for_review: false,
        };

        let service = self.clone();
        tokio::spawn(async move {
            match service.execute_guarded(run).await {
                Ok(report) if report.status.status == ProcessingState::Error => {
                    warn!(
                        "Background analysis for project {} ended in error",
                        report.project_id
                    );
                }
                Ok(_) | Err(_) => {}
            }
        });
        Ok(initial)
    }
}
