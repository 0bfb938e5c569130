// src/services/dispatcher.rs
//! Analysis dispatch and the per-run progress driver.
//!
//! The dispatcher never fails: any problem with the remote call turns into a
//! fallback batch plus the error that caused it. Failures of the run itself
//! (hard timeout, persistence) are reported by [`drive_run`].

use log::{info, warn};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use super::progress::{next_simulated_progress, ProgressSink};
use super::traits::{AnalysisBackend, DocumentAnalysisRequest, ProgressReport, WebsiteAnalysisRequest};
use crate::ai::{fallback::fallback_insights, insights_from_value};
use crate::config::{AiConfig, AnalysisConfig};
use crate::error::{InsightError, InsightResult};
use crate::storage::{InsightSource, StrategicInsight};

/// Result of one dispatch.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub source: InsightSource,
    pub insights: Vec<StrategicInsight>,
    pub using_fallback: bool,
    /// Why fallback data was used, if it was.
    pub error: Option<InsightError>,
}

pub struct AnalysisDispatcher {
    backend: Arc<dyn AnalysisBackend>,
    ai: AiConfig,
    analysis: AnalysisConfig,
}

impl AnalysisDispatcher {
    pub fn new(backend: Arc<dyn AnalysisBackend>, ai: AiConfig, analysis: AnalysisConfig) -> Self {
        Self {
            backend,
            ai,
            analysis,
        }
    }

    pub fn backend(&self) -> Arc<dyn AnalysisBackend> {
        self.backend.clone()
    }

    /// Whether dispatches will reach the remote functions at all.
    pub fn remote_enabled(&self) -> bool {
        self.ai.is_configured()
    }

    fn fallback(&self, industry: &str, source: InsightSource, error: InsightError) -> AnalysisOutcome {
        warn!(
            "Using fallback {} insights for industry '{}': {}",
            source, industry, error
        );
        AnalysisOutcome {
            source,
            insights: fallback_insights(industry, source),
            using_fallback: true,
            error: Some(error),
        }
    }

    fn key_error(&self) -> InsightError {
        InsightError::Config(format!(
            "AI API key is missing or invalid (expected prefix {} and at least {} characters)",
            self.ai.key_prefix, self.ai.min_key_length
        ))
    }

    fn accept(
        &self,
        industry: &str,
        source: InsightSource,
        result: Result<InsightResult<Vec<StrategicInsight>>, time::error::Elapsed>,
        limit: Duration,
    ) -> AnalysisOutcome {
        match result {
            Ok(Ok(insights)) if !insights.is_empty() => {
                info!("Received {} {} insights", insights.len(), source);
                AnalysisOutcome {
                    source,
                    insights,
                    using_fallback: false,
                    error: None,
                }
            }
            Ok(Ok(_)) => self.fallback(
                industry,
                source,
                InsightError::Analysis("analysis returned no insights".to_string()),
            ),
            Ok(Err(e)) => self.fallback(industry, source, e),
            Err(_) => self.fallback(industry, source, InsightError::Timeout(limit)),
        }
    }

    pub async fn dispatch_documents(&self, request: &DocumentAnalysisRequest) -> AnalysisOutcome {
        let source = InsightSource::Document;
        if !self.ai.is_configured() {
            return self.fallback(&request.industry, source, self.key_error());
        }

        info!(
            "Analyzing {} documents for project {}",
            request.document_ids.len(),
            request.project_id
        );
        let limit = self.analysis.document_timeout();
        let result = time::timeout(limit, async {
            let body = self.backend.analyze_documents(request).await?;
            document_insights(&body)
        })
        .await;
        self.accept(&request.industry, source, result, limit)
    }

    pub async fn dispatch_website(&self, request: &WebsiteAnalysisRequest) -> AnalysisOutcome {
        let source = InsightSource::Website;
        if !self.ai.is_configured() {
            return self.fallback(&request.client_industry, source, self.key_error());
        }

        info!("Analyzing website {} (up to {} pages)", request.website_url, request.max_pages);
        let limit = self.analysis.website_timeout();
        let result = time::timeout(limit, async {
            let body = self.backend.analyze_website(request).await?;
            check_error_field(&body)?;
            Ok(insights_from_value(
                body.get("insights").unwrap_or(&Value::Null),
                source,
            ))
        })
        .await;
        self.accept(&request.client_industry, source, result, limit)
    }
}

fn check_error_field(body: &Value) -> InsightResult<()> {
    match body.get("error") {
        Some(Value::String(message)) => Err(InsightError::Analysis(message.clone())),
        Some(Value::Object(details)) => Err(InsightError::Analysis(
            details
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("analysis function reported an error")
                .to_string(),
        )),
        _ => Ok(()),
    }
}

/// Insights from a document analysis response: `analysisResults`, then
/// `insights`, then a bare array.
fn document_insights(body: &Value) -> InsightResult<Vec<StrategicInsight>> {
    check_error_field(body)?;
    let payload = body
        .get("analysisResults")
        .or_else(|| body.get("insights"))
        .unwrap_or(body);
    Ok(insights_from_value(payload, InsightSource::Document))
}

/// Timer settings for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunTimings {
    pub simulation_interval: Duration,
    pub poll_interval: Duration,
    pub hard_timeout: Duration,
}

impl From<&AnalysisConfig> for RunTimings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            simulation_interval: config.simulation_interval(),
            poll_interval: config.poll_interval(),
            hard_timeout: config.hard_timeout(),
        }
    }
}

/// Remote status source for website runs.
pub struct ProgressPoller {
    pub backend: Arc<dyn AnalysisBackend>,
    pub request: WebsiteAnalysisRequest,
}

type PollFuture<'a> = Pin<Box<dyn Future<Output = InsightResult<ProgressReport>> + Send + 'a>>;

/// Drive `work` to completion while feeding `sink`.
///
/// Progress comes from `poller` when it reports a value and from the
/// simulated curve otherwise. A polled value of 100 moves the sink to
/// finalizing. If `work` has not finished within the hard timeout it is
/// dropped and [`InsightError::Timeout`] is returned. Every timer is
/// dropped when this returns.
///
/// The sink is left active; the caller decides between completing and
/// failing it.
pub async fn drive_run<T, F>(
    sink: &ProgressSink,
    work: F,
    poller: Option<&ProgressPoller>,
    timings: RunTimings,
) -> InsightResult<T>
where
    F: Future<Output = InsightResult<T>>,
{
    tokio::pin!(work);
    let deadline = time::sleep(timings.hard_timeout);
    tokio::pin!(deadline);

    let mut simulation = time::interval(timings.simulation_interval);
    simulation.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polling = time::interval(timings.poll_interval);
    polling.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: Option<PollFuture<'_>> = None;
    let mut remote_reporting = false;

    loop {
        tokio::select! {
            result = &mut work => return result,
            _ = &mut deadline => {
                warn!("Analysis hit the hard timeout of {}s", timings.hard_timeout.as_secs());
                return Err(InsightError::Timeout(timings.hard_timeout));
            }
            _ = simulation.tick(), if !remote_reporting => {
                let current = sink.current().progress;
                sink.advance(next_simulated_progress(current));
            }
            _ = polling.tick(), if poller.is_some() && in_flight.is_none() => {
                if let Some(p) = poller {
                    in_flight = Some(p.backend.website_progress(&p.request));
                }
            }
            report = async {
                match in_flight.as_mut() {
                    Some(check) => check.await,
                    None => std::future::pending().await,
                }
            }, if in_flight.is_some() => {
                in_flight = None;
                match report.map(|r| r.percent()) {
                    Ok(Some(percent)) => {
                        remote_reporting = true;
                        if percent >= 100 {
                            sink.finalize("Finalizing analysis");
                        } else {
                            sink.advance(percent);
                        }
                    }
                    Ok(None) => remote_reporting = false,
                    Err(e) => {
                        warn!("Progress check failed: {}", e);
                        remote_reporting = false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::progress::ProcessingState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend double with scripted responses.
    struct ScriptedBackend {
        documents: Mutex<Option<InsightResult<Value>>>,
        website_delay: Duration,
        progress: Vec<Option<f64>>,
        polls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn documents(response: InsightResult<Value>) -> Self {
            Self {
                documents: Mutex::new(Some(response)),
                website_delay: Duration::ZERO,
                progress: Vec::new(),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisBackend for ScriptedBackend {
        async fn analyze_documents(&self, _request: &DocumentAnalysisRequest) -> InsightResult<Value> {
            self.documents
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(json!({})))
        }

        async fn analyze_website(&self, _request: &WebsiteAnalysisRequest) -> InsightResult<Value> {
            time::sleep(self.website_delay).await;
            Ok(json!({"insights": [{"category": "audience_gaps", "title": "Site speaks to parents"}]}))
        }

        async fn website_progress(&self, _request: &WebsiteAnalysisRequest) -> InsightResult<ProgressReport> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(ProgressReport {
                progress: self.progress.get(n).copied().flatten(),
                status: None,
            })
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn configured_ai() -> AiConfig {
        AiConfig {
            api_key: format!("sk-ant-{}", "k".repeat(40)),
            ..AiConfig::default()
        }
    }

    fn document_request() -> DocumentAnalysisRequest {
        DocumentAnalysisRequest {
            project_id: "p1".into(),
            document_ids: vec!["d1".into()],
            industry: "Gaming".into(),
            client_name: "Acme".into(),
            processing_mode: "standard".into(),
        }
    }

    fn website_request() -> WebsiteAnalysisRequest {
        WebsiteAnalysisRequest {
            project_id: "p1".into(),
            website_url: "https://acme.test".into(),
            client_name: "Acme".into(),
            client_industry: "Gaming".into(),
            max_pages: 5,
            timeout_seconds: 70,
            check_progress: false,
            test_mode: false,
            debug_mode: false,
        }
    }

    fn dispatcher(backend: ScriptedBackend, ai: AiConfig) -> AnalysisDispatcher {
        AnalysisDispatcher::new(Arc::new(backend), ai, AnalysisConfig::default())
    }

    #[tokio::test]
    async fn successful_document_analysis() {
        let body = json!({"analysisResults": [{"insights": [
            {"id": "x1", "category": "business_challenges", "title": "Churn", "confidence": 80}
        ]}]});
        let outcome = dispatcher(ScriptedBackend::documents(Ok(body)), configured_ai())
            .dispatch_documents(&document_request())
            .await;
        assert!(!outcome.using_fallback);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.insights[0].id, "x1");
    }

    #[tokio::test]
    async fn error_field_triggers_retriable_fallback() {
        let body = json!({"error": "model overloaded"});
        let outcome = dispatcher(ScriptedBackend::documents(Ok(body)), configured_ai())
            .dispatch_documents(&document_request())
            .await;
        assert!(outcome.using_fallback);
        assert!(!outcome.insights.is_empty());
        assert!(outcome.insights.iter().all(|i| i.needs_review));
        assert!(outcome.error.unwrap().is_retriable());
    }

    #[tokio::test]
    async fn empty_result_triggers_fallback() {
        let outcome = dispatcher(ScriptedBackend::documents(Ok(json!({"insights": []}))), configured_ai())
            .dispatch_documents(&document_request())
            .await;
        assert!(outcome.using_fallback);
        assert!(matches!(outcome.error, Some(InsightError::Analysis(_))));
    }

    #[tokio::test]
    async fn missing_key_skips_remote_call() {
        let backend = ScriptedBackend::documents(Err(InsightError::Analysis("must not be called".into())));
        let outcome = dispatcher(backend, AiConfig::default())
            .dispatch_documents(&document_request())
            .await;
        let error = outcome.error.unwrap();
        assert!(matches!(error, InsightError::Config(_)));
        assert!(!error.is_retriable());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_website_call_times_out_into_fallback() {
        let backend = ScriptedBackend {
            website_delay: Duration::from_secs(300),
            ..ScriptedBackend::documents(Ok(json!({})))
        };
        let outcome = dispatcher(backend, configured_ai())
            .dispatch_website(&website_request())
            .await;
        assert!(outcome.using_fallback);
        assert!(matches!(outcome.error, Some(InsightError::Timeout(_))));
        assert!(outcome.insights.iter().all(|i| i.source == InsightSource::Website));
    }

    fn timings() -> RunTimings {
        RunTimings {
            simulation_interval: Duration::from_millis(800),
            poll_interval: Duration::from_secs(3),
            hard_timeout: Duration::from_secs(90),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_advances_until_work_finishes() {
        let sink = ProgressSink::new(InsightSource::Document);
        sink.start();
        let result = drive_run(
            &sink,
            async {
                time::sleep(Duration::from_secs(10)).await;
                Ok::<_, InsightError>(7)
            },
            None,
            timings(),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        let status = sink.current();
        assert_eq!(status.status, ProcessingState::Processing);
        assert!(status.progress > 0 && status.progress <= 95);
    }

    #[tokio::test(start_paused = true)]
    async fn hard_timeout_drops_work() {
        let sink = ProgressSink::new(InsightSource::Document);
        sink.start();
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        let result = drive_run(
            &sink,
            async move {
                time::sleep(Duration::from_secs(600)).await;
                flag.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InsightError>(())
            },
            None,
            timings(),
        )
        .await;
        assert!(matches!(result, Err(InsightError::Timeout(_))));
        time::sleep(Duration::from_secs(1000)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polled_completion_moves_to_finalizing() {
        let backend = ScriptedBackend {
            progress: vec![Some(20.0), None, Some(100.0)],
            ..ScriptedBackend::documents(Ok(json!({})))
        };
        let poller = ProgressPoller {
            backend: Arc::new(backend),
            request: website_request(),
        };
        let sink = ProgressSink::new(InsightSource::Website);
        sink.start();
        drive_run(
            &sink,
            async {
                time::sleep(Duration::from_secs(20)).await;
                Ok::<_, InsightError>(())
            },
            Some(&poller),
            timings(),
        )
        .await
        .unwrap();

        let status = sink.current();
        assert_eq!(status.status, ProcessingState::Finalizing);
        assert_eq!(status.progress, 95);
    }
}
