// src/services/upload.rs
//! Upload intake: batch validation, filename priority scoring and the
//! cosmetic per-file progress shown while files are being stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{InsightError, InsightResult};
use crate::storage::new_temp_id;

/// Filename keywords that suggest a business-relevant document.
const PRIORITY_KEYWORDS: [&str; 20] = [
    "strategy",
    "strategic",
    "executive",
    "summary",
    "roadmap",
    "plan",
    "business",
    "marketing",
    "brand",
    "audience",
    "competitor",
    "competitive",
    "research",
    "insight",
    "analysis",
    "report",
    "goals",
    "objectives",
    "market",
    "overview",
];

const POINTS_PER_KEYWORD: u32 = 2;
pub const MAX_PRIORITY: u8 = 10;

/// Display priority for a document, from keyword matches in its filename.
///
/// Only used to order documents; it does not influence analysis.
pub fn document_priority(filename: &str) -> u8 {
    let name = filename.to_lowercase();
    let matches = PRIORITY_KEYWORDS
        .iter()
        .filter(|keyword| name.contains(*keyword))
        .count() as u32;
    (matches * POINTS_PER_KEYWORD).min(u32::from(MAX_PRIORITY)) as u8
}

pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
    pub max_files: usize,
}

#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AcceptedFile {
    pub temp_id: String,
    pub file: CandidateFile,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub accepted: Vec<AcceptedFile>,
    pub rejected: Vec<RejectedFile>,
}

impl UploadPolicy {
    fn check_file(&self, file: &CandidateFile) -> Result<(), String> {
        let ext = file_extension(&file.name)
            .ok_or_else(|| format!("{} has no file extension", file.name))?;
        if !self
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            return Err(format!(
                "File type .{} is not supported. Allowed types: {}",
                ext,
                self.allowed_extensions.join(", ")
            ));
        }
        if file.size > self.max_file_size {
            return Err(format!(
                "File is too large ({} bytes, limit {} bytes)",
                file.size, self.max_file_size
            ));
        }
        Ok(())
    }

    /// Validate a batch against the policy.
    ///
    /// The whole batch is refused when it would push the project past
    /// `max_files`. Otherwise each file is checked on its own and lands in
    /// either `accepted` or `rejected`.
    pub fn validate_batch(
        &self,
        files: Vec<CandidateFile>,
        current_count: usize,
    ) -> InsightResult<ValidatedBatch> {
        if current_count + files.len() > self.max_files {
            return Err(InsightError::Validation(format!(
                "You can upload at most {} files per project ({} already uploaded, {} selected)",
                self.max_files,
                current_count,
                files.len()
            )));
        }

        let mut batch = ValidatedBatch::default();
        for file in files {
            match self.check_file(&file) {
                Ok(()) => batch.accepted.push(AcceptedFile {
                    temp_id: new_temp_id(),
                    file,
                    progress: 0,
                }),
                Err(reason) => batch.rejected.push(RejectedFile {
                    name: file.name,
                    reason,
                }),
            }
        }
        Ok(batch)
    }
}

/// Per-file upload percentages for display.
///
/// These numbers are cosmetic: they advance on a timer and have no relation
/// to bytes actually transferred. Never use them to decide whether an upload
/// finished.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    entries: BTreeMap<String, u8>,
    step: u8,
}

impl UploadProgress {
    pub fn new<I: IntoIterator<Item = String>>(ids: I, step: u8) -> Self {
        Self {
            entries: ids.into_iter().map(|id| (id, 0)).collect(),
            step: step.max(1),
        }
    }

    /// Advance every entry by one step. Returns true once all reached 100.
    pub fn tick(&mut self) -> bool {
        for value in self.entries.values_mut() {
            *value = value.saturating_add(self.step).min(100);
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.values().all(|v| *v >= 100)
    }

    pub fn get(&self, id: &str) -> Option<u8> {
        self.entries.get(id).copied()
    }

    pub fn entries(&self) -> &BTreeMap<String, u8> {
        &self.entries
    }
}

/// Drive an [`UploadProgress`] to 100 on a fixed interval, reporting each tick.
pub async fn simulate_upload_progress<F>(mut progress: UploadProgress, interval: Duration, mut on_tick: F)
where
    F: FnMut(&UploadProgress),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    while !progress.is_complete() {
        ticker.tick().await;
        progress.tick();
        on_tick(&progress);
    }
}
