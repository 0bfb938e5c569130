// src/ai/mod.rs
//! Conversion of analysis function payloads into typed insights.
//!
//! The functions relay LLM output, so bodies are parsed leniently: code fences
//! and `<think>` blocks are stripped, field names are accepted in camel or
//! snake case, and entries that cannot be turned into a reviewable insight are
//! dropped rather than failing the whole batch.

pub mod fallback;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::storage::{InsightCategory, InsightContent, InsightSource, StrategicInsight};

const DEFAULT_CONFIDENCE: u8 = 70;

lazy_static! {
    static ref THINK_BLOCK: Regex = Regex::new(r"(?s)<think>.*?</think>").unwrap();
    static ref CODE_BLOCK: Regex = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap();
}

/// Strip model chatter around a JSON body and return the outermost object or
/// array.
pub fn clean_llm_response(response: &str) -> String {
    let without_think = THINK_BLOCK.replace_all(response.trim(), "").to_string();

    let cleaned = match CODE_BLOCK.captures(&without_think).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => without_think,
    };

    let object = cleaned.find('{').zip(cleaned.rfind('}'));
    let array = cleaned.find('[').zip(cleaned.rfind(']'));
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };

    match span {
        Some((start, end)) if end > start => cleaned[start..=end].to_string(),
        _ => cleaned.trim().to_string(),
    }
}

/// Parse a function response body, tolerating LLM-style wrapping.
pub fn parse_response_body(body: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str(&clean_llm_response(body)),
    }
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| value.get(*name))
        .filter(|v| !v.is_null())
}

fn text_field(value: &Value, names: &[&str]) -> Option<String> {
    field(value, names)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// A string, or a list of strings and numbers, as a list.
fn list_field(value: &Value, names: &[&str]) -> Vec<String> {
    match field(value, names) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(_) => text_field(item, &["title", "text", "value", "url"]),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Stable id for an insight that arrived without one.
///
/// Derived from source, category and the normalized title, so a re-run
/// reproduces the id of the same finding and a different finding never
/// reuses it.
pub fn generated_insight_id(source: InsightSource, category: InsightCategory, title: &str) -> String {
    let normalized = title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let key = format!("{}/{}/{}", source, category, normalized);
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).simple().to_string();
    format!("{}-{}-{}", source, category, &digest[..12])
}

/// Confidence as an integer percentage. Fractions in (0, 1] are read as
/// ratios.
pub fn normalize_confidence(raw: Option<&Value>) -> u8 {
    let Some(number) = raw.and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
    else {
        return DEFAULT_CONFIDENCE;
    };
    let percent = if number > 0.0 && number <= 1.0 {
        number * 100.0
    } else {
        number
    };
    percent.round().clamp(0.0, 100.0) as u8
}

fn content_from(value: &Value) -> InsightContent {
    // Template fields are either nested under `content` or inline.
    let body = field(value, &["content"]).filter(|c| c.is_object()).unwrap_or(value);

    let title = text_field(body, &["title", "headline"])
        .or_else(|| text_field(value, &["title"]))
        .unwrap_or_default();

    InsightContent {
        title,
        summary: text_field(body, &["summary", "description"]),
        details: text_field(body, &["details", "analysis"]),
        evidence: list_field(body, &["evidence"]),
        impact: text_field(body, &["impact"]),
        recommendations: list_field(body, &["recommendations", "recommendation"]),
        data_points: list_field(body, &["dataPoints", "data_points"]),
        sources: list_field(body, &["sources", "sourceReferences", "source_references"]),
    }
}

fn collect_candidates<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_candidates(item, out);
            }
        }
        Value::Object(_) => match field(value, &["insights"]) {
            // Per-document result wrapping its own list
            Some(nested) if nested.is_array() => collect_candidates(nested, out),
            _ => out.push(value),
        },
        _ => {}
    }
}

/// Convert insight-like JSON entries into [`StrategicInsight`]s tagged with
/// `source`.
///
/// Entries without a known category or without a title/summary are skipped.
/// Missing ids come from [`generated_insight_id`].
pub fn insights_from_value(value: &Value, source: InsightSource) -> Vec<StrategicInsight> {
    let mut candidates = Vec::new();
    collect_candidates(value, &mut candidates);

    let mut insights = Vec::new();

    for candidate in candidates {
        let Some(category) = text_field(candidate, &["category", "type"])
            .as_deref()
            .and_then(InsightCategory::parse)
        else {
            debug!("Skipping insight without a known category: {}", candidate);
            continue;
        };

        let mut content = content_from(candidate);
        if content.title.is_empty() {
            match content.summary.clone() {
                Some(summary) => content.title = summary,
                None => {
                    debug!("Skipping insight without title or summary");
                    continue;
                }
            }
        }

        let id = text_field(candidate, &["id"])
            .or_else(|| field(candidate, &["id"]).and_then(Value::as_u64).map(|n| n.to_string()))
            .unwrap_or_else(|| generated_insight_id(source, category, &content.title));

        let confidence = normalize_confidence(field(candidate, &["confidence", "confidenceScore"]));
        let needs_review = field(candidate, &["needsReview", "needs_review"])
            .and_then(Value::as_bool)
            .unwrap_or(confidence < DEFAULT_CONFIDENCE);

        insights.push(StrategicInsight {
            id,
            category,
            source,
            confidence,
            needs_review,
            content,
        });
    }

    insights
}
