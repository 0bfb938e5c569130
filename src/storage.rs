// src/storage.rs
//! Domain records shared by the repositories, services and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub client_name: String,
    #[serde(default)]
    pub client_industry: Option<String>,
    #[serde(default)]
    pub client_website: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn industry_or_default(&self) -> &str {
        self.client_industry
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("general")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    pub client_name: String,
    #[serde(default)]
    pub client_industry: Option<String>,
    #[serde(default)]
    pub client_website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub project_id: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub priority: u8,
    pub storage_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    BusinessChallenges,
    AudienceGaps,
    CompetitiveThreats,
    GamingOpportunities,
    StrategicRecommendations,
    KeyNarratives,
}

impl InsightCategory {
    pub const ALL: [InsightCategory; 6] = [
        InsightCategory::BusinessChallenges,
        InsightCategory::AudienceGaps,
        InsightCategory::CompetitiveThreats,
        InsightCategory::GamingOpportunities,
        InsightCategory::StrategicRecommendations,
        InsightCategory::KeyNarratives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::BusinessChallenges => "business_challenges",
            InsightCategory::AudienceGaps => "audience_gaps",
            InsightCategory::CompetitiveThreats => "competitive_threats",
            InsightCategory::GamingOpportunities => "gaming_opportunities",
            InsightCategory::StrategicRecommendations => "strategic_recommendations",
            InsightCategory::KeyNarratives => "key_narratives",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InsightCategory::BusinessChallenges => "Business Challenges",
            InsightCategory::AudienceGaps => "Audience Gaps",
            InsightCategory::CompetitiveThreats => "Competitive Threats",
            InsightCategory::GamingOpportunities => "Gaming Opportunities",
            InsightCategory::StrategicRecommendations => "Strategic Recommendations",
            InsightCategory::KeyNarratives => "Key Narratives",
        }
    }

    /// Lenient parse for model output: accepts snake case, display names and
    /// camel case.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        InsightCategory::ALL
            .into_iter()
            .find(|c| c.as_str().replace('_', "") == normalized)
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Document,
    Website,
}

impl InsightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightSource::Document => "document",
            InsightSource::Website => "website",
        }
    }
}

impl fmt::Display for InsightSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template fields an analysis may fill in. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightContent {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategicInsight {
    pub id: String,
    pub category: InsightCategory,
    pub source: InsightSource,
    pub confidence: u8,
    #[serde(default)]
    pub needs_review: bool,
    pub content: InsightContent,
}

impl StrategicInsight {
    pub fn title(&self) -> &str {
        &self.content.title
    }
}

/// The single persisted record holding a project's insight collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    pub project_id: String,
    pub insights: Vec<StrategicInsight>,
    pub generation_timestamp: DateTime<Utc>,
    #[serde(alias = "usingFallbackInsights", default)]
    pub using_fallback_data: bool,
    pub timestamp: DateTime<Utc>,
}

impl InsightRecord {
    pub fn empty(project_id: &str) -> Self {
        let now = Utc::now();
        InsightRecord {
            project_id: project_id.to_string(),
            insights: Vec::new(),
            generation_timestamp: now,
            using_fallback_data: false,
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// Insight id to review decision.
pub type ReviewTable = BTreeMap<String, ReviewStatus>;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn new_temp_id() -> String {
    format!("temp-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_lenient() {
        assert_eq!(InsightCategory::parse("audience_gaps"), Some(InsightCategory::AudienceGaps));
        assert_eq!(InsightCategory::parse("Key Narratives"), Some(InsightCategory::KeyNarratives));
        assert_eq!(
            InsightCategory::parse("competitiveThreats"),
            Some(InsightCategory::CompetitiveThreats)
        );
        assert_eq!(InsightCategory::parse("weather"), None);
    }

    #[test]
    fn record_reads_legacy_fallback_flag() {
        let json = r#"{
            "projectId": "p1",
            "insights": [],
            "generationTimestamp": "2024-05-01T10:00:00Z",
            "usingFallbackInsights": true,
            "timestamp": "2024-05-01T10:00:00Z"
        }"#;
        let record: InsightRecord = serde_json::from_str(json).unwrap();
        assert!(record.using_fallback_data);
    }

    #[test]
    fn insight_serializes_camel_case() {
        let insight = StrategicInsight {
            id: "i1".into(),
            category: InsightCategory::GamingOpportunities,
            source: InsightSource::Website,
            confidence: 72,
            needs_review: true,
            content: InsightContent {
                title: "Launch a creator program".into(),
                data_points: vec!["40% of players stream".into()],
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["category"], "gaming_opportunities");
        assert_eq!(value["source"], "website");
        assert_eq!(value["needsReview"], true);
        assert_eq!(value["content"]["dataPoints"][0], "40% of players stream");
        assert!(value["content"].get("summary").is_none());
    }
}
