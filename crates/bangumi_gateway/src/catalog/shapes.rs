//! Projection of upstream catalog payloads into the shapes the browser client reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ImageSet;

const SUMMARY_PREVIEW_CHARS: usize = 200;

/// `/search/subject/{q}` response
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamSearch {
    #[serde(default)]
    pub list: Option<Vec<UpstreamSubject>>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamRating {
    #[serde(default)]
    pub score: Option<f64>,
}

/// Subject fields shared by search items and `/v0/subjects/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamSubject {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_cn: Option<String>,
    #[serde(default)]
    pub images: Option<ImageSet>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<u32>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub rating: Option<UpstreamRating>,
    #[serde(default)]
    pub total_episodes: Option<u64>,
    #[serde(default)]
    pub eps: Option<u64>,
    #[serde(default)]
    pub air_date: Option<String>,
    /// `/v0/subjects` names the first air date `date`
    #[serde(default)]
    pub date: Option<String>,
}

impl UpstreamSubject {
    fn image(&self) -> Option<String> {
        self.images.as_ref().and_then(ImageSet::best)
    }

    fn summary(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.is_empty())
    }

    /// First air date, preferring `air_date` over `date`
    fn first_aired(&self) -> Option<&str> {
        self.air_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.date.as_deref().filter(|d| !d.is_empty()))
    }
}

#[derive(Debug, Serialize)]
pub struct SearchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_cn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub desc: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_date: Option<String>,
}

impl From<UpstreamSubject> for SearchItem {
    fn from(subject: UpstreamSubject) -> Self {
        let desc = match subject.summary() {
            Some(summary) => {
                let preview: String = summary.chars().take(SUMMARY_PREVIEW_CHARS).collect();
                format!("{}...", preview)
            }
            None => "No description".to_string(),
        };
        let image = subject.image();
        let air_date = subject.first_aired().map(str::to_string);
        let score = subject
            .score
            .or_else(|| subject.rating.as_ref().and_then(|r| r.score));

        Self {
            id: subject.id,
            name: subject.name,
            name_cn: subject.name_cn,
            image,
            desc,
            kind: subject.kind,
            score,
            total_episodes: subject.total_episodes,
            air_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchItem>,
    pub total: u64,
    pub page: u64,
}

impl From<UpstreamSearch> for SearchResults {
    fn from(search: UpstreamSearch) -> Self {
        Self {
            results: search
                .list
                .unwrap_or_default()
                .into_iter()
                .map(SearchItem::from)
                .collect(),
            total: search.total.unwrap_or(0),
            page: search.page.filter(|p| *p > 0).unwrap_or(1),
        }
    }
}

/// Detail view of an anime subject
#[derive(Debug, Serialize)]
pub struct AnimeDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_cn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub description: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    pub total_episodes: u64,
    pub status: AiringStatus,
    pub rating: f64,
    pub overview: String,
    pub characters: Vec<Value>,
    pub episodes: Vec<Value>,
}

impl AnimeDetail {
    pub fn from_subject(subject: UpstreamSubject, now: DateTime<Utc>) -> Self {
        let status = AiringStatus::derive(&subject, now);
        let image = subject.image();
        let summary = subject.summary().map(str::to_string);

        Self {
            id: subject.id,
            name: subject.name,
            name_cn: subject.name_cn,
            image,
            description: summary.clone().unwrap_or_else(|| "No description".to_string()),
            kind: subject.kind,
            total_episodes: subject.total_episodes.unwrap_or(0),
            status,
            rating: subject.rating.and_then(|r| r.score).unwrap_or(0.0),
            overview: summary.unwrap_or_default(),
            characters: Vec::new(),
            episodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AiringStatus {
    #[serde(rename = "Not yet aired")]
    NotYetAired,
    Finished,
    Airing,
    Unknown,
}

impl AiringStatus {
    fn derive(subject: &UpstreamSubject, now: DateTime<Utc>) -> Self {
        let Some(air_date) = subject.first_aired() else {
            return AiringStatus::Unknown;
        };

        let starts_later = NaiveDate::parse_from_str(air_date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|start| start.and_utc() > now)
            .unwrap_or(false);
        if starts_later {
            return AiringStatus::NotYetAired;
        }

        match (subject.total_episodes, subject.eps) {
            (Some(total), Some(eps)) if total > 0 && eps > 0 && eps >= total => AiringStatus::Finished,
            _ => AiringStatus::Airing,
        }
    }
}
