//! Media models for the gallery service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Visibility tier of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Built,
    Unbuilt,
    Secret,
    Unlisted,
    Hidden,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Built,
        Category::Unbuilt,
        Category::Secret,
        Category::Unlisted,
        Category::Hidden,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Built => "built",
            Category::Unbuilt => "unbuilt",
            Category::Secret => "secret",
            Category::Unlisted => "unlisted",
            Category::Hidden => "hidden",
        }
    }

    /// Only secret items require a matching access token to be read.
    pub fn is_gated(&self) -> bool {
        matches!(self, Category::Secret)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// Media item record, without the file bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub project_id: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Present only while the item is shared
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn is_shared(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Raw file content of a media item
#[derive(Debug, Clone, PartialEq)]
pub struct MediaData {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Payload for creating a media item
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub project_id: Option<String>,
    pub data: MediaData,
}

/// Editable descriptive fields of a media item
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Store-level listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFilter {
    pub category: Option<Category>,
    pub project_id: Option<String>,
    pub title: Option<String>,
}

impl MediaFilter {
    pub fn by_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &MediaItem) -> bool {
        self.category.is_none_or(|c| c == item.category)
            && self
                .project_id
                .as_deref()
                .is_none_or(|p| item.project_id.as_deref() == Some(p))
            && self.title.as_deref().is_none_or(|t| item.title == t)
    }
}

/// Query parameters for media listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    /// Filter by category
    pub category: Option<Category>,
    /// Filter by project
    pub project_id: Option<String>,
    /// Filter by exact title
    pub title: Option<String>,
    /// Token used to unlock secret items
    pub access_token: Option<String>,
}

impl MediaQuery {
    pub fn filter(&self) -> MediaFilter {
        MediaFilter {
            category: self.category,
            project_id: self.project_id.clone().filter(|p| !p.is_empty()),
            title: self.title.clone().filter(|t| !t.is_empty()),
        }
    }
}

/// Query parameters carrying an optional access token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessQuery {
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: Category, project_id: Option<&str>, title: &str) -> MediaItem {
        MediaItem {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            category,
            project_id: project_id.map(str::to_string),
            filename: "plan.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 3,
            access_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_category_parses_lowercase_labels() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert!("Secret".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Unlisted).unwrap();
        assert_eq!(json, "\"unlisted\"");
    }

    #[test]
    fn test_only_secret_is_gated() {
        let gated: Vec<_> = Category::ALL.into_iter().filter(Category::is_gated).collect();
        assert_eq!(gated, vec![Category::Secret]);
    }

    #[test]
    fn test_filter_matches_all_fields() {
        let villa = item(Category::Secret, Some("p1"), "Villa");

        assert!(MediaFilter::default().matches(&villa));
        assert!(MediaFilter::by_project("p1").matches(&villa));
        assert!(!MediaFilter::by_project("p2").matches(&villa));

        let filter = MediaFilter {
            category: Some(Category::Built),
            ..MediaFilter::default()
        };
        assert!(!filter.matches(&villa));

        let filter = MediaFilter {
            title: Some("Villa".to_string()),
            ..MediaFilter::default()
        };
        assert!(filter.matches(&villa));
    }

    #[test]
    fn test_query_drops_empty_filters() {
        let query = MediaQuery {
            project_id: Some(String::new()),
            title: Some(String::new()),
            ..MediaQuery::default()
        };
        assert_eq!(query.filter(), MediaFilter::default());
    }
}
