use serde::{Deserialize, Serialize};

pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Reason Reddit gives for a submission no longer being visible.
///
/// Parsed from the `removed_by_category` field of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemovalCategory {
    Moderator,
    Deleted,
    Author,
    AutomodFiltered,
    Reddit,
    Other(String),
}

impl RemovalCategory {
    pub fn as_str(&self) -> &str {
        match self {
            RemovalCategory::Moderator => "moderator",
            RemovalCategory::Deleted => "deleted",
            RemovalCategory::Author => "author",
            RemovalCategory::AutomodFiltered => "automod_filtered",
            RemovalCategory::Reddit => "reddit",
            RemovalCategory::Other(value) => value,
        }
    }

    /// Whether the author took the post down themselves.
    pub fn is_self_inflicted(&self) -> bool {
        matches!(self, RemovalCategory::Deleted | RemovalCategory::Author)
    }
}

impl From<String> for RemovalCategory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "moderator" => RemovalCategory::Moderator,
            "deleted" => RemovalCategory::Deleted,
            "author" => RemovalCategory::Author,
            "automod_filtered" => RemovalCategory::AutomodFiltered,
            "reddit" => RemovalCategory::Reddit,
            _ => RemovalCategory::Other(value),
        }
    }
}

impl From<RemovalCategory> for String {
    fn from(category: RemovalCategory) -> Self {
        category.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub url: String,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: i64,
    pub removed_by_category: Option<RemovalCategory>,
    pub is_robot_indexable: bool,
    pub stickied: bool,
}

impl Submission {
    /// True when someone other than the author removed the submission.
    pub fn is_removed(&self) -> bool {
        self.removed_by_category
            .as_ref()
            .is_some_and(|category| !category.is_self_inflicted())
    }

    pub fn absolute_permalink(&self) -> String {
        format!("{}{}", REDDIT_BASE_URL, self.permalink)
    }
}

/// A submission paired with the rank it held when last seen in its window.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSubmission {
    pub submission: Submission,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub permalink: String,
    pub subreddit: String,
    pub link_id: String,
    pub stickied: bool,
    pub distinguished: Option<String>,
}

impl Comment {
    pub fn absolute_permalink(&self) -> String {
        format!("{}{}", REDDIT_BASE_URL, self.permalink)
    }
}
