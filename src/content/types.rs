//! Journal, issue and article metadata as read from the repository.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Journal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalId(pub u64);

impl std::fmt::Display for JournalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub u64);

/// Journal type; drives the embargo duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalType {
    Scientific,
    Cultural,
}

/// Journal metadata relevant to access decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: JournalId,
    /// Public code (e.g. `ae`).
    pub code: String,
    #[serde(default)]
    pub localidentifier: Option<String>,
    pub collection: CollectionId,
    #[serde(default, rename = "type")]
    pub journal_type: Option<JournalType>,
    #[serde(default)]
    pub open_access: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Only journals of the main collection are subject to embargo.
    #[serde(default = "default_true")]
    pub in_main_collection: bool,
    /// Successor journal, when this one was renamed or continued elsewhere.
    #[serde(default)]
    pub next_journal: Option<JournalId>,
    /// Localidentifier of the most recently published issue.
    #[serde(default)]
    pub latest_issue: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Issue metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub localidentifier: String,
    pub journal: JournalId,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub production_date: Option<NaiveDate>,
    #[serde(default)]
    pub force_free_access: bool,
    #[serde(default)]
    pub is_published: bool,
    /// Explicit per-issue open access override.
    #[serde(default)]
    pub open_access: Option<bool>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

/// Article metadata. Embargo is inherited from the issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub localidentifier: String,
    pub issue: String,
    #[serde(default)]
    pub open_access: Option<bool>,
}

/// The thing access is being requested for.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Issue(Issue),
    Article { article: Article, issue: Issue },
}

impl ContentItem {
    /// The issue carrying the embargo-relevant dates.
    pub fn issue(&self) -> &Issue {
        match self {
            ContentItem::Issue(issue) => issue,
            ContentItem::Article { issue, .. } => issue,
        }
    }

    pub fn journal_id(&self) -> JournalId {
        self.issue().journal
    }

    /// The item's own open access override, article first.
    pub fn open_access_override(&self) -> Option<bool> {
        match self {
            ContentItem::Issue(issue) => issue.open_access,
            ContentItem::Article { article, issue } => article.open_access.or(issue.open_access),
        }
    }

    pub fn localidentifier(&self) -> &str {
        match self {
            ContentItem::Issue(issue) => &issue.localidentifier,
            ContentItem::Article { article, .. } => &article.localidentifier,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentItem::Issue(_) => "issue",
            ContentItem::Article { .. } => "article",
        }
    }
}
