//! Embargo computation.
//!
//! # Rules (first match wins)
//! 1. Unpublished issue: embargoed
//! 2. Open access journal, no explicit `open_access = false` on the item: free
//! 3. `force_free_access`: free
//! 4. Inactive journal, or journal outside the main collection: free
//! 5. Published after `today - offset`: embargoed
//! 6. Journal's latest issue with no successor journal: embargoed
//! 7. Latest issue unknown and no successor journal: embargoed, with a warning
//! 8. Otherwise free

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::config::EmbargoConfig;
use crate::content::types::{ContentItem, Journal, JournalType};
use crate::observability::metrics;

/// Metadata problems found while computing an embargo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    MissingPublicationDate { issue: String },
    UnknownLatestIssue { journal: String },
}

impl DataQualityWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            DataQualityWarning::MissingPublicationDate { .. } => "missing_publication_date",
            DataQualityWarning::UnknownLatestIssue { .. } => "unknown_latest_issue",
        }
    }
}

/// Result of an embargo computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbargoStatus {
    pub embargoed: bool,
    pub warning: Option<DataQualityWarning>,
}

impl EmbargoStatus {
    fn free() -> Self {
        Self { embargoed: false, warning: None }
    }

    fn embargoed() -> Self {
        Self { embargoed: true, warning: None }
    }
}

/// Computes embargo windows from per-journal-type offsets.
#[derive(Debug, Clone)]
pub struct EmbargoCalculator {
    scientific_months: u32,
    cultural_months: u32,
    default_months: u32,
}

impl EmbargoCalculator {
    pub fn new(config: &EmbargoConfig) -> Self {
        Self {
            scientific_months: config.scientific_months,
            cultural_months: config.cultural_months,
            default_months: config.default_months,
        }
    }

    /// Embargo duration for a journal, in months.
    pub fn embargo_in_months(&self, journal: &Journal) -> u32 {
        match journal.journal_type {
            Some(JournalType::Scientific) => self.scientific_months,
            Some(JournalType::Cultural) => self.cultural_months,
            None => self.default_months,
        }
    }

    /// First date of the embargo window, or `None` when the journal never embargoes.
    pub fn embargo_begin_date(&self, journal: &Journal, today: NaiveDate) -> Option<NaiveDate> {
        if journal.open_access || !journal.active || !journal.in_main_collection {
            return None;
        }
        Some(self.window_start(journal, today))
    }

    fn window_start(&self, journal: &Journal, today: NaiveDate) -> NaiveDate {
        let months = Months::new(self.embargo_in_months(journal));
        // Out-of-range subtraction collapses the window to today, which embargoes more.
        today.checked_sub_months(months).unwrap_or(today)
    }

    /// Returns whether `item` is embargoed on `today`. Never fails; missing data embargoes.
    pub fn is_embargoed(
        &self,
        item: &ContentItem,
        journal: &Journal,
        today: NaiveDate,
    ) -> EmbargoStatus {
        let issue = item.issue();

        if !issue.is_published {
            return EmbargoStatus::embargoed();
        }

        if journal.open_access && item.open_access_override() != Some(false) {
            return EmbargoStatus::free();
        }

        if issue.force_free_access {
            return EmbargoStatus::free();
        }

        if !journal.active || !journal.in_main_collection {
            return EmbargoStatus::free();
        }
        // Also reached by open access journals whose item is explicitly closed.
        let threshold = self.window_start(journal, today);

        let published = match issue.publication_date {
            Some(date) => date,
            None => {
                let warning = DataQualityWarning::MissingPublicationDate {
                    issue: issue.localidentifier.clone(),
                };
                tracing::warn!(
                    issue = %issue.localidentifier,
                    journal = %journal.code,
                    "Issue has no publication date, treating as embargoed"
                );
                metrics::record_data_quality_warning(warning.kind());
                return EmbargoStatus { embargoed: true, warning: Some(warning) };
            }
        };

        if published > threshold {
            return EmbargoStatus::embargoed();
        }

        // The newest issue stays embargoed unless the journal continues under a successor.
        if journal.next_journal.is_some() {
            return EmbargoStatus::free();
        }
        match journal.latest_issue.as_deref() {
            Some(latest) if latest == issue.localidentifier => EmbargoStatus::embargoed(),
            Some(_) => EmbargoStatus::free(),
            None => {
                let warning =
                    DataQualityWarning::UnknownLatestIssue { journal: journal.code.clone() };
                tracing::warn!(
                    issue = %issue.localidentifier,
                    journal = %journal.code,
                    "Journal has no known latest issue, treating as embargoed"
                );
                metrics::record_data_quality_warning(warning.kind());
                EmbargoStatus { embargoed: true, warning: Some(warning) }
            }
        }
    }
}
