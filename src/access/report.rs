//! Per-journal embargo report.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::content::embargo::EmbargoCalculator;
use crate::content::types::{ContentItem, Issue, Journal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRestriction {
    pub localidentifier: String,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub year: Option<i32>,
    pub embargoed: bool,
    pub whitelisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictionsReport {
    pub code: String,
    pub localidentifier: Option<String>,
    pub embargoed: bool,
    /// Absent for open access journals.
    pub embargo_in_months: Option<u32>,
    pub embargo_begin_date: Option<NaiveDate>,
    pub count: usize,
    pub embargoed_count: usize,
    pub whitelisted_count: usize,
    pub issues: Vec<IssueRestriction>,
}

/// Build the report from a journal and its published issues, newest first.
pub fn build_report(
    calculator: &EmbargoCalculator,
    journal: &Journal,
    published: Vec<Issue>,
    today: NaiveDate,
) -> RestrictionsReport {
    let issues: Vec<IssueRestriction> = published
        .into_iter()
        .map(|issue| {
            let embargoed = calculator
                .is_embargoed(&ContentItem::Issue(issue.clone()), journal, today)
                .embargoed;
            IssueRestriction {
                year: issue.publication_date.map(|d| d.year()),
                whitelisted: issue.force_free_access,
                localidentifier: issue.localidentifier,
                volume: issue.volume,
                number: issue.number,
                embargoed,
            }
        })
        .collect();

    RestrictionsReport {
        code: journal.code.clone(),
        localidentifier: journal.localidentifier.clone(),
        embargoed: !journal.open_access,
        embargo_in_months: (!journal.open_access).then(|| calculator.embargo_in_months(journal)),
        embargo_begin_date: calculator.embargo_begin_date(journal, today),
        count: issues.len(),
        embargoed_count: issues.iter().filter(|i| i.embargoed).count(),
        whitelisted_count: issues.iter().filter(|i| i.whitelisted).count(),
        issues,
    }
}
