//! Ordered captures of a hot-listing window.

use crate::types::Submission;
use std::collections::HashSet;

/// Submissions in the order the platform ranked them when fetched.
///
/// Position 0 is the top of the window. Identifiers are unique; a repeated
/// identifier keeps its first (highest ranked) occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionSnapshot {
    submissions: Vec<Submission>,
}

impl SubmissionSnapshot {
    pub fn new(submissions: Vec<Submission>) -> Self {
        let mut seen = HashSet::with_capacity(submissions.len());
        let submissions = submissions
            .into_iter()
            .filter(|submission| seen.insert(submission.id.clone()))
            .collect();
        Self { submissions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.submissions.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.submissions.iter().any(|s| s.id == id)
    }

    /// Zero-based position of `id` in this snapshot.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.submissions.iter().position(|s| s.id == id)
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.iter()
    }

    /// Submissions in `self` whose identifiers are absent from `other`, in
    /// `self`'s order.
    pub fn diff(&self, other: &SubmissionSnapshot) -> SubmissionSnapshot {
        let other_ids = other.ids();
        SubmissionSnapshot {
            submissions: self
                .submissions
                .iter()
                .filter(|s| !other_ids.contains(s.id.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Submissions that satisfy [`Submission::is_removed`].
    pub fn removed(&self) -> SubmissionSnapshot {
        SubmissionSnapshot {
            submissions: self
                .submissions
                .iter()
                .filter(|s| s.is_removed())
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<Submission>> for SubmissionSnapshot {
    fn from(submissions: Vec<Submission>) -> Self {
        Self::new(submissions)
    }
}

impl IntoIterator for SubmissionSnapshot {
    type Item = Submission;
    type IntoIter = std::vec::IntoIter<Submission>;

    fn into_iter(self) -> Self::IntoIter {
        self.submissions.into_iter()
    }
}
