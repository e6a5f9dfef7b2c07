use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A repository identified by owner and name. Equality is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Canonical `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => bail!("invalid repository reference {s:?}, expected \"owner/name\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    pub repo: RepoRef,
    pub star_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributionTotals {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
}

impl std::ops::AddAssign for ContributionTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.commits = self.commits.saturating_add(rhs.commits);
        self.pull_requests = self.pull_requests.saturating_add(rhs.pull_requests);
        self.issues = self.issues.saturating_add(rhs.issues);
    }
}

/// Additions and deletions of one user in one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub additions: u64,
    pub deletions: u64,
}

impl LineStats {
    pub fn lines_changed(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

/// Language name to cumulative byte size.
///
/// Backed by a `BTreeMap` so iteration (and therefore rendering) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTally(BTreeMap<String, u64>);

impl LanguageTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, language: impl Into<String>, bytes: u64) {
        let entry = self.0.entry(language.into()).or_insert(0);
        *entry = entry.saturating_add(bytes);
    }

    pub fn merge(&mut self, other: LanguageTally) {
        for (language, bytes) in other.0 {
            self.add(language, bytes);
        }
    }

    #[cfg(test)]
    pub fn get(&self, language: &str) -> Option<u64> {
        self.0.get(language).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The `n` largest languages, biggest first. Ties keep alphabetical order.
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut langs: Vec<(&str, u64)> = self.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1));
        langs.truncate(n);
        langs
    }
}

impl FromIterator<(String, u64)> for LanguageTally {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut tally = Self::new();
        for (language, bytes) in iter {
            tally.add(language, bytes);
        }
        tally
    }
}

/// Figures shown on the statistics card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub stars: u64,
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub lines_changed: u64,
}
