use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::{Config, ContributionScope};
use crate::period::{DateRange, yearly_ranges};
use crate::stats::{
    AggregateStats, ContributionTotals, LanguageTally, LineStats, RepoRef, RepoSummary,
};

/// Where the raw figures come from. Implemented by `GithubClient`.
pub trait StatsSource {
    async fn personal_repos(&self, username: &str) -> Result<Vec<RepoSummary>>;
    async fn contribution_totals(
        &self,
        username: &str,
        range: &DateRange,
    ) -> Result<ContributionTotals>;
    async fn star_count(&self, repo: &RepoRef) -> Result<u64>;
    async fn contributor_line_stats(&self, repo: &RepoRef, username: &str) -> Result<LineStats>;
    async fn repo_languages(&self, repo: &RepoRef) -> Result<LanguageTally>;
    async fn org_repos(&self, org: &str) -> Result<Vec<RepoRef>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub stats: AggregateStats,
    pub languages: LanguageTally,
}

/// Runs one full collection pass against `source`.
///
/// Failing to read the user's repositories or contribution totals aborts the
/// run. Failures on individual repositories are logged and count as zero.
pub async fn collect<S: StatsSource>(
    source: &S,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<Aggregate> {
    let username = config.username.as_str();

    info!("Fetching repositories of {username}");
    let personal = source
        .personal_repos(username)
        .await
        .context("Failed to fetch personal repositories")?;

    let mut stars: u64 = personal.iter().map(|r| r.star_count).sum();
    for repo in &config.starred_repos {
        match source.star_count(repo).await {
            Ok(count) => {
                info!("{repo}: {count} stars");
                stars = stars.saturating_add(count);
            }
            Err(e) => warn!("Failed to get star count for {repo}: {e:#}"),
        }
    }

    let mut contributions = ContributionTotals::default();
    for range in yearly_ranges(config.start_year, now) {
        info!("Fetching contributions {} .. {}", range.from.date_naive(), range.to.date_naive());
        contributions += source
            .contribution_totals(username, &range)
            .await
            .with_context(|| format!("Failed to fetch contributions for {}", range.from.date_naive()))?;
    }

    let mut universe: Vec<RepoRef> = personal.into_iter().map(|r| r.repo).collect();
    match &config.scope {
        ContributionScope::Listed(repos) => universe.extend(repos.iter().cloned()),
        ContributionScope::Organizations(orgs) => {
            for org in orgs {
                info!("Fetching repositories of organization {org}");
                match source.org_repos(org).await {
                    Ok(repos) => universe.extend(repos),
                    Err(e) => warn!("Failed to list repositories of {org}: {e:#}"),
                }
            }
        }
    }

    let (lines_changed, languages) = scan_contributions(source, username, &universe).await;
    info!(
        "Scanned {} repositories: {lines_changed} lines changed, {} languages",
        universe.len(),
        languages.len()
    );

    Ok(Aggregate {
        stats: AggregateStats {
            stars,
            commits: contributions.commits,
            pull_requests: contributions.pull_requests,
            issues: contributions.issues,
            lines_changed,
        },
        languages,
    })
}

/// Visits each repository once, summing line changes and merging the language
/// bytes of repositories the user actually touched.
async fn scan_contributions<S: StatsSource>(
    source: &S,
    username: &str,
    repos: &[RepoRef],
) -> (u64, LanguageTally) {
    let mut seen = HashSet::new();
    let mut lines_changed = 0u64;
    let mut languages = LanguageTally::new();

    for repo in repos {
        if !seen.insert(repo.full_name()) {
            continue;
        }

        let stats = match source.contributor_line_stats(repo, username).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to get line stats for {repo}: {e:#}");
                LineStats::default()
            }
        };

        let changed = stats.lines_changed();
        if changed == 0 {
            continue;
        }
        info!("{repo}: +{} -{}", stats.additions, stats.deletions);
        lines_changed = lines_changed.saturating_add(changed);

        match source.repo_languages(repo).await {
            Ok(tally) => languages.merge(tally),
            Err(e) => warn!("Failed to get languages for {repo}: {e:#}"),
        }
    }

    (lines_changed, languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use crate::config::StatsPolling;
    use crate::svg::CardOptions;

    #[derive(Default)]
    struct FakeSource {
        personal: Vec<RepoSummary>,
        fail_personal: bool,
        yearly: ContributionTotals,
        stars: HashMap<String, u64>,
        lines: HashMap<String, LineStats>,
        failing_lines: HashSet<String>,
        languages: HashMap<String, Vec<(&'static str, u64)>>,
        orgs: HashMap<String, Vec<RepoRef>>,
        line_calls: RefCell<Vec<String>>,
        language_calls: RefCell<Vec<String>>,
        contribution_calls: RefCell<usize>,
    }

    impl StatsSource for FakeSource {
        async fn personal_repos(&self, _username: &str) -> Result<Vec<RepoSummary>> {
            if self.fail_personal {
                return Err(anyhow!("boom"));
            }
            Ok(self.personal.clone())
        }

        async fn contribution_totals(
            &self,
            _username: &str,
            _range: &DateRange,
        ) -> Result<ContributionTotals> {
            *self.contribution_calls.borrow_mut() += 1;
            Ok(self.yearly)
        }

        async fn star_count(&self, repo: &RepoRef) -> Result<u64> {
            self.stars
                .get(&repo.full_name())
                .copied()
                .ok_or_else(|| anyhow!("no such repo"))
        }

        async fn contributor_line_stats(
            &self,
            repo: &RepoRef,
            _username: &str,
        ) -> Result<LineStats> {
            let name = repo.full_name();
            self.line_calls.borrow_mut().push(name.clone());
            if self.failing_lines.contains(&name) {
                return Err(anyhow!("network down"));
            }
            Ok(self.lines.get(&name).copied().unwrap_or_default())
        }

        async fn repo_languages(&self, repo: &RepoRef) -> Result<LanguageTally> {
            let name = repo.full_name();
            self.language_calls.borrow_mut().push(name.clone());
            Ok(self
                .languages
                .get(&name)
                .map(|l| l.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default())
        }

        async fn org_repos(&self, org: &str) -> Result<Vec<RepoRef>> {
            self.orgs
                .get(org)
                .cloned()
                .ok_or_else(|| anyhow!("unknown org"))
        }
    }

    fn repo(s: &str) -> RepoRef {
        s.parse().unwrap()
    }

    fn summary(s: &str, star_count: u64) -> RepoSummary {
        RepoSummary {
            repo: repo(s),
            star_count,
        }
    }

    fn config(scope: ContributionScope, starred: &[&str]) -> Config {
        Config {
            username: "me".to_string(),
            start_year: 2023,
            starred_repos: starred.iter().map(|s| repo(s)).collect(),
            scope,
            output_dir: PathBuf::from("profile"),
            api_url: "http://localhost".to_string(),
            stats_polling: StatsPolling::default(),
            card: CardOptions {
                title: "Stats".to_string(),
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
    }

    fn lines(additions: u64, deletions: u64) -> LineStats {
        LineStats {
            additions,
            deletions,
        }
    }

    #[tokio::test]
    async fn repo_in_personal_and_listed_scope_is_counted_once() {
        let mut source = FakeSource {
            personal: vec![summary("me/tool", 5)],
            ..Default::default()
        };
        source.lines.insert("me/tool".into(), lines(100, 20));
        source
            .languages
            .insert("me/tool".into(), vec![("Rust", 1000)]);

        let config = config(
            ContributionScope::Listed(vec![repo("me/tool"), repo("me/tool")]),
            &[],
        );
        let result = collect(&source, &config, now()).await.unwrap();

        assert_eq!(result.stats.lines_changed, 120);
        assert_eq!(result.languages.get("Rust"), Some(1000));
        assert_eq!(*source.line_calls.borrow(), vec!["me/tool".to_string()]);
    }

    #[tokio::test]
    async fn untouched_repos_do_not_contribute_languages() {
        let mut source = FakeSource {
            personal: vec![summary("me/active", 0), summary("me/idle", 0)],
            ..Default::default()
        };
        source.lines.insert("me/active".into(), lines(3, 0));
        source
            .languages
            .insert("me/active".into(), vec![("Go", 10)]);
        source
            .languages
            .insert("me/idle".into(), vec![("Haskell", 99999)]);

        let result = collect(&source, &config(ContributionScope::Listed(vec![]), &[]), now())
            .await
            .unwrap();

        assert_eq!(result.languages.get("Go"), Some(10));
        assert_eq!(result.languages.get("Haskell"), None);
        assert_eq!(*source.language_calls.borrow(), vec!["me/active".to_string()]);
    }

    #[tokio::test]
    async fn stars_are_personal_plus_allow_list() {
        let mut source = FakeSource {
            personal: vec![summary("me/a", 10), summary("me/b", 2)],
            ..Default::default()
        };
        source.stars.insert("upstream/lib".into(), 300);
        source.stars.insert("upstream/cli".into(), 45);

        let base = collect(
            &source,
            &config(ContributionScope::Listed(vec![]), &["upstream/lib"]),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(base.stats.stars, 312);

        let extended = collect(
            &source,
            &config(
                ContributionScope::Listed(vec![]),
                &["upstream/lib", "upstream/cli"],
            ),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(extended.stats.stars - base.stats.stars, 45);
    }

    #[tokio::test]
    async fn org_repos_never_add_stars() {
        let mut source = FakeSource {
            personal: vec![summary("me/a", 1)],
            ..Default::default()
        };
        source
            .orgs
            .insert("acme".into(), vec![repo("acme/big"), repo("me/a")]);
        source.lines.insert("acme/big".into(), lines(40, 2));

        let config = config(ContributionScope::Organizations(vec!["acme".into()]), &[]);
        let result = collect(&source, &config, now()).await.unwrap();

        assert_eq!(result.stats.stars, 1);
        assert_eq!(result.stats.lines_changed, 42);
        assert_eq!(
            *source.line_calls.borrow(),
            vec!["me/a".to_string(), "acme/big".to_string()]
        );
    }

    #[tokio::test]
    async fn contributions_are_summed_per_year() {
        let source = FakeSource {
            yearly: ContributionTotals {
                commits: 100,
                pull_requests: 10,
                issues: 1,
            },
            ..Default::default()
        };

        // 2023, 2024 and 2025 (up to now)
        let result = collect(&source, &config(ContributionScope::Listed(vec![]), &[]), now())
            .await
            .unwrap();

        assert_eq!(*source.contribution_calls.borrow(), 3);
        assert_eq!(result.stats.commits, 300);
        assert_eq!(result.stats.pull_requests, 30);
        assert_eq!(result.stats.issues, 3);
    }

    #[tokio::test]
    async fn per_repo_failures_do_not_abort() {
        let mut source = FakeSource {
            personal: vec![summary("me/broken", 0), summary("me/fine", 0)],
            ..Default::default()
        };
        source.failing_lines.insert("me/broken".into());
        source.lines.insert("me/fine".into(), lines(7, 0));

        let config = config(
            ContributionScope::Organizations(vec!["missing-org".into()]),
            &["gone/repo"],
        );
        let result = collect(&source, &config, now()).await.unwrap();

        assert_eq!(result.stats.lines_changed, 7);
        assert_eq!(result.stats.stars, 0);
    }

    #[tokio::test]
    async fn failing_identity_query_is_fatal() {
        let source = FakeSource {
            fail_personal: true,
            ..Default::default()
        };
        let err = collect(&source, &config(ContributionScope::Listed(vec![]), &[]), now())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("personal repositories"));
    }
}
