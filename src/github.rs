use anyhow::{Context, Result, bail};
use chrono::SecondsFormat;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::aggregate::StatsSource;
use crate::config::{Config, StatsPolling};
use crate::period::DateRange;
use crate::stats::{ContributionTotals, LanguageTally, LineStats, RepoRef, RepoSummary};

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct OwnerLogin {
    login: String,
}

#[derive(Clone)]
pub struct GithubClient {
    token: Arc<String>,
    http: Arc<Client>,
    api_url: Arc<String>,
    polling: StatsPolling,
}

impl GithubClient {
    pub fn new(token: &str, config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent("profile-stats")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            token: Arc::new(token.to_string()),
            http: Arc::new(http),
            api_url: Arc::new(config.api_url.trim_end_matches('/').to_string()),
            polling: config.stats_polling,
        })
    }

    /// Sends a request, retrying on rate limiting and server errors.
    ///
    /// Any other status (including non-2xx) is handed back to the caller.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        const MAX_RETRIES: usize = 4;
        let mut attempt = 0usize;

        loop {
            attempt += 1;

            let resp = build()
                .bearer_auth(&*self.token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("Network error sending GitHub request: {e}"))?;

            let status = resp.status();

            // If rate limited, honor Retry-After header when present
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    bail!("GitHub API returned 429 (rate-limited) and retries exhausted");
                }
                let wait_secs = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                sleep(Duration::from_secs(wait_secs)).await;
                continue;
            }

            if status.is_server_error() && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(250u64.saturating_mul(1 << (attempt - 1)));
                sleep(backoff).await;
                continue;
            }

            return Ok(resp);
        }
    }

    /// GraphQL request with `errors` checking.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = format!("{}/graphql", self.api_url);
        let body = json!({ "query": query, "variables": variables });

        let resp = self.send(|| self.http.post(&url).json(&body)).await?;
        let status = resp.status();

        // Parse JSON (even for non-2xx to capture error payloads)
        let json: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse JSON from GitHub: {e}"))?;

        if let Some(errors) = json.get("errors") {
            bail!("GraphQL reported errors: {errors:#}");
        }

        if !status.is_success() {
            bail!("GitHub API returned HTTP {}: {json:#}", status.as_u16());
        }

        Ok(json)
    }

    async fn rest_get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{path}", self.api_url);
        debug!("GET {url}");
        self.send(|| {
            self.http
                .get(&url)
                .header(ACCEPT, "application/vnd.github+json")
        })
        .await
    }
}

impl StatsSource for GithubClient {
    /// Owned, non-fork repositories of `username` with their star counts.
    async fn personal_repos(&self, username: &str) -> Result<Vec<RepoSummary>> {
        const QUERY: &str = r#"
            query($login: String!, $cursor: String) {
                user(login: $login) {
                    repositories(first: 100, after: $cursor, ownerAffiliations: OWNER, isFork: false) {
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                        nodes {
                            name
                            owner { login }
                            stargazerCount
                        }
                    }
                }
            }
        "#;

        #[derive(Deserialize)]
        struct ReposResponse {
            data: Option<ReposData>,
        }
        #[derive(Deserialize)]
        struct ReposData {
            user: Option<ReposUser>,
        }
        #[derive(Deserialize)]
        struct ReposUser {
            repositories: RepoPage,
        }
        #[derive(Deserialize)]
        struct RepoPage {
            #[serde(rename = "pageInfo")]
            page_info: PageInfo,
            nodes: Option<Vec<RepoNode>>,
        }
        #[derive(Deserialize)]
        struct RepoNode {
            name: String,
            owner: OwnerLogin,
            #[serde(rename = "stargazerCount")]
            stargazer_count: u64,
        }

        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let json = self
                .graphql(QUERY, json!({ "login": username, "cursor": cursor }))
                .await?;
            let parsed: ReposResponse = serde_json::from_value(json)
                .context("Failed to deserialize personal_repos response")?;

            let page = parsed
                .data
                .and_then(|d| d.user)
                .map(|u| u.repositories)
                .ok_or_else(|| anyhow::anyhow!("GitHub user {username} not found"))?;

            for node in page.nodes.unwrap_or_default() {
                out.push(RepoSummary {
                    repo: RepoRef::new(node.owner.login, node.name),
                    star_count: node.stargazer_count,
                });
            }

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        Ok(out)
    }

    /// Commit, PR and issue contributions within one date range.
    async fn contribution_totals(
        &self,
        username: &str,
        range: &DateRange,
    ) -> Result<ContributionTotals> {
        const QUERY: &str = r#"
            query($login: String!, $from: DateTime!, $to: DateTime!) {
                user(login: $login) {
                    contributionsCollection(from: $from, to: $to) {
                        totalCommitContributions
                        restrictedContributionsCount
                        totalPullRequestContributions
                        totalIssueContributions
                    }
                }
            }
        "#;

        #[derive(Deserialize)]
        struct ContribResponse {
            data: Option<ContribData>,
        }
        #[derive(Deserialize)]
        struct ContribData {
            user: Option<ContribUser>,
        }
        #[derive(Deserialize)]
        struct ContribUser {
            #[serde(rename = "contributionsCollection")]
            contributions_collection: ContribCollection,
        }
        #[derive(Deserialize)]
        struct ContribCollection {
            #[serde(rename = "totalCommitContributions")]
            total_commit_contributions: u64,
            #[serde(rename = "restrictedContributionsCount", default)]
            restricted_contributions_count: u64,
            #[serde(rename = "totalPullRequestContributions")]
            total_pull_request_contributions: u64,
            #[serde(rename = "totalIssueContributions")]
            total_issue_contributions: u64,
        }

        let variables = json!({
            "login": username,
            "from": range.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            "to": range.to.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        let json = self.graphql(QUERY, variables).await?;
        let parsed: ContribResponse = serde_json::from_value(json)
            .context("Failed to deserialize contribution_totals response")?;

        let c = parsed
            .data
            .and_then(|d| d.user)
            .map(|u| u.contributions_collection)
            .ok_or_else(|| anyhow::anyhow!("GitHub user {username} not found"))?;

        Ok(ContributionTotals {
            commits: c
                .total_commit_contributions
                .saturating_add(c.restricted_contributions_count),
            pull_requests: c.total_pull_request_contributions,
            issues: c.total_issue_contributions,
        })
    }

    async fn star_count(&self, repo: &RepoRef) -> Result<u64> {
        #[derive(Deserialize)]
        struct RepoInfo {
            stargazers_count: u64,
        }

        let resp = self.rest_get(&format!("/repos/{repo}")).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GitHub API returned HTTP {} for {repo}", status.as_u16());
        }

        let info: RepoInfo = resp
            .json()
            .await
            .with_context(|| format!("Failed to deserialize repository {repo}"))?;
        Ok(info.stargazers_count)
    }

    /// Lines added and deleted by `username` in `repo`.
    ///
    /// GitHub answers `202 Accepted` while it is still computing the statistics,
    /// so the endpoint is polled a few times. If the data never shows up, or the
    /// endpoint fails, the repository counts as zero.
    async fn contributor_line_stats(&self, repo: &RepoRef, username: &str) -> Result<LineStats> {
        #[derive(Deserialize)]
        struct Contributor {
            author: Option<OwnerLogin>,
            #[serde(default)]
            weeks: Vec<Week>,
        }
        #[derive(Deserialize)]
        struct Week {
            #[serde(default)]
            a: u64,
            #[serde(default)]
            d: u64,
        }

        let path = format!("/repos/{repo}/stats/contributors");

        for attempt in 1..=self.polling.attempts {
            let resp = self.rest_get(&path).await?;

            match resp.status() {
                StatusCode::ACCEPTED => {
                    debug!(
                        "Contributor stats for {repo} still computing (attempt {attempt}/{})",
                        self.polling.attempts
                    );
                    if attempt < self.polling.attempts {
                        sleep(self.polling.delay).await;
                    }
                }
                StatusCode::NO_CONTENT => return Ok(LineStats::default()),
                status if status.is_success() => {
                    let contributors: Vec<Contributor> = resp
                        .json()
                        .await
                        .with_context(|| format!("Failed to deserialize contributor stats for {repo}"))?;

                    let mut stats = LineStats::default();
                    for c in contributors {
                        let is_user = c
                            .author
                            .as_ref()
                            .is_some_and(|a| a.login.eq_ignore_ascii_case(username));
                        if !is_user {
                            continue;
                        }
                        for week in c.weeks {
                            stats.additions = stats.additions.saturating_add(week.a);
                            stats.deletions = stats.deletions.saturating_add(week.d);
                        }
                    }
                    return Ok(stats);
                }
                status => {
                    warn!("Contributor stats for {repo} returned HTTP {}", status.as_u16());
                    return Ok(LineStats::default());
                }
            }
        }

        warn!(
            "Contributor stats for {repo} not ready after {} attempts, counting as zero",
            self.polling.attempts
        );
        Ok(LineStats::default())
    }

    async fn repo_languages(&self, repo: &RepoRef) -> Result<LanguageTally> {
        let resp = self.rest_get(&format!("/repos/{repo}/languages")).await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("Languages for {repo} returned HTTP {}", status.as_u16());
            return Ok(LanguageTally::new());
        }

        let langs: std::collections::HashMap<String, u64> = resp
            .json()
            .await
            .with_context(|| format!("Failed to deserialize languages for {repo}"))?;
        Ok(langs.into_iter().collect())
    }

    /// Every repository of an organization, following GraphQL pagination.
    async fn org_repos(&self, org: &str) -> Result<Vec<RepoRef>> {
        const QUERY: &str = r#"
            query($org: String!, $cursor: String) {
                organization(login: $org) {
                    repositories(first: 100, after: $cursor) {
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                        nodes {
                            name
                            owner { login }
                        }
                    }
                }
            }
        "#;

        #[derive(Deserialize)]
        struct OrgResponse {
            data: Option<OrgData>,
        }
        #[derive(Deserialize)]
        struct OrgData {
            organization: Option<OrgRepos>,
        }
        #[derive(Deserialize)]
        struct OrgRepos {
            repositories: OrgPage,
        }
        #[derive(Deserialize)]
        struct OrgPage {
            #[serde(rename = "pageInfo")]
            page_info: PageInfo,
            nodes: Option<Vec<OrgRepoNode>>,
        }
        #[derive(Deserialize)]
        struct OrgRepoNode {
            name: String,
            owner: OwnerLogin,
        }

        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let json = self
                .graphql(QUERY, json!({ "org": org, "cursor": cursor }))
                .await?;
            let parsed: OrgResponse = serde_json::from_value(json)
                .context("Failed to deserialize org_repos response")?;

            let page = parsed
                .data
                .and_then(|d| d.organization)
                .map(|o| o.repositories)
                .ok_or_else(|| anyhow::anyhow!("GitHub organization {org} not found"))?;

            out.extend(
                page.nodes
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| RepoRef::new(n.owner.login, n.name)),
            );

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        Ok(out)
    }
}
