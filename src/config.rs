use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::stats::RepoRef;
use crate::svg::CardOptions;

const USERNAME: &str = "PeterBenc";
const DISPLAY_NAME: &str = "Peter Benc";
const START_YEAR: i32 = 2018;

/// Externally owned repositories whose stars are credited to the user.
const STARRED_REPOS: &[&str] = &[];

/// Organizations whose repositories are scanned for line and language contributions.
const ORGANIZATIONS: &[&str] = &["nufi-official"];

const OUTPUT_DIR: &str = "profile";
const API_URL: &str = "https://api.github.com";

/// Which repositories, besides the user's own, are scanned for lines changed.
///
/// The two modes are alternatives; they are never combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionScope {
    /// A fixed list of repositories.
    #[allow(dead_code)]
    Listed(Vec<RepoRef>),
    /// Every repository of the given organizations.
    Organizations(Vec<String>),
}

/// Polling policy for the contributor statistics endpoint, which answers
/// `202 Accepted` while GitHub computes the data in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsPolling {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for StatsPolling {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub start_year: i32,
    pub starred_repos: Vec<RepoRef>,
    pub scope: ContributionScope,
    pub output_dir: PathBuf,
    pub api_url: String,
    pub stats_polling: StatsPolling,
    pub card: CardOptions,
}

impl Config {
    /// The compiled-in profile configuration.
    pub fn profile() -> Result<Self> {
        let starred_repos = parse_repos(STARRED_REPOS)?;

        Ok(Self {
            username: USERNAME.to_string(),
            start_year: START_YEAR,
            starred_repos,
            scope: ContributionScope::Organizations(
                ORGANIZATIONS.iter().map(|o| o.to_string()).collect(),
            ),
            output_dir: PathBuf::from(OUTPUT_DIR),
            api_url: API_URL.to_string(),
            stats_polling: StatsPolling::default(),
            card: CardOptions {
                title: format!("{DISPLAY_NAME}'s GitHub Statistics"),
            },
        })
    }
}

fn parse_repos(entries: &[&str]) -> Result<Vec<RepoRef>> {
    entries
        .iter()
        .map(|s| {
            s.parse::<RepoRef>()
                .with_context(|| format!("bad repository entry {s:?}"))
        })
        .collect()
}

/// Secrets read from the process environment (and `.env`, if present).
#[derive(Deserialize)]
pub struct Credentials {
    #[serde(rename = "gh_token")]
    pub token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        envy::from_env::<Credentials>().context("GH_TOKEN environment variable not set")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("token", &"***").finish()
    }
}
