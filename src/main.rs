mod aggregate;
mod colors;
mod config;
mod github;
mod output;
mod period;
mod stats;
mod svg;

use anyhow::Result;
use chrono::Utc;
use config::{Config, Credentials};
use github::GithubClient;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let credentials = Credentials::from_env()?;
    let config = Config::profile()?;

    let client = GithubClient::new(&credentials.token, &config)?;
    let result = aggregate::collect(&client, &config, Utc::now()).await?;

    println!("Stats: {}", serde_json::to_string_pretty(&result.stats)?);

    let stats_svg = svg::render_stats_card(&result.stats, &config.card).to_svg();
    let langs_svg = svg::render_languages_card(&result.languages).to_svg();

    let paths = output::write_cards(&config.output_dir, &stats_svg, &langs_svg)?;
    info!(
        "Wrote {} and {}",
        paths.stats.display(),
        paths.languages.display()
    );

    println!("Done! SVGs written to {}", config.output_dir.display());

    Ok(())
}
