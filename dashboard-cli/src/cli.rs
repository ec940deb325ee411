use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashboard_core::{
    CancellationToken, Config, HtmlRenderer, ProviderId, Renderer, TextRenderer, WeatherPipeline,
};
use inquire::{Confirm, Password, PasswordDisplayMode};
use tracing::{debug, info};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Current weather and 5-day forecast")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key for a provider.
    Configure {
        /// Provider short name.
        #[arg(default_value = "openweather")]
        provider: String,
    },

    /// Show current weather and the daily forecast for a city.
    Show {
        /// City name, e.g. "Sangli" or "London,GB".
        city: String,

        /// Also write an HTML dashboard page to this path.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Override the configured timeout, in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { city, html, timeout } => show(&city, html, timeout).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if config.is_provider_configured(id) {
        let replace = Confirm::new(&format!("An API key for {id} is already stored. Replace it?"))
            .with_default(false)
            .prompt()?;
        if !replace {
            return Ok(());
        }
    }

    let api_key = Password::new(&format!("{id} API key:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.to_string());
    config.save()?;

    info!(provider = %id, path = %Config::config_file_path()?.display(), "Saved API key");
    println!("Saved API key for {id}.");
    Ok(())
}

async fn show(city: &str, html: Option<PathBuf>, timeout: Option<u64>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    config.apply_env();
    if let Some(secs) = timeout {
        config.timeout_secs = secs;
    }

    let pipeline = WeatherPipeline::from_config(&config)?;
    debug!(base_url = %config.base_url, timeout = ?pipeline.options().timeout(), "Pipeline ready");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let weather = pipeline
        .fetch_city_weather_with_cancel(city, &cancel)
        .await
        .with_context(|| format!("Failed to fetch weather for '{city}'"))?;

    print!("{}", TextRenderer.render(&weather)?);

    if let Some(path) = html {
        let title = format!("{} weather", weather.current.location_name);
        let page = HtmlRenderer::with_title(title).render(&weather)?;
        fs::write(&path, page)
            .with_context(|| format!("Failed to write HTML page: {}", path.display()))?;
        println!("\nDashboard written to {}", path.display());
    }

    Ok(())
}
