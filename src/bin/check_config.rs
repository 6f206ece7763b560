//! Compare the vault registry with the vault metadata API.
//!
//! Exits non-zero when any error-level finding is reported.

use anyhow::{Context, Result};
use beefy_balances::registry::check::{check_registry, ApiBoost, ApiVault, Severity};
use beefy_balances::registry::RegistryFile;
use serde::de::DeserializeOwned;

const DEFAULT_API_URL: &str = "https://api.beefy.finance";

async fn fetch<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?
        .json::<T>()
        .await
        .with_context(|| format!("unexpected response body from {}", url))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let registry_path =
        std::env::var("VAULT_REGISTRY_PATH").unwrap_or_else(|_| "config/vaults.json".to_string());
    let api_url = std::env::var("BEEFY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let api_url = api_url.trim_end_matches('/');

    let file = RegistryFile::from_path(&registry_path)
        .with_context(|| format!("failed to load {}", registry_path))?;

    let client = reqwest::Client::new();
    let vaults: Vec<ApiVault> = fetch(&client, &format!("{}/vaults", api_url)).await?;
    let boosts: Vec<ApiBoost> = fetch(&client, &format!("{}/boosts", api_url)).await?;
    tracing::info!(vaults = vaults.len(), boosts = boosts.len(), "fetched vault metadata");

    let report = check_registry(&file, &vaults, &boosts);
    for finding in &report.findings {
        match finding.severity {
            Severity::Error => tracing::error!("{}", finding),
            Severity::Warning => tracing::warn!("{}", finding),
        }
    }
    tracing::info!(
        errors = report.count(Severity::Error),
        warnings = report.count(Severity::Warning),
        "registry check finished"
    );

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
