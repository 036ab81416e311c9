use std::{collections::HashMap, fs};

use anyhow::{bail, Context, Result};
use url::Url;

/// Endpoints and identity for one deployment of the wellness agent.
/// Defaults point at the public ao testnet gateways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub process_id: String,
    pub messenger_unit_url: String,
    pub compute_unit_url: String,
    pub wallet_address: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            process_id: String::new(),
            messenger_unit_url: "https://mu.ao-testnet.xyz".into(),
            compute_unit_url: "https://cu.ao-testnet.xyz".into(),
            wallet_address: None,
        }
    }
}

/// Layers defaults, then `wellness.toml` in the working directory, then
/// `WELLNESS__*` environment variables. Later layers win per key.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("wellness.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("process_id") {
                settings.process_id = v.clone();
            }
            if let Some(v) = file_cfg.get("messenger_unit_url") {
                settings.messenger_unit_url = v.clone();
            }
            if let Some(v) = file_cfg.get("compute_unit_url") {
                settings.compute_unit_url = v.clone();
            }
            if let Some(v) = file_cfg.get("wallet_address") {
                settings.wallet_address = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("WELLNESS__PROCESS_ID") {
        settings.process_id = v;
    }
    if let Ok(v) = std::env::var("WELLNESS__MESSENGER_UNIT_URL") {
        settings.messenger_unit_url = v;
    }
    if let Ok(v) = std::env::var("WELLNESS__COMPUTE_UNIT_URL") {
        settings.compute_unit_url = v;
    }
    if let Ok(v) = std::env::var("WELLNESS__WALLET_ADDRESS") {
        settings.wallet_address = Some(v);
    }

    settings
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.process_id.trim().is_empty() {
        bail!("no process id configured; set process_id in wellness.toml or WELLNESS__PROCESS_ID");
    }
    Url::parse(&settings.messenger_unit_url)
        .with_context(|| format!("invalid messenger unit url: {}", settings.messenger_unit_url))?;
    Url::parse(&settings.compute_unit_url)
        .with_context(|| format!("invalid compute unit url: {}", settings.compute_unit_url))?;
    Ok(())
}
