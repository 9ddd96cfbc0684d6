/// `load_config` module: builds the run's [`Settings`] from an optional YAML file and
/// the process environment.
///
/// The YAML file carries only non-secret knobs (directories, link lifetime, polling,
/// endpoint overrides). Credentials always come from the environment, after `.env`
/// has been loaded by `main`.
///
/// # Errors
/// Every failure is an `anyhow::Error` with enough context to act on. All missing
/// environment variables are reported together in one error, before any brief is read.
///
/// # Secrets
/// The `Debug` output of every settings struct that holds a credential prints
/// `<redacted>` in its place, so `?settings` is safe to log.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use creative_pipeline_core::compose::{BackoffSchedule, PollPolicy};
use creative_pipeline_core::config::PipelineOptions;
use serde::Deserialize;
use tracing::{error, info};

use crate::bannerbear::DEFAULT_BANNERBEAR_BASE_URL;
use crate::firefly::{DEFAULT_GENERATE_URL, DEFAULT_TOKEN_URL};

pub const DEFAULT_AWS_REGION: &str = "us-east-1";

const REDACTED: &str = "<redacted>";

/// Optional YAML settings file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub staging_dir: Option<PathBuf>,
    pub campaigns_root: Option<PathBuf>,
    pub link_ttl_secs: Option<u64>,
    pub polling: PollingSection,
    pub endpoints: EndpointsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingSection {
    pub intervals_secs: Option<Vec<u64>>,
    pub fallback_secs: Option<u64>,
    pub budget_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointsSection {
    pub adobe_token_url: Option<String>,
    pub firefly_generate_url: Option<String>,
    pub bannerbear_base_url: Option<String>,
}

#[derive(Clone)]
pub struct StorageSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint; path-style addressing is used when set.
    pub endpoint: Option<String>,
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("access_key_id", &REDACTED)
            .field("secret_access_key", &REDACTED)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Clone)]
pub struct FireflySettings {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub generate_url: String,
}

impl fmt::Debug for FireflySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FireflySettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .field("token_url", &self.token_url)
            .field("generate_url", &self.generate_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct BannerbearSettings {
    pub api_key: String,
    /// Template set rendered by every composition job.
    pub collection_id: String,
    pub base_url: String,
}

impl fmt::Debug for BannerbearSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BannerbearSettings")
            .field("api_key", &REDACTED)
            .field("collection_id", &self.collection_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Everything a run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageSettings,
    pub firefly: FireflySettings,
    pub bannerbear: BannerbearSettings,
    pub pipeline: PipelineOptions,
}

/// Load the YAML file if given, then the environment secrets, and merge them.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(path) => load_file_config(path)?,
        None => {
            info!("No config file given, using defaults");
            FileConfig::default()
        }
    };
    let settings = settings_from(file, &EnvLookup)?;
    info!(settings = ?settings, "Settings loaded");
    Ok(settings)
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // An empty file is a valid, all-defaults config.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Source of environment values; the process environment outside of tests.
pub trait Lookup {
    fn get(&self, name: &str) -> Option<String>;
}

pub struct EnvLookup;

impl Lookup for EnvLookup {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Collects required values, remembering every missing name.
struct Required<'a, L: ?Sized> {
    lookup: &'a L,
    missing: Vec<&'static str>,
}

impl<'a, L: Lookup + ?Sized> Required<'a, L> {
    fn take(&mut self, name: &'static str) -> String {
        match self.lookup.get(name) {
            Some(value) => value,
            None => {
                self.missing.push(name);
                String::new()
            }
        }
    }
}

pub fn settings_from<L: Lookup + ?Sized>(file: FileConfig, lookup: &L) -> Result<Settings> {
    let mut env = Required {
        lookup,
        missing: Vec::new(),
    };
    let access_key_id = env.take("AWS_ACCESS_KEY_ID");
    let secret_access_key = env.take("AWS_SECRET_ACCESS_KEY");
    let bucket = env.take("AWS_S3_BUCKET");
    let client_id = env.take("ADOBE_CLIENT_ID");
    let client_secret = env.take("ADOBE_CLIENT_SECRET");
    let api_key = env.take("BANNERBEAR_API_KEY");
    let collection_id = env.take("BANNERBEAR_COLLECTION_ID");

    if !env.missing.is_empty() {
        error!(missing = ?env.missing, "Required environment variables are not set");
        return Err(anyhow!(
            "Missing required environment variables: {}",
            env.missing.join(", ")
        ));
    }

    let defaults = PipelineOptions::default();
    let default_schedule = BackoffSchedule::default();
    let schedule = match (file.polling.intervals_secs, file.polling.fallback_secs) {
        (None, None) => default_schedule,
        (intervals, fallback) => BackoffSchedule::new(
            intervals
                .map(|secs| secs.into_iter().map(Duration::from_secs).collect())
                .unwrap_or_else(|| default_schedule.intervals().to_vec()),
            fallback
                .map(Duration::from_secs)
                .unwrap_or_else(|| default_schedule.fallback()),
        ),
    };
    let polling = PollPolicy {
        schedule,
        budget: file
            .polling
            .budget_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.polling.budget),
    };

    let pipeline = PipelineOptions {
        staging_dir: file.staging_dir.unwrap_or(defaults.staging_dir),
        campaigns_root: file.campaigns_root.unwrap_or(defaults.campaigns_root),
        link_ttl: file
            .link_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.link_ttl),
        generated_lookup_limit: defaults.generated_lookup_limit,
        polling,
    };

    Ok(Settings {
        storage: StorageSettings {
            access_key_id,
            secret_access_key,
            bucket,
            region: lookup
                .get("AWS_REGION")
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            endpoint: lookup.get("AWS_S3_ENDPOINT"),
        },
        firefly: FireflySettings {
            client_id,
            client_secret,
            token_url: file
                .endpoints
                .adobe_token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            generate_url: file
                .endpoints
                .firefly_generate_url
                .unwrap_or_else(|| DEFAULT_GENERATE_URL.to_string()),
        },
        bannerbear: BannerbearSettings {
            api_key,
            collection_id,
            base_url: file
                .endpoints
                .bannerbear_base_url
                .unwrap_or_else(|| DEFAULT_BANNERBEAR_BASE_URL.to_string()),
        },
        pipeline,
    })
}
