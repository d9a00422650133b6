use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Rules for the tier hierarchy.
///
/// This is the single place where the validators are parameterised;
/// `MirrorTopology::new` builds them from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyConfig {
    /// Highest tier a mirror may have (default: 2).
    #[serde(default = "default_max_tier")]
    pub max_tier: u8,

    /// Lowest tier allowed as an upstream (default: 0).
    #[serde(default)]
    pub min_upstream_tier: u8,

    /// Highest tier allowed as an upstream (default: 1).
    #[serde(default = "default_max_upstream_tier")]
    pub max_upstream_tier: u8,
}

fn default_max_tier() -> u8 {
    2
}

fn default_max_upstream_tier() -> u8 {
    1
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_tier: default_max_tier(),
            min_upstream_tier: 0,
            max_upstream_tier: default_max_upstream_tier(),
        }
    }
}

impl TopologyConfig {
    /// Reject configurations whose upstream range is empty or exceeds the
    /// tiers that exist.
    pub fn validate(&self) -> Result<()> {
        if self.min_upstream_tier > self.max_upstream_tier {
            bail!(
                "upstream tier range {}..={} is empty",
                self.min_upstream_tier,
                self.max_upstream_tier
            );
        }
        if self.max_upstream_tier > self.max_tier {
            bail!(
                "upstream tier {} exceeds max tier {}",
                self.max_upstream_tier,
                self.max_tier
            );
        }
        Ok(())
    }
}

/// Report rendering for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub manifest: PathBuf,
    pub format: OutputFormat,
    pub topology: TopologyConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Validate a mirror network manifest")]
pub struct Args {
    /// Manifest file to check (overrides MIRROR_TOPOLOGY_FILE)
    pub manifest: Option<PathBuf>,

    /// Highest tier a mirror may have (overrides MIRROR_TOPOLOGY_MAX_TIER)
    #[arg(long)]
    pub max_tier: Option<u8>,

    /// Lowest tier that may serve as an upstream (overrides MIRROR_TOPOLOGY_MIN_UPSTREAM_TIER)
    #[arg(long)]
    pub min_upstream_tier: Option<u8>,

    /// Highest tier that may serve as an upstream (overrides MIRROR_TOPOLOGY_MAX_UPSTREAM_TIER)
    #[arg(long)]
    pub max_upstream_tier: Option<u8>,

    /// Report format (overrides MIRROR_TOPOLOGY_FORMAT)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        Self::from_sources(args, |key| env::var(key))
    }

    /// Merge `args` over values looked up with `var`.
    fn from_sources<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_manifest = env_value(&var, "MIRROR_TOPOLOGY_FILE")?.map(PathBuf::from);
        let env_max_tier = env_u8(&var, "MIRROR_TOPOLOGY_MAX_TIER")?;
        let env_min_upstream_tier = env_u8(&var, "MIRROR_TOPOLOGY_MIN_UPSTREAM_TIER")?;
        let env_max_upstream_tier = env_u8(&var, "MIRROR_TOPOLOGY_MAX_UPSTREAM_TIER")?;
        let env_format = match env_value(&var, "MIRROR_TOPOLOGY_FORMAT")? {
            Some(value) => Some(
                OutputFormat::from_str(&value, true)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("parsing MIRROR_TOPOLOGY_FORMAT value `{}`", value))?,
            ),
            None => None,
        };

        // --- Merge ---
        let Some(manifest) = args.manifest.or(env_manifest) else {
            bail!("no manifest given; pass a path or set MIRROR_TOPOLOGY_FILE");
        };

        let mut topology = TopologyConfig::default();
        if let Some(max_tier) = args.max_tier.or(env_max_tier) {
            topology.max_tier = max_tier;
        }
        if let Some(min_upstream_tier) = args.min_upstream_tier.or(env_min_upstream_tier) {
            topology.min_upstream_tier = min_upstream_tier;
        }
        if let Some(max_upstream_tier) = args.max_upstream_tier.or(env_max_upstream_tier) {
            topology.max_upstream_tier = max_upstream_tier;
        }
        topology.validate()?;

        Ok(Self {
            manifest,
            format: args.format.or(env_format).unwrap_or(OutputFormat::Text),
            topology,
        })
    }
}

fn env_value<F>(var: &F, key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {key}")),
    }
}

fn env_u8<F>(var: &F, key: &str) -> Result<Option<u8>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    env_value(var, key)?
        .map(|value| {
            value
                .parse::<u8>()
                .with_context(|| format!("parsing {key} value `{value}`"))
        })
        .transpose()
}
