use anyhow::Result;
use mirror_topology::{
    InMemoryMirrorStore, MirrorTopology,
    config::{AppConfig, OutputFormat},
    manifest::Manifest,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting mirror-topology with config: {:?}", cfg);

    // --- Load manifest ---
    let manifest = Manifest::from_path(&cfg.manifest)?;
    tracing::debug!("Loaded {} mirror entries", manifest.mirrors.len());

    // --- Apply through a fresh topology ---
    let mut topology = MirrorTopology::new(InMemoryMirrorStore::new(), &cfg.topology);
    let report = manifest.apply(&mut topology);

    match cfg.format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!("{} entries rejected", report.errors.len());
        Ok(ExitCode::FAILURE)
    }
}
