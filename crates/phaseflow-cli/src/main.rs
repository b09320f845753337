//! Phaseflow console entry point.

use std::error::Error;
use std::sync::Arc;

use phaseflow_cli::config::{AppConfig, LogFormat};
use phaseflow_cli::console::ConsoleCollaborators;
use phaseflow_cli::driver::{self, Driver, Outcome};
use phaseflow_core::journal::TracingJournal;
use phaseflow_engine::FlowGraphBuilder;
use phaseflow_experience::{ExperienceConfig, build_experience};
use phaseflow_flag_store::JsonFileFlagStore;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let experience = ExperienceConfig::load(config.experience_config.as_deref())?;
    let console = ConsoleCollaborators::new(
        experience.proximity_probe.clone(),
        config.session_warmup,
    );

    let builder = FlowGraphBuilder::new()
        .flag_store(Arc::new(JsonFileFlagStore::new(config.store_path.clone())))
        .journal(Arc::new(TracingJournal))
        .collaborators(console.collaborators());
    let graph = build_experience(builder, &experience)?;

    tracing::info!(
        store = %config.store_path.display(),
        tick_hz = config.tick_hz,
        "starting phaseflow; commands: {}",
        phaseflow_cli::command::Command::ALL.join(", ")
    );

    let mut flow = Driver::new(graph, console);
    let outcome = driver::run(&mut flow, BufReader::new(tokio::io::stdin()), config.frame()).await;
    flow.shutdown();

    match outcome? {
        Outcome::Finished { node } => tracing::info!(node = %node, "experience complete"),
        Outcome::Quit => tracing::info!("quit"),
        Outcome::InputClosed => tracing::info!("input closed before the experience finished"),
    }
    Ok(())
}
