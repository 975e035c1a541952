#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, CliConfig, SinkKind};
use surge::{
    DiscardConnector, LoadRunner, RunConfig, RunReport, SinkConnector, StdoutConnector,
    TemplateBuilder,
};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry(&config.log_level)?;
    log_startup_info(&config);

    let builder = TemplateBuilder::new(config.template);
    let report = match config.sink {
        SinkKind::Stdout => run(
            config.run,
            builder,
            StdoutConnector::new(config.broker_options),
        )?,
        SinkKind::Discard => run(config.run, builder, DiscardConnector)?,
    };

    tracing::info!(
        generated = report.generated,
        dispatched = report.dispatched,
        elapsed = ?report.elapsed,
        "done"
    );
    Ok(())
}

fn run<C>(config: RunConfig, builder: TemplateBuilder, connector: C) -> anyhow::Result<RunReport>
where
    C: SinkConnector,
{
    let report = LoadRunner::new(config, builder, connector).run()?;
    Ok(report)
}

fn log_startup_info(config: &CliConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting load run: {} msg/s for {}s into `{}` via {:?} sink",
            config.run.rps,
            config.run.duration_sec,
            config.run.topic,
            config.sink
        );
    }
}
