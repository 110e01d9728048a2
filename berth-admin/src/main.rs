use berth_admin::{build_engine, commands, Cli};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "berth_admin=info,berth_allocation=info,berth_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match berth_store::Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: failed to load config: {}", err);
            return ExitCode::from(berth_admin::error::EXIT_INTERNAL);
        }
    };

    let engine = match build_engine(&config).await {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(berth_admin::error::EXIT_INTERNAL);
        }
    };

    match commands::run(&engine, &config.pool, cli.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {}", err);
                ExitCode::from(berth_admin::error::EXIT_INTERNAL)
            }
        },
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
