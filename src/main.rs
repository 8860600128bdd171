use clap::Parser;
use paper_trader::cli::commands::{self, SimulateArgs};
use paper_trader::cli::{Cli, Commands, OutputMode};
use paper_trader::config::AppConfig;
use paper_trader::services::TickRequest;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { .. } => init_logging(cli.json_logs),
        _ => init_logging_simple(),
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { port } => commands::run_serve(&config, port).await?,
        Commands::Tick {
            symbol,
            interval,
            lookback,
            source,
        } => {
            let request = TickRequest {
                symbol,
                interval,
                lookback,
                source,
            };
            commands::run_tick(&config, request).await?;
        }
        Commands::Simulate {
            data,
            interval,
            episodes,
            action,
            steps,
            seed,
            check,
            json,
        } => {
            let args = SimulateArgs {
                data,
                interval,
                episodes,
                action,
                steps,
                seed,
                check,
                mode: OutputMode::from_json_flag(json),
            };
            commands::run_simulate(&config, args).await?;
        }
        Commands::GenerateData { output, rows, seed } => {
            commands::run_generate_data(&output, rows, seed)?;
        }
        Commands::FetchData {
            symbol,
            interval,
            days,
            output,
        } => {
            commands::run_fetch_data(&config, &symbol, &interval, days, output).await?;
        }
        Commands::Recent { limit, json } => {
            commands::run_recent(&config, limit, OutputMode::from_json_flag(json)).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {e}");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }
    Ok(config)
}

fn init_logging(json: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,paper_trader=debug"));

    let log_dir = std::env::var("PAPER_TRADER_LOG_DIR").ok();

    // `tracing_appender::rolling::daily` panics if it can't create the initial
    // log file, so preflight writability.
    let file_layer = log_dir.as_deref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory {dir} ({e}), file logging disabled");
            return None;
        }
        let test_path = std::path::Path::new(dir).join(".paper_trader_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                // Daily rotating file appender
                let file_appender = tracing_appender::rolling::daily(dir, "paper-trader.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not write to log directory {dir} ({e}), file logging disabled");
                None
            }
        }
    });

    // Console layer
    let console_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {dir}/paper-trader.log");
    }
}

fn init_logging_simple() {
    // Minimal logging for one-shot CLI commands
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
