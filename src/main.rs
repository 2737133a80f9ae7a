use clap::Parser;
use tracing_subscriber::EnvFilter;

use gatecheck::{cli, config, errors};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        cli::Commands::Scan(args) => cli::scan::handle_scan(args).await,
        cli::Commands::Serve(args) => cli::serve::handle_serve(args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                errors::GatecheckError::Config(_) => 2,
                errors::GatecheckError::ModeViolation(_) => 3,
                errors::GatecheckError::UnknownContext(_)
                | errors::GatecheckError::UnknownUser(_) => 4,
                errors::GatecheckError::Network(_) => 5,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn handle_validate(
    args: cli::commands::ValidateArgs,
) -> Result<(), errors::GatecheckError> {
    let path = std::path::PathBuf::from(&args.session);
    let _session = config::parse_session(&path).await?;
    println!("Session file is valid: {}", args.session);
    Ok(())
}
