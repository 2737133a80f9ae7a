use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::alerts::RiskLevel;
use crate::cli::commands::ScanArgs;
use crate::config;
use crate::errors::GatecheckError;
use crate::report::render_html;
use crate::scanner::{ScanEvent, ScanOutcome, ScanStartOptions};

pub async fn handle_scan(args: ScanArgs) -> Result<(), GatecheckError> {
    let session = config::parse_session(Path::new(&args.session)).await?;
    let manager = config::manager_from_session(&session, args.timeout)?;

    let context = manager
        .provider()
        .context(args.context)
        .ok_or(GatecheckError::UnknownContext(args.context))?;

    let users = match &args.users {
        Some(list) => {
            let ids = parse_user_ids(list)?;
            manager.resolve_users(args.context, &ids)?
        }
        None => manager.users(args.context),
    };

    let risk: RiskLevel = args.risk.parse()?;
    let options = ScanStartOptions::new(
        context,
        users,
        args.include_unauthenticated,
        args.alerts,
        risk,
    )?;

    info!(context_id = args.context, "Starting access control scan");
    let mut handle = manager.start_scan(options)?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:30.cyan/dark_gray} {pos}/{len} nodes | {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    bar.set_message(format!("Scanning context {}", args.context));

    let mut illegal = 0usize;
    while let Some(event) = handle.events.recv().await {
        match event {
            ScanEvent::ScanStarted { .. } => {}
            ScanEvent::ResultObtained { entry, .. } => {
                // The worker publishes the node count only once it is running.
                let (progress, maximum) = handle.scanner.progress();
                bar.set_length(maximum as u64);
                bar.set_position(progress as u64);
                let outcome = match entry.outcome {
                    ScanOutcome::Valid => style("valid").green(),
                    ScanOutcome::Illegal => {
                        illegal += 1;
                        style("ILLEGAL").red().bold()
                    }
                    ScanOutcome::Unknown => style("unknown").dim(),
                };
                bar.println(format!("  {} {}", outcome, entry));
            }
            ScanEvent::ScanFinished { .. } => break,
        }
    }
    bar.finish_and_clear();

    let results = handle.scanner.last_results().unwrap_or_default();
    println!(
        "{} {} results, {} illegal",
        style("Scan finished:").bold(),
        results.len(),
        if illegal > 0 {
            style(illegal.to_string()).red().bold()
        } else {
            style(illegal.to_string()).green()
        }
    );

    if let Some(path) = &args.report {
        let report = manager.last_scan_report(args.context)?;
        let path = PathBuf::from(path);
        tokio::fs::write(&path, render_html(&report)).await?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn parse_user_ids(list: &str) -> Result<Vec<i64>, GatecheckError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| GatecheckError::Config(format!("invalid user id: {}", s)))
        })
        .collect()
}
