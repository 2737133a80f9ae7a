use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gatecheck", version, about = "Access control scan engine for web applications")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an access control scan against a recorded session
    Scan(ScanArgs),
    /// Start the HTTP REST API server
    Serve(ServeArgs),
    /// Validate a session file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// YAML session file with contexts, users, nodes and access rules
    #[arg(short, long)]
    pub session: String,

    /// Context id to scan
    #[arg(short, long)]
    pub context: i64,

    /// Comma-separated user ids to scan as (default: every registered user)
    #[arg(short, long)]
    pub users: Option<String>,

    /// Also scan without any authenticated identity
    #[arg(long)]
    pub include_unauthenticated: bool,

    /// Raise alerts for illegal access results
    #[arg(long)]
    pub alerts: bool,

    /// Alert risk level: info, low, medium, high
    #[arg(long, default_value = "medium")]
    pub risk: String,

    /// Write an HTML report to this path after the scan
    #[arg(short, long)]
    pub report: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// YAML session file with contexts, users, nodes and access rules
    #[arg(short, long)]
    pub session: String,

    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Session file to validate
    pub session: String,
}
