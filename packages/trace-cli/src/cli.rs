use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tracescan",
    version,
    about = "Produce batch code capture session harness",
    long_about = "Drive the camera capture session against a scripted camera.\n\
                  Scenario files describe permission answers, warm-up and the payload in each frame."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one capture session against a simulated camera
    Simulate(SimulateArgs),
    /// List every scan error kind with its user-facing message
    Errors(ErrorsArgs),
    /// Show version, platform and the effective default configuration
    Info(InfoArgs),
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Camera scenario file (JSON)
    #[arg(long)]
    pub scenario: String,

    /// Sampling cadence in milliseconds (overrides $TRACE_SCAN_INTERVAL_MS)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this long without a payload (overrides $TRACE_SCAN_IDLE_TIMEOUT_MS)
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Do not retry with any camera when the rear camera fails
    #[arg(long, default_value_t = false)]
    pub no_fallback: bool,

    /// Print the final session snapshot as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Output file for the JSON snapshot (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct ErrorsArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
