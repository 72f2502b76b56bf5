use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper::config::GatekeeperConfig;
use gatekeeper::simulation::{MessageOutcome, Simulation, SimulationReport};

/// Replay a simulated message stream through an admission policy.
#[derive(Debug, Parser)]
#[command(name = "gatekeeper", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Admission policy to simulate
    #[arg(short, long, value_enum, default_value_t = PolicyKind::Throttle)]
    policy: PolicyKind,

    /// Messages per batch (overrides the configuration file)
    #[arg(short, long)]
    messages: Option<u32>,

    /// Seed for simulated delays (overrides the configuration file)
    #[arg(long)]
    seed: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    TokenBucket,
    Throttle,
    SlidingWindow,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(&args.log_level, args.json_logs);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration, then apply command-line overrides
    let mut config = match &args.config {
        Some(path) => GatekeeperConfig::from_file(path)?,
        None => GatekeeperConfig::default(),
    };
    if let Some(messages) = args.messages {
        config.simulation.messages = messages;
    }
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }
    info!(policy = ?args.policy, "Configuration loaded");

    // Replay the message stream through the selected policy
    let mut simulation = Simulation::new(config.simulation.clone())?;
    let report = match args.policy {
        PolicyKind::TokenBucket => simulation.run(&mut config.token_bucket.build()?),
        PolicyKind::Throttle => simulation.run(&mut config.throttle.build()?),
        PolicyKind::SlidingWindow => simulation.run(&mut config.sliding_window.build()?),
    };

    print_report(&report, config.simulation.pause_secs);
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_report(report: &SimulationReport, pause_secs: f64) {
    println!("\n=== Message stream simulation ===");
    report.batch(1).for_each(print_outcome);

    println!("\nWaiting {:.0} seconds...", pause_secs);

    println!("\n=== New message batch after waiting ===");
    report.batch(2).for_each(print_outcome);

    println!(
        "\nAdmitted {} of {} messages",
        report.admitted(),
        report.outcomes.len()
    );
}

fn print_outcome(outcome: &MessageOutcome) {
    let verdict = if outcome.allowed {
        "✓".to_string()
    } else {
        format!("× (wait {:.1}s)", outcome.wait_secs)
    };
    println!(
        "Message {:2} | User {} | {}",
        outcome.message_id, outcome.user, verdict
    );
}
