use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prague_cc::congestion::CongestionDebugState;
use prague_cc::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "prague-replay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ACE option for a CE byte count as hex
    Encode {
        ce_bytes: u32,
    },

    /// Decode a hex-encoded ACE option
    Decode {
        hex: String,
    },

    /// Drive a congestion session from a JSON scenario file
    Replay {
        scenario: PathBuf,
    },
}

#[derive(Deserialize)]
struct Scenario {
    /// Overrides the --config file when present
    #[serde(default)]
    config: Option<PragueConfig>,
    steps: Vec<ScenarioStep>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScenarioStep {
    Ace {
        ce_bytes: u32,
    },
    Options {
        hex: String,
    },
    Ack {
        #[serde(default = "one_segment")]
        segments: u32,
        #[serde(default)]
        rtt_ms: f64,
        bytes: u32,
    },
    State {
        state: CongestionState,
        #[serde(default)]
        bytes_in_flight: u32,
    },
    Event {
        event: CaEvent,
    },
    RcvNxt {
        seq: u32,
    },
}

fn one_segment() -> u32 {
    1
}

#[derive(Serialize)]
struct StepReport {
    step: usize,
    #[serde(flatten)]
    state: CongestionDebugState,
    control_packets: Vec<ControlPacket>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Encode { ce_bytes } => {
            println!("{}", hex::encode(AceOption::new(ce_bytes).encode()));
        }

        Commands::Decode { hex } => {
            let bytes = hex::decode(hex.trim()).context("Invalid hex input")?;
            let option = AceOption::decode(&bytes)?;
            println!("{}", option);
        }

        Commands::Replay { scenario } => {
            let base = match cli.config {
                Some(path) => PragueConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => PragueConfig::default(),
            };
            run_replay(&scenario, base)?;
        }
    }

    Ok(())
}

fn run_replay(path: &Path, base: PragueConfig) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&contents).context("Invalid scenario")?;

    let config = scenario.config.unwrap_or(base);
    let mut session = CongestionSession::new(&config)?;
    info!("Replaying {} steps with {}", scenario.steps.len(), config.algorithm);

    for (index, step) in scenario.steps.into_iter().enumerate() {
        apply_step(&mut session, step)?;

        let control_packets = std::iter::from_fn(|| session.poll_control_packet()).collect();
        let report = StepReport {
            step: index,
            state: session.debug_state(),
            control_packets,
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}

fn apply_step(session: &mut CongestionSession, step: ScenarioStep) -> Result<()> {
    match step {
        ScenarioStep::Ace { ce_bytes } => session.on_ace_option(AceOption::new(ce_bytes)),
        ScenarioStep::Options { hex } => {
            let options = hex::decode(hex.trim()).context("Invalid option hex")?;
            if find_ace_option(&options).is_none() {
                warn!("No usable ACE option in {}", hex);
            }
            session.on_segment_options(&options);
        }
        ScenarioStep::Ack { segments, rtt_ms, bytes } => {
            let rtt = Duration::from_secs_f64(rtt_ms.max(0.0) / 1000.0);
            session.on_ack(segments, rtt, bytes);
        }
        ScenarioStep::State { state, bytes_in_flight } => {
            session.set_congestion_state(state, bytes_in_flight);
        }
        ScenarioStep::Event { event } => session.on_event(event),
        ScenarioStep::RcvNxt { seq } => session.set_rcv_nxt(SequenceNumber(seq)),
    }
    Ok(())
}
