/// LoudCal Daemon - loudness compensation host
use clap::{Parser, Subcommand};
use loudcal_daemon::{commands, config::DaemonConfig, SetArgs};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "loudcal-daemon")]
#[command(about = "Loudness compensation and calibration daemon", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./loudcal.toml when present)
    #[arg(short, long, global = true, env = "LOUDCAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the DSP config file and keep the engine running until Ctrl-C
    Watch,
    /// Print the profile, gain breakdown and selected filter as JSON
    Status,
    /// Change profile settings and write the DSP configuration
    Set(SetArgs),
    /// Single-point calibration from a meter reading
    CalibratePoint {
        /// SPL reading from the meter
        #[arg(long)]
        measured: f32,
        /// SPL the system should have produced
        #[arg(long)]
        expected: f32,
    },
    /// Forget calibration results
    ResetCalibration,
    /// Save target, reference, offset and max SPL to a slot (1-3)
    SaveSlot {
        slot: u8,
    },
    /// Restore a saved slot (1-3)
    LoadSlot {
        slot: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "loudcal_daemon=info,loudcal_engine=info,loudcal_config=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Watch => {
            tracing::info!("Starting LoudCal daemon");
            tracing::info!("DSP root: {}", config.paths.dsp_root.display());
            commands::watch(&config).await?;
        }
        Commands::Status => {
            let controller = commands::open_controller(&config)?;
            let report = commands::status(&controller)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Set(args) => {
            let mut controller = commands::open_controller(&config)?;
            commands::apply_settings(&mut controller, &args)?;
            println!("Target: {:.1} phon", controller.target_phon());
            println!("Gain: {:.2} dB", controller.gain_breakdown().total_gain_db);
        }
        Commands::CalibratePoint { measured, expected } => {
            let mut controller = commands::open_controller(&config)?;
            let summary = commands::calibrate_point(&mut controller, measured, expected)?;
            println!("{}", summary);
        }
        Commands::ResetCalibration => {
            let mut controller = commands::open_controller(&config)?;
            commands::reset_calibration(&mut controller)?;
            println!("Calibration reset");
        }
        Commands::SaveSlot { slot } => {
            let controller = commands::open_controller(&config)?;
            commands::save_slot(&controller, slot)?;
            println!("Saved profile to slot {}", slot);
        }
        Commands::LoadSlot { slot } => {
            let mut controller = commands::open_controller(&config)?;
            commands::load_slot(&mut controller, slot)?;
            println!("Loaded profile from slot {}", slot);
        }
    }

    Ok(())
}
