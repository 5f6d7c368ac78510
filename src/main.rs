use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};

use statwidget::config::{self, Config, load_config, load_config_from_path};
use statwidget::event::{CLOCK_INTERVAL, Event, EventHandler, is_quit};
use statwidget::logging;
use statwidget::pipeline::{
    SamplingLoop, SnapshotReceiver, channel, deliver, panic_is_recovered,
};
use statwidget::system::gpu::GpuStrategy;
use statwidget::system::host::platform_label;
use statwidget::system::sampler::MetricsSampler;
use statwidget::ui::{self, dashboard::Dashboard};

/// Logs past this size are cleared at startup.
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Parser)]
#[command(
    name = "statwidget",
    about = "Live CPU, memory, GPU and battery gauges with a clock"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Take a single snapshot, print it as JSON and exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Write diagnostics to this file instead of the default cache location.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if cli.once {
        logging::init_stderr_logging(&config.logging.level)?;
        return run_once(&config);
    }

    init_logging(&cli, &config);

    // GPU detection may block on subprocess queries; do it before the
    // terminal switches to the alternate screen.
    let sampler = MetricsSampler::for_host(config.gpu.settings());
    let show_gpu = sampler.gpu_strategy() != GpuStrategy::None;
    let show_battery = sampler.battery_present();
    info!(
        strategy = ?sampler.gpu_strategy(),
        battery = show_battery,
        "metric sources ready"
    );

    let (dispatcher, snapshots) = channel(config.dispatch.queue_capacity);
    let mut sampling = SamplingLoop::new();
    sampling.start(sampler, dispatcher)?;

    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Sampler ticks and renderer calls recover from their own panics;
        // keep the screen.
        if panic_is_recovered() {
            tracing::error!(%panic_info, "recovered panic");
            return;
        }
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut dashboard = Dashboard::new(show_gpu, show_battery, platform_label());
    let result = run(&mut terminal, &mut dashboard, snapshots).await;

    ratatui::restore();
    sampling.shutdown();
    info!(snapshots = dashboard.snapshots_seen, "dashboard closed");

    result
}

async fn run(
    terminal: &mut ratatui::DefaultTerminal,
    dashboard: &mut Dashboard,
    mut snapshots: SnapshotReceiver,
) -> Result<()> {
    let mut events = EventHandler::new(CLOCK_INTERVAL);
    let mut sampler_alive = true;

    terminal.draw(|frame| ui::draw(frame, dashboard, Local::now()))?;

    while dashboard.running {
        let should_draw = tokio::select! {
            maybe_snapshot = snapshots.recv(), if sampler_alive => {
                match maybe_snapshot {
                    Some(snapshot) => {
                        // A failed delivery is logged by `deliver`; the
                        // dashboard keeps its previous values.
                        let _ = deliver(dashboard, snapshot);
                        true
                    }
                    None => {
                        warn!("sampling loop ended, gauges frozen");
                        sampler_alive = false;
                        false
                    }
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Event::Key(key)) => {
                        if is_quit(&key) {
                            dashboard.quit();
                        }
                        false
                    }
                    Some(Event::Resize) | Some(Event::Clock) => true,
                    None => {
                        dashboard.quit();
                        false
                    }
                }
            }
        };

        if should_draw && dashboard.running {
            terminal.draw(|frame| ui::draw(frame, dashboard, Local::now()))?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) {
    let path = cli
        .log_file
        .clone()
        .or_else(|| config.logging.file.clone())
        .or_else(config::default_log_path);

    // Nothing may reach stderr while the dashboard owns the terminal, so a
    // missing or unwritable log location just means no diagnostics.
    if let Some(path) = path {
        let _ = logging::truncate_if_larger(&path, MAX_LOG_BYTES);
        let _ = logging::init_file_logging(&path, &config.logging.level);
    }
}

fn run_once(config: &Config) -> Result<()> {
    let mut sampler = MetricsSampler::for_host(config.gpu.settings());
    let snapshot = sampler.sample();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

