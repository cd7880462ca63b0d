// ChatSleuth - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading (platform config dir or --config)
// 3. Logging initialisation (debug mode support)
// 4. Running the chat monitor and printing the stream to stdout

use chatsleuth::app::monitor::ChatMonitor;
use chatsleuth::app::notifier::Headless;
use chatsleuth::core::filter::ChannelFilter;
use chatsleuth::core::model::{Category, ChatEvent, TailProgress};
use chatsleuth::platform::config::{self, AppConfig, PlatformPaths};
use chatsleuth::platform::sound::FfplayPlayer;
use chatsleuth::ui::console;
use chatsleuth::util::{self, constants, error::ChatSleuthError};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// ChatSleuth - live chat log monitor.
///
/// Follows a game client's chat log, classifies each new line by channel and
/// alerts on incoming whispers.
#[derive(Parser, Debug)]
#[command(name = "ChatSleuth", version, about)]
struct Cli {
    /// Chat log to follow (overrides [log] path in config.toml).
    log_path: Option<PathBuf>,

    /// Configuration file to use instead of the platform default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Print events as JSON lines instead of plain text.
    #[arg(long)]
    json: bool,

    /// Disable notification sound and attention requests.
    #[arg(long)]
    mute: bool,

    /// Fire a simulated incoming whisper on startup to check sound settings.
    #[arg(long = "test-whisper")]
    test_whisper: bool,

    /// Print only these channels (comma-separated, e.g. whisper,party).
    /// History and notifications still cover every channel.
    #[arg(long, value_delimiter = ',', value_parser = parse_category)]
    only: Vec<Category>,
}

fn parse_category(label: &str) -> Result<Category, String> {
    Category::from_label(label).ok_or_else(|| {
        let known: Vec<&str> = Category::all().iter().map(Category::label).collect();
        format!("unknown channel '{label}' (expected one of: {})", known.join(", "))
    })
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "ChatSleuth exiting with error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ChatSleuthError> {
    let (mut config, warnings) = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    // Logging comes after config so [logging] level can apply.
    util::logging::init(cli.debug, config.log_level.as_deref());
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "ChatSleuth starting"
    );

    if cli.mute {
        config.notify_enabled = false;
    }

    let Some(log_path) = cli.log_path.clone().or_else(|| config.log_path.clone()) else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "no chat log given: pass LOG_PATH or set [log] path in config.toml",
            )
            .exit();
    };

    run_monitor(config, log_path, &cli)
}

fn run_monitor(config: AppConfig, log_path: PathBuf, cli: &Cli) -> Result<(), ChatSleuthError> {
    let poll = Duration::from_millis(config.poll_interval_ms);
    let player = Arc::new(FfplayPlayer::from_config(&config));
    let mut monitor = ChatMonitor::new(config, player, Arc::new(Headless))?;
    if !cli.only.is_empty() {
        monitor.filter = ChannelFilter::only(&cli.only);
        tracing::info!(channels = ?cli.only, "Channel filter applied");
    }

    monitor.start(&log_path);

    if cli.test_whisper {
        let event = monitor.simulate_whisper(
            constants::TEST_WHISPER_SPEAKER,
            constants::TEST_WHISPER_MESSAGE,
        );
        print_visible(&monitor, &event, cli.json);
    }

    let mut title = monitor.window_title();
    while monitor.is_active() {
        let messages = monitor.pump();
        let idle = messages.is_empty();
        for message in &messages {
            if let Some(event) = message.to_history_event() {
                print_visible(&monitor, &event, cli.json);
            }
            if let TailProgress::Notice { message, severity } = message {
                tracing::debug!(severity = %severity, message = %message, "Notice");
            }
        }

        let current = monitor.window_title();
        if current != title {
            tracing::debug!(title = %current, "Title updated");
            title = current;
        }

        if idle {
            std::thread::sleep(poll);
        }
    }

    tracing::info!(events = monitor.history().len(), "ChatSleuth finished");
    Ok(())
}

fn print_visible(monitor: &ChatMonitor, event: &ChatEvent, json: bool) {
    if monitor.filter.is_visible(event.category()) {
        print_event(event, json);
    }
}

fn print_event(event: &ChatEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialise event"),
        }
    } else {
        println!("{}", console::format_event(event));
    }
}
