mod app;
mod keys;
mod loopback;
mod tui;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use app::{App, AppOptions};
use seaway::net::DEFAULT_RECONNECT_DELAY_MS;
use seaway::world::DEFAULT_TIME_CONSTANT_SECS;
use seaway::{ClientConfig, DEFAULT_GAME_URL, InterpolationConfig, ReconnectPolicy};

const LOOPBACK_TOKEN: &str = "loopback";

#[derive(Parser)]
#[command(name = "seaway")]
#[command(about = "Realtime sync client for the naval game server")]
struct Args {
    #[arg(long, default_value = DEFAULT_GAME_URL, help = "Game server WebSocket URL")]
    url: String,

    #[arg(long, help = "Auth token sent as the `token` query parameter")]
    token: Option<String>,

    #[arg(long, help = "Run against an in-process server instead of the network")]
    loopback: bool,

    #[arg(long, default_value = "player", help = "Name used for chat and the local ship")]
    name: String,

    #[arg(long, help = "Print the world as JSON lines instead of drawing the TUI")]
    headless: bool,

    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds, help = "Exit after this long (headless only)")]
    run_for: Option<Duration>,

    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY_MS)]
    reconnect_delay_ms: u64,

    #[arg(long, default_value_t = 1.0, help = "Multiply the reconnect delay by this after each failure")]
    backoff_factor: f32,

    #[arg(long, help = "Give up after this many reconnect attempts")]
    max_attempts: Option<u32>,

    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds, help = "Send PING at this interval")]
    ping_interval: Option<Duration>,

    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIME_CONSTANT_SECS, help = "Interpolation time constant")]
    smoothing: f32,

    #[arg(long, help = "Write logs here instead of stderr")]
    log_file: Option<PathBuf>,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{}", e))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.headless)?;

    let token = match (&args.token, args.loopback) {
        (Some(token), _) => token.clone(),
        (None, true) => String::from(LOOPBACK_TOKEN),
        (None, false) => anyhow::bail!("--token is required unless --loopback is set"),
    };

    let config = client_config(&args);
    let options = AppOptions {
        url: args.url.clone(),
        token,
        name: args.name.clone(),
        loopback: args.loopback,
    };

    let mut app = App::new(options, config);
    app.connect()?;

    if args.headless {
        app::run_headless(&mut app, args.run_for)?;
    } else {
        tui::run(&mut app)?;
    }

    Ok(())
}

fn client_config(args: &Args) -> ClientConfig {
    ClientConfig {
        connection: seaway::ConnectionConfig {
            reconnect: ReconnectPolicy {
                delay_ms: args.reconnect_delay_ms,
                backoff_factor: args.backoff_factor,
                max_attempts: args.max_attempts,
                ..Default::default()
            },
            ..Default::default()
        },
        interpolation: InterpolationConfig::uniform(args.smoothing),
        ping_interval: args.ping_interval,
    }
}

/// Logs go to `log_file` when given. Otherwise they go to stderr, which the
/// TUI owns, so there they stay off unless `RUST_LOG` asks for them.
fn init_logging(log_file: Option<&Path>, headless: bool) -> anyhow::Result<()> {
    let default_filter = if headless || log_file.is_some() {
        "info"
    } else {
        "off"
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    if let Some(path) = log_file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_onto_config() {
        let args = Args::parse_from([
            "client",
            "--loopback",
            "--reconnect-delay-ms",
            "500",
            "--max-attempts",
            "4",
            "--ping-interval",
            "2.5",
            "--smoothing",
            "0.1",
        ]);

        let config = client_config(&args);
        assert_eq!(config.connection.reconnect.delay_ms, 500);
        assert_eq!(config.connection.reconnect.max_attempts, Some(4));
        assert_eq!(config.ping_interval, Some(Duration::from_millis(2500)));
        assert_eq!(config.interpolation.position_time_constant, 0.1);
        assert_eq!(args.url, DEFAULT_GAME_URL);
        assert!(args.token.is_none());
    }

    #[test]
    fn test_parse_seconds_rejects_negative() {
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("abc").is_err());
        assert_eq!(parse_seconds("0.25"), Ok(Duration::from_millis(250)));
    }
}
