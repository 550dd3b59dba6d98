mod supervisor;

use {
    anyhow::Context,
    clap::Parser,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botbridge", about = "botbridge: Telegram to Redis pub/sub bridge", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "botbridge starting");

    let config = botbridge_config::Config::from_env().context("invalid configuration")?;
    supervisor::run(config).await
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {clap::CommandFactory, rstest::rstest};

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["botbridge"], "info", false)]
    #[case(&["botbridge", "--log-level", "debug"], "debug", false)]
    #[case(&["botbridge", "--json-logs"], "info", true)]
    fn parses_flags(#[case] args: &[&str], #[case] level: &str, #[case] json: bool) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.log_level, level);
        assert_eq!(cli.json_logs, json);
    }
}
