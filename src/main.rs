use atomrouter::cli::run_cli;
use atomrouter::logging::{init_logging_with_config, LogConfig};

fn main() -> anyhow::Result<()> {
    let mut config = LogConfig::from_env();
    if std::env::var_os("ATOMR_LOG_LEVEL").is_none() {
        // keep stdout reports readable unless asked otherwise
        config.log_level = "warn".to_string();
    }
    let _guard = init_logging_with_config(&config)?;
    run_cli()
}
