pub mod db;
pub mod scan;
pub mod serve;

pub fn init_logging(verbose: u8, config: &netwarden_core::Config) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => config.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match config.log_format {
        netwarden_core::config::LogFormat::Json => subscriber.json().init(),
        netwarden_core::config::LogFormat::Pretty => subscriber.init(),
    }
}
