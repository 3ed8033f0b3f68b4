use std::io::Write;

use chrono::Utc;
use log::info;

/// Logger setup shared by the binaries.
pub struct StudmatchLogger;

impl StudmatchLogger {
    /// `RUST_LOG` wins over `default_level`. Safe to call more than once.
    pub fn init(default_level: &str) {
        let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] [{}] [{}:{}] {}",
                    Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .try_init();

        if result.is_ok() {
            info!("studmatch logger initialized");
        }
    }
}
