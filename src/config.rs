use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub schedule_url: String,
    pub campus: String,
    pub term: String,
    pub delay_ms: u64,
    pub output_dir: PathBuf,
    pub public_dir: PathBuf,
    pub listen_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            schedule_url: env_or(
                "SCHEDULE_URL",
                "https://access.pct.edu/CMCPortal/Common/CourseSchedule.aspx",
            ),
            campus: env_or("SCHEDULE_CAMPUS", "5"),
            term: env_or("SCHEDULE_TERM", "1196"),
            delay_ms: env_or("FETCH_DELAY_MS", "500").parse()?,
            output_dir: env_or("OUTPUT_DIR", ".").into(),
            public_dir: env_or("PUBLIC_DIR", "public").into(),
            listen_addr: env_or("LISTEN_ADDR", "127.0.0.1:8080"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
