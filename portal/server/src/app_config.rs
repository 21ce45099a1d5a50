use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::{io, path::PathBuf};
use time::macros::format_description;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    EnvFilter,
};
use url::Url;
use workstudy::{
    persistence::{FileBackend, MemoryBackend, PersistenceAdapter},
    projection::DEFAULT_HOURLY_RATE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One JSON file per table under the data directory
    File,
    /// Process memory only, lost on exit
    Memory,
}

#[derive(Parser, Debug, Clone, Serialize)]
pub struct StorageConfig {
    /// Where tables are persisted
    #[arg(long, env = "PORTAL_BACKEND", value_enum, default_value = "file")]
    pub backend: BackendKind,

    /// Data directory for the file backend
    #[arg(long, env = "PORTAL_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn adapter(&self) -> io::Result<PersistenceAdapter> {
        Ok(match self.backend {
            BackendKind::File => PersistenceAdapter::new(FileBackend::new(&self.data_dir)?),
            BackendKind::Memory => PersistenceAdapter::new(MemoryBackend::new()),
        })
    }
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(flatten)]
    pub storage: StorageConfig,

    #[arg(long, env = "JSON_RPC_HOST", default_value = "0.0.0.0")]
    pub json_rpc_host: String,

    #[arg(long, env = "JSON_RPC_PORT", default_value = "3030")]
    pub json_rpc_port: u16,

    /// Hourly rate used for student earnings estimates
    #[arg(long, env = "HOURLY_RATE", default_value_t = DEFAULT_HOURLY_RATE)]
    pub hourly_rate: f64,
}

impl AppConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.json_rpc_host, self.json_rpc_port)
    }
}

/// Where a client reaches the portal service.
#[derive(Parser, Debug, Clone, Serialize)]
pub struct RemoteConfig {
    #[arg(long, env = "PORTAL_PROTOCOL", default_value = "ws")]
    pub portal_protocol: String,

    /// Portal host
    #[arg(long, env = "PORTAL_HOST", default_value = "localhost")]
    pub portal_host: String,

    /// Portal port
    #[arg(long, env = "PORTAL_PORT", default_value = "3030")]
    pub portal_port: String,
}

impl RemoteConfig {
    pub fn portal_url(&self) -> Result<Url, url::ParseError> {
        let portal_url = format!(
            "{}://{}:{}",
            self.portal_protocol, self.portal_host, self.portal_port
        );
        Url::parse(&portal_url)
    }
}

pub fn init_console_subscriber() {
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day]T[hour repr:24]:[minute]:[second].[subsecond digits:3]Z"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(timer)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = AppConfig::parse_from(["portal-server"]);
        assert_eq!(cfg.storage.backend, BackendKind::File);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:3030");
        assert_eq!(cfg.hourly_rate, DEFAULT_HOURLY_RATE);
    }

    #[test]
    fn memory_backend_flag() {
        let cfg = AppConfig::parse_from(["portal-server", "--backend", "memory"]);
        assert_eq!(cfg.storage.backend, BackendKind::Memory);
        assert!(cfg.storage.adapter().is_ok());
    }

    #[test]
    fn remote_url() {
        let cfg = RemoteConfig {
            portal_protocol: "ws".to_string(),
            portal_host: "portal.local".to_string(),
            portal_port: "4000".to_string(),
        };
        assert_eq!(cfg.portal_url().unwrap().as_str(), "ws://portal.local:4000/");
    }
}
