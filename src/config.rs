//! Start-up configuration.
//!
//! Everything is fixed once at start-up: table names, which API surface is
//! exposed, and how the binary runs. Each flag can also come from the
//! environment, which is how a Lambda deployment sets them.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

use crate::collection::Catalog;

/// Which revision of the API to expose.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Surface {
    /// Satsang counts and upcoming events are read by scanning the whole
    /// table, the kids roster is exposed, and responses carry CORS headers.
    #[default]
    Roster,
    /// Satsang counts are read by `mandirName` + `date` and upcoming events
    /// by `mandirName`; no kids roster and no CORS headers.
    Keyed,
}

impl Surface {
    pub fn cors(self) -> bool {
        matches!(self, Self::Roster)
    }
}

/// How the binary receives requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum RunMode {
    /// Serve invocations from the Lambda runtime API.
    #[default]
    Lambda,
    /// Serve plain HTTP on `--listen`, for local development.
    Serve,
}

/// Where records are kept.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum StoreBackend {
    #[default]
    Dynamodb,
    /// Process-local tables; contents vanish on exit.
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mandir-api", about = "Mandir records API")]
pub struct Config {
    // === Store ===
    /// AWS region of the tables
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// DynamoDB endpoint override (e.g. LocalStack)
    #[arg(long, env = "DYNAMODB_ENDPOINT")]
    pub endpoint_url: Option<String>,

    /// Storage backend
    #[arg(long = "store", env = "STORE_BACKEND", default_value = "dynamodb", value_enum)]
    pub store: StoreBackend,

    #[arg(long, env = "LEADER_INFO_TABLE", default_value = "leader-info")]
    pub leader_info_table: String,

    #[arg(long, env = "SATSANG_COUNT_TABLE", default_value = "satsang-count")]
    pub satsang_count_table: String,

    #[arg(long, env = "UPCOMING_EVENTS_TABLE", default_value = "upcoming-events")]
    pub upcoming_events_table: String,

    #[arg(long, env = "KIDS_TABLE", default_value = "kids-list")]
    pub kids_table: String,

    // === API ===
    /// API revision to expose
    #[arg(long, env = "API_SURFACE", default_value = "roster", value_enum)]
    pub surface: Surface,

    /// Upper bound on pages followed by a single scan-all
    #[arg(long, env = "MAX_SCAN_PAGES", default_value = "1000")]
    pub max_scan_pages: usize,

    // === Process ===
    #[arg(long, env = "RUN_MODE", default_value = "lambda", value_enum)]
    pub mode: RunMode,

    /// Listen address for `--mode serve`
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,
}

impl Config {
    /// Validate the configuration at startup
    pub fn validate(&self) -> Result<(), String> {
        if self.max_scan_pages == 0 {
            return Err("max_scan_pages must be > 0".to_string());
        }
        for (flag, table) in [
            ("leader-info-table", &self.leader_info_table),
            ("satsang-count-table", &self.satsang_count_table),
            ("upcoming-events-table", &self.upcoming_events_table),
            ("kids-table", &self.kids_table),
        ] {
            if table.trim().is_empty() {
                return Err(format!("--{flag} must not be empty"));
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            leader_info: self.leader_info_table.clone(),
            satsang_count: self.satsang_count_table.clone(),
            upcoming_events: self.upcoming_events_table.clone(),
            kids: self.kids_table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("mandir-api").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_deployed_tables() {
        let config = parse(&["--region", "us-east-1"]);
        assert_eq!(config.catalog(), Catalog::default());
        assert_eq!(config.surface, Surface::Roster);
        assert_eq!(config.max_scan_pages, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn surface_and_tables_are_overridable() {
        let config = parse(&["--surface", "keyed", "--kids-table", "kids-dev", "--mode", "serve"]);
        assert_eq!(config.surface, Surface::Keyed);
        assert!(!config.surface.cors());
        assert_eq!(config.catalog().kids, "kids-dev");
        assert_eq!(config.mode, RunMode::Serve);
    }

    #[test]
    fn zero_page_cap_is_rejected() {
        let config = parse(&["--max-scan-pages", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_table_name_is_rejected() {
        let config = parse(&["--leader-info-table", " "]);
        assert_eq!(config.validate().unwrap_err(), "--leader-info-table must not be empty");
    }
}
