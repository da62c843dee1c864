use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "dealings.toml";
const ENV_PREFIX: &str = "DEALINGS";

/// All run settings. Every key has a default, so an empty file (or none)
/// reproduces the stock SSW scrape.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub target: TargetSettings,
    pub fetch: FetchSettings,
    pub extract: ExtractorSettings,
    pub pipeline: PolicySettings,
    pub sinks: SinkSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetSettings {
    pub url: String,
    pub allowed_domains: Vec<String>,
    pub stock_code: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            url: "https://www.moneyweb.co.za/tools-and-data/click-a-company/SSW/".to_string(),
            allowed_domains: vec!["moneyweb.co.za".to_string(), "www.moneyweb.co.za".to_string()],
            stock_code: "SSW".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            backoff_ms: 2000,
            user_agent: concat!("dealings_scraper/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// CSS selectors and layout rules for the dealings table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub container: String,
    pub row: String,
    pub cell_group: String,
    pub beneficiary: String,
    pub price: String,
    pub header_rows: usize,
    pub columns: Vec<String>,
    pub strict_columns: bool,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            container: "div#cac-page".to_string(),
            row: ".sens-row.cac".to_string(),
            cell_group: ".col-lg-2.col-md-2".to_string(),
            beneficiary: ".col-lg-3.col-md-3".to_string(),
            price: ".col-lg-1.col-md-1.clear-padding".to_string(),
            header_rows: 2,
            columns: ["date", "deal_type", "value", "volume"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strict_columns: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Abort,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicySettings {
    pub on_row_error: ErrorPolicy,
    pub on_sink_error: ErrorPolicy,
    pub write_timeout_secs: u64,
}

impl PolicySettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            on_row_error: ErrorPolicy::Continue,
            on_sink_error: ErrorPolicy::Continue,
            write_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkSettings {
    pub console: bool,
    pub json_path: Option<PathBuf>,
    pub sqlite_path: Option<PathBuf>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            console: true,
            json_path: None,
            sqlite_path: Some(PathBuf::from("data/dealings.sqlite")),
        }
    }
}

impl Settings {
    /// Defaults, then `path` (or `./dealings.toml` if present), then
    /// `DEALINGS_<SECTION>__<KEY>` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("target.allowed_domains")
                    .with_list_parse_key("extract.columns")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_dealings_page() {
        let s = Settings::default();
        assert_eq!(s.target.stock_code, "SSW");
        assert_eq!(s.target.allowed_domains.len(), 2);
        assert_eq!(s.extract.header_rows, 2);
        assert_eq!(s.extract.columns, vec!["date", "deal_type", "value", "volume"]);
        assert_eq!(s.pipeline.on_row_error, ErrorPolicy::Continue);
        assert!(s.sinks.console);
    }

    #[test]
    fn file_overrides_some_keys() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            f,
            r#"
[target]
stock_code = "NPN"

[pipeline]
on_sink_error = "abort"

[sinks]
console = false
json_path = "out/dealings.jsonl"
"#
        )
        .unwrap();

        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.target.stock_code, "NPN");
        assert_eq!(s.pipeline.on_sink_error, ErrorPolicy::Abort);
        assert_eq!(s.pipeline.on_row_error, ErrorPolicy::Continue);
        assert!(!s.sinks.console);
        assert_eq!(s.sinks.json_path, Some(PathBuf::from("out/dealings.jsonl")));
        // untouched sections keep defaults
        assert_eq!(s.extract.row, ".sens-row.cac");
        assert_eq!(s.fetch.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn example_file_matches_defaults() {
        let s = Settings::load(Some(Path::new("dealings.example.toml"))).unwrap();
        let d = Settings::default();
        assert_eq!(s.target.url, d.target.url);
        assert_eq!(s.target.allowed_domains, d.target.allowed_domains);
        assert_eq!(s.extract.price, d.extract.price);
        assert_eq!(s.extract.columns, d.extract.columns);
        assert_eq!(s.sinks.sqlite_path, d.sinks.sqlite_path);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/dealings.toml"))).is_err());
    }
}
