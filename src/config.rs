use crate::database::{DatasetFamily, NetblockDatabase, SourceInfo};
use crate::lens::ingest::{IngestOptions, DEFAULT_BATCH_SIZE};
use crate::range::AddressParsing;
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

pub struct GeoripeConfig {
    /// Path to the directory holding the netblock databases
    pub data_dir: String,

    /// Records per insert transaction during ingestion
    pub batch_size: usize,

    /// Language suffix of the geolocation locations file (`en`, `de`, ...)
    pub geoip_language: String,

    /// Zero-fill missing trailing octets instead of rejecting the address
    pub lenient_addresses: bool,
}

const EMPTY_CONFIG: &str = r#"### georipe configuration file

### directory holding rir.sqlite3 and geoip.sqlite3
# data_dir = "~/.georipe"

### records per insert transaction during ingestion
# batch_size = 25000

### language of the geolocation locations file (GeoLite2-City-Locations-<lang>.csv)
# geoip_language = "en"

### accept addresses with missing trailing octets (e.g. "10.1" as 10.1.0.0)
# lenient_addresses = false
"#;

impl Default for GeoripeConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.georipe", home_dir),
            batch_size: DEFAULT_BATCH_SIZE,
            geoip_language: "en".to_string(),
            lenient_addresses: false,
        }
    }
}

impl GeoripeConfig {
    /// Load configuration from a TOML file and `GEORIPE_*` environment variables
    ///
    /// Without an explicit path, `$HOME/.georipe/georipe.toml` is used. A missing
    /// file is created from a commented template.
    pub fn new(path: &Option<String>) -> Result<GeoripeConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let georipe_dir = default_dir()?;
                std::fs::create_dir_all(georipe_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create georipe directory: {}", e))?;
                let p = format!("{}/georipe.toml", georipe_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // e.g. `GEORIPE_DATA_DIR=/srv/georipe georipe info`
        builder = builder.add_source(config::Environment::with_prefix("GEORIPE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<GeoripeConfig> {
        let defaults = GeoripeConfig::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_dir()?,
        };

        let batch_size = match config.get("batch_size") {
            Some(s) => match s.parse::<usize>() {
                Ok(0) | Err(_) => return Err(anyhow!("Invalid batch_size '{}'", s)),
                Ok(n) => n,
            },
            None => defaults.batch_size,
        };

        let geoip_language = config
            .get("geoip_language")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.geoip_language);

        let lenient_addresses = config
            .get("lenient_addresses")
            .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(defaults.lenient_addresses);

        Ok(GeoripeConfig {
            data_dir,
            batch_size,
            geoip_language,
            lenient_addresses,
        })
    }

    pub fn address_parsing(&self) -> AddressParsing {
        if self.lenient_addresses {
            AddressParsing::Lenient
        } else {
            AddressParsing::Strict
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size,
            address_parsing: self.address_parsing(),
        }
    }

    /// Path of a family's SQLite file
    pub fn store_path(&self, family: DatasetFamily) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, family.file_name())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!(
                "Registry Store:     {}",
                self.store_path(DatasetFamily::Registry)
            ),
            format!(
                "Geolocation Store:  {}",
                self.store_path(DatasetFamily::Geolocation)
            ),
            format!("Batch Size:         {}", self.batch_size),
            format!("GeoIP Language:     {}", self.geoip_language),
            format!("Lenient Addresses:  {}", self.lenient_addresses),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.georipe/georipe.toml", home_dir)
    }
}

fn default_dir() -> Result<String> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    let home_str = home
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?;
    Ok(format!("{}/.georipe", home_str))
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

// =============================================================================
// Store info (used by the info command)
// =============================================================================

/// State of one family's SQLite file
#[derive(Debug, Serialize, Clone)]
pub struct StoreInfo {
    pub family: DatasetFamily,
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub sources: Vec<SourceInfo>,
    /// Why the store could not be read, e.g. an outdated schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Inspect a family's store without creating or resetting it
pub fn get_store_info(config: &GeoripeConfig, family: DatasetFamily) -> Result<StoreInfo> {
    let path = config.store_path(family);
    let exists = Path::new(&path).exists();
    let mut info = StoreInfo {
        family,
        path,
        exists,
        size_bytes: None,
        sources: Vec::new(),
        problem: None,
    };
    if !exists {
        return Ok(info);
    }

    info.size_bytes = std::fs::metadata(&info.path).ok().map(|m| m.len());
    match NetblockDatabase::open_existing(&info.path, family) {
        Ok(db) => info.sources = db.source_info()?,
        Err(e) => {
            warn!("{}", e);
            info.problem = Some(e.to_string());
        }
    }
    Ok(info)
}

/// Format a byte size as a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
