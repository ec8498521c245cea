//! Optional TOML configuration shared by both binaries.
//!
//! Every field has a default matching the stock NYC run, so an absent file and
//! an empty file behave the same. Command-line flags are applied on top by the
//! binaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SHAPEFILE: &str = "nybb_25b/nybb.shp";
pub const DEFAULT_BOUNDARY_OUTPUT: &str = "nyc_boundary.geojson";
pub const DEFAULT_PLACE: &str = "New York City, New York, USA";
pub const DEFAULT_WALKABLE_OUTPUT: &str = "nyc_walkable_area.geojson";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub boundary: BoundaryConfig,
    pub walkable: WalkableConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoundaryConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Overrides the CRS read from the `.prj` sidecar
    pub source_crs: Option<String>,
    /// Attribute columns tried, in order, for a record's display name
    pub name_fields: Vec<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_SHAPEFILE),
            output: PathBuf::from(DEFAULT_BOUNDARY_OUTPUT),
            source_crs: None,
            name_fields: vec!["BoroName".into(), "NAME".into(), "name".into()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalkableConfig {
    pub place: String,
    pub output: PathBuf,
    /// Keep every connected component instead of only the largest
    pub retain_all: bool,
    /// Drop interstitial nodes that only shape a way
    pub simplify: bool,
}

impl Default for WalkableConfig {
    fn default() -> Self {
        Self {
            place: DEFAULT_PLACE.to_string(),
            output: PathBuf::from(DEFAULT_WALKABLE_OUTPUT),
            retain_all: false,
            simplify: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub nominatim_url: String,
    pub overpass_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            user_agent: concat!("citybounds/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 600,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
