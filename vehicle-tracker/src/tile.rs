//! Tile layer description and slippy-map maths
//!
//! The tracker does not download imagery itself; it records which tile
//! template and attribution a surface should use, and can resolve the URL of
//! the tile under a given coordinate.

use crate::types::LatLng;
use serde::{Deserialize, Serialize};

/// Default OpenStreetMap tile template
pub const OSM_TILE_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Attribution required by the OpenStreetMap tile usage policy
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Highest zoom level the Web Mercator maths is evaluated at
const MAX_ZOOM: u8 = 22;

/// Background imagery layer attached to the map view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` and optional `{r}` placeholders
    #[serde(default = "default_template")]
    pub url_template: String,

    /// Attribution text that must be displayed alongside the tiles
    #[serde(default = "default_attribution")]
    pub attribution: String,

    /// Subdomains rotated into `{s}`
    #[serde(default = "default_subdomains")]
    pub subdomains: Vec<String>,
}

fn default_template() -> String {
    OSM_TILE_TEMPLATE.to_string()
}

fn default_attribution() -> String {
    OSM_ATTRIBUTION.to_string()
}

fn default_subdomains() -> Vec<String> {
    vec!["a".into(), "b".into(), "c".into()]
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: default_template(),
            attribution: default_attribution(),
            subdomains: default_subdomains(),
        }
    }
}

/// Address of one tile in the slippy-map grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Tile containing `position` at `zoom`
    pub fn containing(position: LatLng, zoom: u8) -> Self {
        let z = zoom.min(MAX_ZOOM);
        let n = 1_i64 << z;
        let x_raw = ((position.longitude + 180.0) / 360.0 * n as f64).floor() as i64;
        let lat_rad = position.latitude.to_radians();
        let y_raw = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI)
            / 2.0
            * n as f64)
            .floor() as i64;

        Self {
            x: x_raw.rem_euclid(n) as u32,
            y: y_raw.clamp(0, n - 1) as u32,
            z,
        }
    }
}

impl TileLayer {
    /// Create a layer from a template and attribution, using the default subdomains
    pub fn new(url_template: impl Into<String>, attribution: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            attribution: attribution.into(),
            subdomains: default_subdomains(),
        }
    }

    /// Subdomain for a tile, rotated the same way Leaflet does
    fn subdomain(&self, tile: TileCoord) -> &str {
        if self.subdomains.is_empty() {
            return "";
        }
        let index = (tile.x as usize + tile.y as usize) % self.subdomains.len();
        &self.subdomains[index]
    }

    /// Resolve the template for a tile
    pub fn tile_url(&self, tile: TileCoord) -> String {
        self.url_template
            .replace("{s}", self.subdomain(tile))
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{r}", "")
    }

    /// URL of the tile under `position` at `zoom`
    pub fn url_at(&self, position: LatLng, zoom: u8) -> String {
        self.tile_url(TileCoord::containing(position, zoom))
    }
}
