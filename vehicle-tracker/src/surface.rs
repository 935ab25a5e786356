//! Display surface abstraction
//!
//! The tracker never draws anything itself. It drives a [`MapSurface`], which
//! owns the map view, the single marker and the info panel. [`Scene`] is the
//! in-memory surface: it keeps exactly the state a rendered page would show
//! and is what frontends wrap to do the actual drawing.

use crate::tile::TileLayer;
use crate::types::{LatLng, TelemetrySample};
use std::fmt;

/// One of the five info panel slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InfoField {
    Speed,
    Eta,
    Latitude,
    Longitude,
    Time,
}

impl InfoField {
    /// All fields in panel order
    pub const ALL: [InfoField; 5] = [
        InfoField::Speed,
        InfoField::Eta,
        InfoField::Latitude,
        InfoField::Longitude,
        InfoField::Time,
    ];

    /// Stable element key of this field
    pub fn key(self) -> &'static str {
        match self {
            InfoField::Speed => "speed",
            InfoField::Eta => "eta",
            InfoField::Latitude => "lat",
            InfoField::Longitude => "lon",
            InfoField::Time => "time",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Panel text for this field of `sample`
    pub fn format(self, sample: &TelemetrySample) -> String {
        match self {
            InfoField::Speed => to_fixed(sample.speed, 2),
            InfoField::Eta => to_fixed(sample.eta, 2),
            InfoField::Latitude => to_fixed(sample.latitude, 6),
            InfoField::Longitude => to_fixed(sample.longitude, 6),
            InfoField::Time => sample.timestamp.to_string(),
        }
    }
}

/// Enough fractional digits to print any `f64` exactly
const EXACT_PRECISION: usize = 1074;

/// Fixed-point text with `digits` decimals
///
/// A value lying exactly halfway between two candidates rounds away from
/// zero, so `12.125` gives `"12.13"` where `{:.2}` alone would give `"12.12"`.
fn to_fixed(value: f64, digits: usize) -> String {
    let rounded = format!("{:.*}", digits, value);
    if !value.is_finite() {
        return rounded;
    }

    let exact = format!("{:.*}", EXACT_PRECISION, value.abs());
    let Some(dot) = exact.find('.') else {
        return rounded;
    };
    let tail = &exact[dot + 1 + digits..];
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    if !is_tie {
        return rounded;
    }

    let cut = if digits == 0 { dot } else { dot + 1 + digits };
    let mut out: Vec<u8> = exact.as_bytes()[..cut].to_vec();
    let mut carry = true;
    for b in out.iter_mut().rev() {
        match *b {
            b'.' => continue,
            b'9' => *b = b'0',
            _ => {
                *b += 1;
                carry = false;
                break;
            }
        }
    }
    if carry {
        out.insert(0, b'1');
    }
    if value.is_sign_negative() {
        out.insert(0, b'-');
    }

    out.into_iter().map(char::from).collect()
}

impl fmt::Display for InfoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Something the tracker can render onto
///
/// Calls arrive in a fixed order per sample: `move_marker`, `pan_to`, five
/// `set_field` calls, then `sample_applied`.
pub trait MapSurface {
    /// Create or reset the map view
    fn set_view(&mut self, center: LatLng, zoom: u8);

    /// Attach the background imagery layer
    fn add_tile_layer(&mut self, layer: &TileLayer);

    /// Place the single marker and open its popup
    fn place_marker(&mut self, position: LatLng, popup: &str);

    fn move_marker(&mut self, position: LatLng);

    /// Recenter the view, animating if the surface supports it
    fn pan_to(&mut self, center: LatLng);

    fn set_field(&mut self, field: InfoField, text: &str);

    /// Called once every field of a sample has been written
    fn sample_applied(&mut self) {}
}

/// Map view state
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
    pub tile_layer: Option<TileLayer>,
}

/// The vehicle marker
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    pub popup: String,
    pub popup_open: bool,
}

/// Text of the five info slots; empty until the first sample arrives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoPanel {
    fields: [String; 5],
}

impl InfoPanel {
    pub fn get(&self, field: InfoField) -> &str {
        &self.fields[field.index()]
    }

    pub fn set(&mut self, field: InfoField, text: &str) {
        let slot = &mut self.fields[field.index()];
        slot.clear();
        slot.push_str(text);
    }

    /// Look a field up by its element key
    pub fn by_key(&self, key: &str) -> Option<&str> {
        InfoField::ALL
            .iter()
            .find(|field| field.key() == key)
            .map(|field| self.get(*field))
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(String::is_empty)
    }
}

/// In-memory surface holding what a page would currently display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub view: Option<MapView>,
    pub marker: Option<Marker>,
    pub panel: InfoPanel,
    /// Number of samples fully applied so far
    pub samples_applied: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapSurface for Scene {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.view = Some(MapView {
            center,
            zoom,
            tile_layer: None,
        });
    }

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        match self.view.as_mut() {
            Some(view) => view.tile_layer = Some(layer.clone()),
            None => log::warn!("Tile layer added before the map view exists; ignoring"),
        }
    }

    fn place_marker(&mut self, position: LatLng, popup: &str) {
        self.marker = Some(Marker {
            position,
            popup: popup.to_string(),
            popup_open: true,
        });
    }

    fn move_marker(&mut self, position: LatLng) {
        if let Some(marker) = self.marker.as_mut() {
            marker.position = position;
        }
    }

    fn pan_to(&mut self, center: LatLng) {
        if let Some(view) = self.view.as_mut() {
            view.center = center;
        }
    }

    fn set_field(&mut self, field: InfoField, text: &str) {
        self.panel.set(field, text);
    }

    fn sample_applied(&mut self) {
        self.samples_applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleTime;

    fn sample(speed: f64, latitude: f64) -> TelemetrySample {
        TelemetrySample {
            latitude,
            longitude: 116.32986712,
            speed,
            eta: 7.0,
            timestamp: SampleTime::Text("2008-10-23 02:53:04".into()),
        }
    }

    #[test]
    fn test_field_formatting() {
        let s = sample(12.3, 39.9771834999);
        assert_eq!(InfoField::Speed.format(&s), "12.30");
        assert_eq!(InfoField::Eta.format(&s), "7.00");
        assert_eq!(InfoField::Latitude.format(&s), "39.977183");
        assert_eq!(InfoField::Longitude.format(&s), "116.329867");
        assert_eq!(InfoField::Time.format(&s), "2008-10-23 02:53:04");
    }

    #[test]
    fn test_exact_halves_round_up() {
        let mut s = sample(12.125, 39.0078125);
        s.eta = 0.125;
        s.longitude = -116.0078125;
        assert_eq!(InfoField::Speed.format(&s), "12.13");
        assert_eq!(InfoField::Eta.format(&s), "0.13");
        assert_eq!(InfoField::Latitude.format(&s), "39.007813");
        assert_eq!(InfoField::Longitude.format(&s), "-116.007813");

        // Not exactly representable, so these sit below the half
        s.speed = 1.005;
        s.eta = 2.675;
        assert_eq!(InfoField::Speed.format(&s), "1.00");
        assert_eq!(InfoField::Eta.format(&s), "2.67");
    }

    #[test]
    fn test_to_fixed_carries() {
        assert_eq!(to_fixed(9.5, 0), "10");
        assert_eq!(to_fixed(-0.5, 0), "-1");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(0.0, 2), "0.00");
        assert_eq!(to_fixed(f64::NAN, 2), "NaN");
    }

    #[test]
    fn test_field_keys() {
        let keys: Vec<&str> = InfoField::ALL.iter().map(|f| f.key()).collect();
        assert_eq!(keys, vec!["speed", "eta", "lat", "lon", "time"]);
    }

    #[test]
    fn test_panel_overwrites_in_place() {
        let mut panel = InfoPanel::default();
        assert!(panel.is_blank());

        panel.set(InfoField::Speed, "10.00");
        panel.set(InfoField::Speed, "11.50");
        assert_eq!(panel.get(InfoField::Speed), "11.50");
        assert_eq!(panel.by_key("speed"), Some("11.50"));
        assert_eq!(panel.by_key("refresh-btn"), None);
        assert!(!panel.is_blank());
    }

    #[test]
    fn test_scene_marker_and_view() {
        let mut scene = Scene::new();
        let origin = LatLng::new(1.0, 2.0);
        scene.set_view(origin, 14);
        scene.add_tile_layer(&TileLayer::default());
        scene.place_marker(origin, "hello");

        let next = LatLng::new(3.0, 4.0);
        scene.move_marker(next);
        scene.pan_to(next);

        let marker = scene.marker.as_ref().unwrap();
        assert_eq!(marker.position, next);
        assert!(marker.popup_open);
        let view = scene.view.as_ref().unwrap();
        assert_eq!(view.center, next);
        assert_eq!(view.zoom, 14);
        assert!(view.tile_layer.is_some());
    }
}
