//! Terminal rendering surface
//!
//! Wraps the library's in-memory [`Scene`] and prints the map header once and
//! the info panel after every applied sample.

use crate::config::DisplayConfig;
use std::io::Write;
use vehicle_tracker::{InfoField, LatLng, MapSurface, Scene, TileLayer};

const RULE: &str = "═══════════════════════════════════════════════";

pub struct TerminalSurface<W: Write> {
    scene: Scene,
    display: DisplayConfig,
    out: W,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(display: DisplayConfig, out: W) -> Self {
        Self {
            scene: Scene::new(),
            display,
            out,
        }
    }

    /// Panel line for the current scene, plus the tile line when enabled
    pub fn render_panel(&self) -> String {
        let panel = &self.scene.panel;
        let mut text = format!(
            "[{}] 🚗 Speed: {} | ETA: {} | Lat: {} | Lon: {} | Time: {}",
            chrono::Local::now().format("%H:%M:%S"),
            panel.get(InfoField::Speed),
            panel.get(InfoField::Eta),
            panel.get(InfoField::Latitude),
            panel.get(InfoField::Longitude),
            panel.get(InfoField::Time),
        );

        if self.display.show_tile_url {
            if let (Some(view), Some(marker)) = (&self.scene.view, &self.scene.marker) {
                if let Some(layer) = &view.tile_layer {
                    text.push_str("\n           tile: ");
                    text.push_str(&layer.url_at(marker.position, view.zoom));
                }
            }
        }

        text
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::warn!("Failed to write to terminal: {}", e);
        }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.out
    }
}

impl<W: Write> MapSurface for TerminalSurface<W> {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.scene.set_view(center, zoom);
        self.emit(RULE);
        self.emit("  Vehicle Tracker");
        self.emit(RULE);
        self.emit(&format!("🗺  Map centered at {}, zoom {}", center, zoom));
    }

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        self.scene.add_tile_layer(layer);
        self.emit(&format!("   Tiles: {} ({})", layer.url_template, layer.attribution));
    }

    fn place_marker(&mut self, position: LatLng, popup: &str) {
        self.scene.place_marker(position, popup);
        self.emit(&format!("📍 {} at {}\n", popup, position));
    }

    fn move_marker(&mut self, position: LatLng) {
        self.scene.move_marker(position);
    }

    fn pan_to(&mut self, center: LatLng) {
        self.scene.pan_to(center);
    }

    fn set_field(&mut self, field: InfoField, text: &str) {
        self.scene.set_field(field, text);
    }

    fn sample_applied(&mut self) {
        self.scene.sample_applied();
        if self.display.clear_screen {
            self.emit("\x1b[2J\x1b[H");
        }
        let panel = self.render_panel();
        self.emit(&panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> TerminalSurface<Vec<u8>> {
        let mut surface = TerminalSurface::new(DisplayConfig::default(), Vec::new());
        let center = LatLng::new(39.977183, 116.329867);
        surface.set_view(center, 14);
        surface.add_tile_layer(&TileLayer::default());
        surface.place_marker(center, "Vehicle Tracking Started");
        surface
    }

    #[test]
    fn test_header_shows_view_and_attribution() {
        let output = String::from_utf8(surface().into_output()).unwrap();
        assert!(output.contains("Map centered at (39.977183, 116.329867), zoom 14"));
        assert!(output.contains("© OpenStreetMap contributors"));
        assert!(output.contains("Vehicle Tracking Started"));
    }

    #[test]
    fn test_panel_rendered_after_sample() {
        let mut surface = surface();
        surface.move_marker(LatLng::new(39.977183, 116.329867));
        surface.set_field(InfoField::Speed, "12.30");
        surface.set_field(InfoField::Eta, "9.50");
        surface.set_field(InfoField::Latitude, "39.977183");
        surface.set_field(InfoField::Longitude, "116.329867");
        surface.set_field(InfoField::Time, "2008-10-23 02:53:04");
        surface.sample_applied();

        let output = String::from_utf8(surface.into_output()).unwrap();
        assert!(output.contains("Speed: 12.30 | ETA: 9.50 | Lat: 39.977183 | Lon: 116.329867"));
        assert!(output.contains("Time: 2008-10-23 02:53:04"));
        assert!(output.contains("tile: https://a.tile.openstreetmap.org/14/13486/6203.png"));
    }

    #[test]
    fn test_tile_line_can_be_disabled() {
        let display = DisplayConfig {
            show_tile_url: false,
            clear_screen: false,
        };
        let mut surface = TerminalSurface::new(display, Vec::new());
        surface.set_view(LatLng::new(0.0, 0.0), 3);
        surface.add_tile_layer(&TileLayer::default());
        surface.place_marker(LatLng::new(0.0, 0.0), "start");
        assert!(!surface.render_panel().contains("tile:"));
    }
}
