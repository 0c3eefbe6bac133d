use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Rendering defaults and lookup tables shared by the sync layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Basemap id → style URL.
    pub basemaps: HashMap<String, String>,
    /// Basemap used when the specification names none.
    pub default_basemap: String,
    pub default_color: String,
    pub default_stroke_color: String,
    pub default_line_width: f64,
    pub default_point_radius: f64,
    pub default_opacity: f64,
    pub cluster_radius: f64,
    pub cluster_max_zoom: f64,
    pub heat_radius: f64,
    pub heat_intensity: f64,
    pub raster_tile_size: u32,
    /// URL scheme under which archive-packaged tiles are served.
    pub archive_scheme: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let basemaps = [
            ("light", "https://basemaps.cartocdn.com/gl/positron-gl-style/style.json"),
            ("dark", "https://basemaps.cartocdn.com/gl/dark-matter-gl-style/style.json"),
            ("voyager", "https://basemaps.cartocdn.com/gl/voyager-gl-style/style.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            basemaps,
            default_basemap: "light".to_string(),
            default_color: "#3b82f6".to_string(),
            default_stroke_color: "#1e3a8a".to_string(),
            default_line_width: 2.0,
            default_point_radius: 6.0,
            default_opacity: 0.8,
            cluster_radius: 50.0,
            cluster_max_zoom: 14.0,
            heat_radius: 20.0,
            heat_intensity: 1.0,
            raster_tile_size: 256,
            archive_scheme: "pmtiles".to_string(),
        }
    }
}

impl RenderSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded render settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve a basemap id to a style URL. Unknown ids are taken to be URLs.
    pub fn style_url(&self, basemap: Option<&str>) -> String {
        let id = basemap.unwrap_or(&self.default_basemap);
        self.basemaps
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let s = RenderSettings::from_json(r#"{"cluster_radius": 80, "default_basemap": "dark"}"#)
            .unwrap();
        assert_eq!(s.cluster_radius, 80.0);
        assert_eq!(s.heat_radius, RenderSettings::default().heat_radius);
        assert!(s.style_url(None).contains("dark-matter"));
    }

    #[test]
    fn test_style_url_passthrough() {
        let s = RenderSettings::default();
        assert_eq!(
            s.style_url(Some("https://example.com/style.json")),
            "https://example.com/style.json"
        );
        assert!(s.style_url(Some("voyager")).contains("voyager"));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            RenderSettings::from_json("{\"cluster_radius\": \"wide\"}"),
            Err(SettingsError::Parse(_))
        ));
    }
}
