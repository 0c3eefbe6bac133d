use serde::{Deserialize, Serialize};

use crate::camera::LngLat;

/// A point marker placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDefinition {
    pub coordinates: LngLat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Text shown on hover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup: Option<MarkerPopup>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub draggable: bool,
}

impl MarkerDefinition {
    pub fn at(lng: f64, lat: f64) -> Self {
        Self {
            coordinates: [lng, lat],
            color: None,
            icon: None,
            label: None,
            tooltip: None,
            popup: None,
            draggable: false,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn draggable(mut self) -> Self {
        self.draggable = true;
        self
    }

    /// The part of a marker that requires rebuilding its element when changed.
    pub fn visual_identity(&self) -> (Option<&str>, Option<&str>) {
        (self.color.as_deref(), self.icon.as_deref())
    }
}

/// Content shown when a marker is clicked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerPopup {
    Text(String),
    Rich {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_marker() {
        let m: MarkerDefinition = serde_json::from_value(json!({"coordinates": [1, 2]})).unwrap();
        assert_eq!(m, MarkerDefinition::at(1.0, 2.0));
        assert_eq!(serde_json::to_value(&m).unwrap(), json!({"coordinates": [1.0, 2.0]}));
    }

    #[test]
    fn test_visual_identity_ignores_position() {
        let a = MarkerDefinition::at(0.0, 0.0).with_color("red");
        let mut b = a.clone();
        b.coordinates = [5.0, 5.0];
        b.label = Some("moved".into());
        assert_eq!(a.visual_identity(), b.visual_identity());
        assert_ne!(a.visual_identity(), b.with_icon("pin").visual_identity());
    }

    #[test]
    fn test_popup_forms() {
        let text: MarkerPopup = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(text, MarkerPopup::Text("hello".into()));
        let rich: MarkerPopup = serde_json::from_value(json!({"title": "Home"})).unwrap();
        assert!(matches!(rich, MarkerPopup::Rich { title: Some(_), .. }));
    }
}
