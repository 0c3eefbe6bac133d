use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` pair in degrees.
pub type LngLat = [f64; 2];

/// Map projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Mercator,
    Globe,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::Mercator => "mercator",
            Projection::Globe => "globe",
        }
    }
}

/// A geographic bounding box: `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west: west.min(east),
            south: south.min(north),
            east: west.max(east),
            north: south.max(north),
        }
    }

    pub fn from_points(points: &[LngLat]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut west = f64::MAX;
        let mut south = f64::MAX;
        let mut east = f64::MIN;
        let mut north = f64::MIN;
        for p in points {
            west = west.min(p[0]);
            south = south.min(p[1]);
            east = east.max(p[0]);
            north = north.max(p[1]);
        }
        Some(Self {
            west,
            south,
            east,
            north,
        })
    }

    pub fn center(&self) -> LngLat {
        [(self.west + self.east) / 2.0, (self.south + self.north) / 2.0]
    }

    pub fn contains(&self, p: &LngLat) -> bool {
        p[0] >= self.west && p[0] <= self.east && p[1] >= self.south && p[1] <= self.north
    }
}

impl From<[f64; 4]> for LngLatBounds {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<LngLatBounds> for [f64; 4] {
    fn from(b: LngLatBounds) -> Self {
        [b.west, b.south, b.east, b.north]
    }
}

/// An explicit camera position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 1.0,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

impl CameraView {
    /// Zoom clamped to the range web map engines accept.
    pub fn clamped(mut self) -> Self {
        self.zoom = self.zoom.clamp(0.0, 24.0);
        self.pitch = self.pitch.clamp(0.0, 85.0);
        self.bearing = self.bearing.rem_euclid(360.0);
        self.center[1] = self.center[1].clamp(-85.051_129, 85.051_129);
        self
    }
}

/// Where the camera should go for a given specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CameraTarget {
    /// Jump to an explicit center/zoom/pitch/bearing.
    View(CameraView),
    /// Fit a bounding box, with padding in pixels.
    Fit { bounds: LngLatBounds, padding: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_normalized() {
        let b = LngLatBounds::new(10.0, 5.0, -10.0, -5.0);
        assert_eq!(b.west, -10.0);
        assert_eq!(b.north, 5.0);
        assert_eq!(b.center(), [0.0, 0.0]);
    }

    #[test]
    fn test_bounds_from_points() {
        let b = LngLatBounds::from_points(&[[1.0, 2.0], [-3.0, 4.0], [0.5, -1.0]]).unwrap();
        assert_eq!(<[f64; 4]>::from(b), [-3.0, -1.0, 1.0, 4.0]);
        assert!(b.contains(&[0.0, 0.0]));
        assert!(LngLatBounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_view_clamped() {
        let v = CameraView {
            center: [0.0, 89.0],
            zoom: 30.0,
            pitch: 90.0,
            bearing: -90.0,
        }
        .clamped();
        assert_eq!(v.zoom, 24.0);
        assert_eq!(v.pitch, 85.0);
        assert_eq!(v.bearing, 270.0);
        assert!(v.center[1] < 85.1);
    }
}
