//! Out-of-band collaborators: routing, columnar file loading and tile
//! metadata discovery. All of them are asynchronous and may fail.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use mapspec_core::layer::RouteProfile;
use mapspec_core::LngLat;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No route between the requested waypoints")]
    NoRoute,

    #[error("No {0} configured")]
    NotConfigured(&'static str),
}

/// Resolves a path through waypoints via a routing service.
pub trait RouteResolver {
    fn resolve(&self, waypoints: &[LngLat], profile: RouteProfile) -> LocalBoxFuture<'static, Result<Vec<LngLat>, ResolveError>>;
}

/// A columnar geospatial file, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarTable {
    /// A GeoJSON FeatureCollection built from the geometry column.
    pub features: Value,
    /// Attribute rows, one per feature.
    pub rows: Vec<Map<String, Value>>,
}

/// Fetches and parses a columnar geospatial file.
pub trait ColumnarLoader {
    fn load(&self, url: &str, geometry_column: Option<&str>) -> LocalBoxFuture<'static, Result<ColumnarTable, ResolveError>>;
}

/// The parts of a TileJSON document the sync layer uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TileMetadata {
    #[serde(default)]
    pub vector_layers: Vec<VectorLayerInfo>,
    #[serde(default)]
    pub minzoom: Option<f64>,
    #[serde(default)]
    pub maxzoom: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorLayerInfo {
    pub id: String,
}

impl TileMetadata {
    pub fn from_tilejson(value: &Value) -> Result<Self, ResolveError> {
        TileMetadata::deserialize(value).map_err(|e| ResolveError::Parse(e.to_string()))
    }

    /// The layer to draw when none was named.
    pub fn default_source_layer(&self) -> Option<&str> {
        self.vector_layers.first().map(|l| l.id.as_str())
    }
}

/// Fetches TileJSON metadata for a tile endpoint.
pub trait TileMetadataLoader {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<TileMetadata, ResolveError>>;
}

/// The collaborators available to the layer handlers.
#[derive(Clone, Default)]
pub struct Resolvers {
    pub routes: Option<Rc<dyn RouteResolver>>,
    pub columnar: Option<Rc<dyn ColumnarLoader>>,
    pub metadata: Option<Rc<dyn TileMetadataLoader>>,
}

impl Resolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(mut self, routes: Rc<dyn RouteResolver>) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn with_columnar(mut self, columnar: Rc<dyn ColumnarLoader>) -> Self {
        self.columnar = Some(columnar);
        self
    }

    pub fn with_metadata(mut self, metadata: Rc<dyn TileMetadataLoader>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tilejson_first_vector_layer() {
        let meta = TileMetadata::from_tilejson(&json!({
            "tilejson": "3.0.0",
            "tiles": ["https://t/{z}/{x}/{y}.pbf"],
            "vector_layers": [{"id": "buildings", "fields": {}}, {"id": "roads"}],
            "maxzoom": 14
        }))
        .unwrap();
        assert_eq!(meta.default_source_layer(), Some("buildings"));
        assert_eq!(meta.maxzoom, Some(14.0));
    }

    #[test]
    fn test_tilejson_without_layers() {
        let meta = TileMetadata::from_tilejson(&json!({"tiles": []})).unwrap();
        assert_eq!(meta.default_source_layer(), None);
        assert!(matches!(
            TileMetadata::from_tilejson(&json!({"vector_layers": "x"})),
            Err(ResolveError::Parse(_))
        ));
    }
}
