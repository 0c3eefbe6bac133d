//! Per-kind layer handlers.
//!
//! A handler turns one [`LayerDefinition`] into a [`Draw`]: the source and
//! sub-layers to create. Kinds that need network or parse work return a
//! deferred draw that layer sync resolves out of band.

mod features;
mod route;
mod tiles;

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use mapspec_core::{LayerDefinition, RenderSettings};

use crate::archive::ArchiveProtocol;
use crate::engine::{RenderEngine, SourceSpec, SubLayerSpec};
use crate::layer_sync::SyncError;
use crate::resolve::Resolvers;
use crate::tabular::TableData;

pub const FILL: &str = "-fill";
pub const LINE: &str = "-line";
pub const POINT: &str = "-point";
pub const CLUSTER: &str = "-cluster";
pub const CLUSTER_LABEL: &str = "-cluster-label";
pub const HEAT: &str = "-heat";
pub const RASTER: &str = "-raster";

/// Every sub-layer suffix any kind creates, in creation order.
pub const SUFFIXES: [&str; 7] = [FILL, LINE, POINT, CLUSTER, CLUSTER_LABEL, HEAT, RASTER];

pub fn sub_layer_id(id: &str, suffix: &str) -> String {
    format!("{}{}", id, suffix)
}

/// Resources to create for one layer id. The source id is the layer id.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub source: SourceSpec,
    pub sub_layers: Vec<SubLayerSpec>,
    /// Sub-layers that get pointer listeners when the layer asks for them.
    pub interactive: Vec<String>,
    pub table: Option<TableData>,
}

pub enum Plan {
    Ready(Draw),
    /// Resolves to `None` when the layer must stay absent.
    Deferred(LocalBoxFuture<'static, Option<Draw>>),
}

pub(crate) struct PlanContext<'a> {
    pub settings: &'a Rc<RenderSettings>,
    pub resolvers: &'a Resolvers,
    pub archive: &'a ArchiveProtocol,
    pub engine: &'a dyn RenderEngine,
}

/// Dispatch on the layer kind.
pub(crate) fn plan(id: &str, def: &LayerDefinition, ctx: &PlanContext<'_>) -> Result<Plan, SyncError> {
    match def {
        LayerDefinition::Geojson(layer) => Ok(features::plan_geojson(id, layer, ctx)),
        LayerDefinition::Route(layer) => route::plan_route(id, layer, ctx),
        LayerDefinition::Heatmap(layer) => Ok(features::plan_heatmap(id, layer, ctx)),
        LayerDefinition::VectorTile(layer) => tiles::plan_vector_tile(id, layer, ctx),
        LayerDefinition::Raster(layer) => Ok(tiles::plan_raster(id, layer, ctx)),
        LayerDefinition::Geoparquet(layer) => features::plan_geoparquet(id, layer, ctx),
        LayerDefinition::Pmtiles(layer) => tiles::plan_pmtiles(id, layer, ctx),
    }
}
