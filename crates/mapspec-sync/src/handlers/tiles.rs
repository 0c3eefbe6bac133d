use futures::FutureExt;

use mapspec_core::layer::{ArchiveRender, PmTilesLayer, RasterLayer, VectorRender, VectorTileLayer};
use mapspec_core::LayerCommon;

use super::{sub_layer_id, Draw, Plan, PlanContext, FILL, LINE, POINT, RASTER};
use crate::engine::{SourceSpec, SubLayerKind, SubLayerSpec};
use crate::layer_sync::SyncError;
use crate::paint::{self, ResolvedStyle};

fn vector_draw(id: &str, source: SourceSpec, source_layer: String, render: VectorRender, style: &ResolvedStyle) -> Draw {
    let sub_layer = match render {
        VectorRender::Fill => {
            SubLayerSpec::new(sub_layer_id(id, FILL), id, SubLayerKind::Fill).with_paint(paint::fill_paint(style))
        }
        VectorRender::Line => SubLayerSpec::new(sub_layer_id(id, LINE), id, SubLayerKind::Line)
            .with_paint(paint::line_paint(style, false))
            .with_layout(paint::line_layout()),
        VectorRender::Circle => {
            SubLayerSpec::new(sub_layer_id(id, POINT), id, SubLayerKind::Circle).with_paint(paint::circle_paint(style))
        }
    }
    .with_source_layer(Some(source_layer));
    let interactive = vec![sub_layer.id.clone()];
    Draw {
        source,
        sub_layers: vec![sub_layer],
        interactive,
        table: None,
    }
}

/// A vector source whose layer is named, or discovered from TileJSON at `metadata_url`.
fn vector_plan(
    id: &str,
    source: SourceSpec,
    source_layer: Option<String>,
    render: VectorRender,
    metadata_url: Option<&str>,
    common: &LayerCommon,
    ctx: &PlanContext<'_>,
) -> Result<Plan, SyncError> {
    let style = ResolvedStyle::resolve(&common.style.clone().unwrap_or_default(), ctx.settings);
    if let Some(source_layer) = source_layer {
        return Ok(Plan::Ready(vector_draw(id, source, source_layer, render, &style)));
    }

    let url = metadata_url.ok_or_else(|| SyncError::MissingSourceLayer(id.to_string()))?;
    let loader = ctx
        .resolvers
        .metadata
        .clone()
        .ok_or(SyncError::NotConfigured("tile metadata loader"))?;
    let fetch = loader.load(url);
    let id = id.to_string();
    let url = url.to_string();
    Ok(Plan::Deferred(
        async move {
            match fetch.await {
                Ok(meta) => match meta.default_source_layer() {
                    Some(source_layer) => {
                        log::debug!("Layer {} uses source layer {} from {}", id, source_layer, url);
                        Some(vector_draw(&id, source, source_layer.to_string(), render, &style))
                    }
                    None => {
                        log::warn!("TileJSON at {} lists no vector layers, {} stays hidden", url, id);
                        None
                    }
                },
                Err(e) => {
                    log::warn!("Failed to fetch TileJSON for {} from {}: {}", id, url, e);
                    None
                }
            }
        }
        .boxed_local(),
    ))
}

pub(super) fn plan_vector_tile(id: &str, layer: &VectorTileLayer, ctx: &PlanContext<'_>) -> Result<Plan, SyncError> {
    let source = SourceSpec::Vector {
        url: if layer.tiles.is_some() { None } else { layer.url.clone() },
        tiles: layer.tiles.clone(),
    };
    if layer.url.is_none() && layer.tiles.is_none() {
        return Err(SyncError::InvalidDefinition(format!("vector layer {} has no url or tiles", id)));
    }
    vector_plan(
        id,
        source,
        layer.source_layer.clone(),
        layer.render,
        layer.url.as_deref(),
        &layer.common,
        ctx,
    )
}

pub(super) fn plan_raster(id: &str, layer: &RasterLayer, ctx: &PlanContext<'_>) -> Plan {
    let style = ResolvedStyle::resolve(&layer.common.style.clone().unwrap_or_default(), ctx.settings);
    let raster =
        SubLayerSpec::new(sub_layer_id(id, RASTER), id, SubLayerKind::Raster).with_paint(paint::raster_paint(style.opacity));
    Plan::Ready(Draw {
        source: SourceSpec::Raster {
            url: None,
            tiles: Some(layer.tiles.clone()),
            tile_size: layer.tile_size.unwrap_or(ctx.settings.raster_tile_size),
            attribution: layer.attribution.clone(),
        },
        sub_layers: vec![raster],
        interactive: Vec::new(),
        table: None,
    })
}

/// Archive tiles are served through the custom scheme, registered on first use.
pub(super) fn plan_pmtiles(id: &str, layer: &PmTilesLayer, ctx: &PlanContext<'_>) -> Result<Plan, SyncError> {
    let url = ctx.archive.url(ctx.engine, &ctx.settings.archive_scheme, &layer.url)?;
    let render = match layer.render {
        ArchiveRender::Raster => {
            let style = ResolvedStyle::resolve(&layer.common.style.clone().unwrap_or_default(), ctx.settings);
            let raster = SubLayerSpec::new(sub_layer_id(id, RASTER), id, SubLayerKind::Raster)
                .with_paint(paint::raster_paint(style.opacity));
            return Ok(Plan::Ready(Draw {
                source: SourceSpec::Raster {
                    url: Some(url),
                    tiles: None,
                    tile_size: ctx.settings.raster_tile_size,
                    attribution: None,
                },
                sub_layers: vec![raster],
                interactive: Vec::new(),
                table: None,
            }));
        }
        ArchiveRender::Fill => VectorRender::Fill,
        ArchiveRender::Line => VectorRender::Line,
        ArchiveRender::Circle => VectorRender::Circle,
    };
    let source = SourceSpec::Vector {
        url: Some(url),
        tiles: None,
    };
    vector_plan(
        id,
        source,
        layer.source_layer.clone(),
        render,
        Some(&layer.url),
        &layer.common,
        ctx,
    )
}
