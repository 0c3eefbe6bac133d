use futures::FutureExt;
use serde_json::Value;

use mapspec_core::layer::{FeatureLayer, GeoJsonData, GeoParquetLayer, HeatmapLayer};
use mapspec_core::{LayerCommon, RenderSettings};

use super::{sub_layer_id, Draw, Plan, PlanContext, CLUSTER, CLUSTER_LABEL, FILL, HEAT, LINE, POINT};
use crate::engine::{ClusterSettings, SourceSpec, SubLayerKind, SubLayerSpec};
use crate::layer_sync::SyncError;
use crate::paint::{self, ResolvedStyle};
use crate::tabular::TableData;

fn data_value(data: &GeoJsonData) -> Value {
    match data {
        GeoJsonData::Url(url) => Value::String(url.clone()),
        GeoJsonData::Inline(value) => value.clone(),
    }
}

fn inline_table(data: &GeoJsonData) -> Option<TableData> {
    match data {
        GeoJsonData::Inline(_) => Some(TableData::from_rows(data.feature_properties())),
        GeoJsonData::Url(_) => None,
    }
}

/// Polygons, lines and points of one feature source, plus cluster badges.
pub(super) fn feature_draw(
    id: &str,
    data: Value,
    cluster: Option<ClusterSettings>,
    common: &LayerCommon,
    settings: &RenderSettings,
) -> Draw {
    let style = ResolvedStyle::resolve(&common.style.clone().unwrap_or_default(), settings);
    let clustered = cluster.is_some();

    let mut sub_layers = vec![
        SubLayerSpec::new(sub_layer_id(id, FILL), id, SubLayerKind::Fill)
            .with_paint(paint::fill_paint(&style))
            .with_filter(paint::polygon_filter()),
        SubLayerSpec::new(sub_layer_id(id, LINE), id, SubLayerKind::Line)
            .with_paint(paint::line_paint(&style, true))
            .with_layout(paint::line_layout())
            .with_filter(paint::line_filter()),
        SubLayerSpec::new(sub_layer_id(id, POINT), id, SubLayerKind::Circle)
            .with_paint(paint::circle_paint(&style))
            .with_filter(paint::point_filter(clustered)),
    ];
    let interactive = sub_layers.iter().map(|l| l.id.clone()).collect();

    if clustered {
        sub_layers.push(
            SubLayerSpec::new(sub_layer_id(id, CLUSTER), id, SubLayerKind::Circle)
                .with_paint(paint::cluster_paint(&style))
                .with_filter(paint::cluster_filter()),
        );
        sub_layers.push(
            SubLayerSpec::new(sub_layer_id(id, CLUSTER_LABEL), id, SubLayerKind::Symbol)
                .with_paint(paint::cluster_label_paint())
                .with_layout(paint::cluster_label_layout())
                .with_filter(paint::cluster_filter()),
        );
    }

    Draw {
        source: SourceSpec::GeoJson { data, cluster },
        sub_layers,
        interactive,
        table: None,
    }
}

pub(super) fn plan_geojson(id: &str, layer: &FeatureLayer, ctx: &PlanContext<'_>) -> Plan {
    let settings = ctx.settings;
    let cluster = layer.cluster.as_ref().map(|c| ClusterSettings {
        radius: c.radius.unwrap_or(settings.cluster_radius),
        max_zoom: c.max_zoom.unwrap_or(settings.cluster_max_zoom),
    });
    let mut draw = feature_draw(id, data_value(&layer.data), cluster, &layer.common, settings);
    draw.table = inline_table(&layer.data);
    Plan::Ready(draw)
}

pub(super) fn plan_heatmap(id: &str, layer: &HeatmapLayer, ctx: &PlanContext<'_>) -> Plan {
    let settings = ctx.settings;
    let style = ResolvedStyle::resolve(&layer.common.style.clone().unwrap_or_default(), settings);
    let heat = SubLayerSpec::new(sub_layer_id(id, HEAT), id, SubLayerKind::Heatmap).with_paint(paint::heatmap_paint(
        layer.weight.as_deref(),
        layer.radius.unwrap_or(settings.heat_radius),
        layer.intensity.unwrap_or(settings.heat_intensity),
        style.opacity,
    ));
    Plan::Ready(Draw {
        source: SourceSpec::GeoJson {
            data: data_value(&layer.data),
            cluster: None,
        },
        sub_layers: vec![heat],
        interactive: Vec::new(),
        table: inline_table(&layer.data),
    })
}

/// Fetch and parse the file out of band; a failure leaves the layer absent.
pub(super) fn plan_geoparquet(id: &str, layer: &GeoParquetLayer, ctx: &PlanContext<'_>) -> Result<Plan, SyncError> {
    let loader = ctx
        .resolvers
        .columnar
        .clone()
        .ok_or(SyncError::NotConfigured("columnar loader"))?;
    let load = loader.load(&layer.url, layer.geometry_column.as_deref());
    let id = id.to_string();
    let url = layer.url.clone();
    let common = layer.common.clone();
    let settings = ctx.settings.clone();
    Ok(Plan::Deferred(
        async move {
            match load.await {
                Ok(table) => {
                    log::info!("Loaded {} row(s) for layer {} from {}", table.rows.len(), id, url);
                    let mut draw = feature_draw(&id, table.features, None, &common, &settings);
                    draw.table = Some(TableData::from_rows(table.rows));
                    Some(draw)
                }
                Err(e) => {
                    log::warn!("Failed to load {} for layer {}: {}", url, id, e);
                    None
                }
            }
        }
        .boxed_local(),
    ))
}
