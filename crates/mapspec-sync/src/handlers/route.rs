use futures::future::{self, FutureExt};
use serde_json::json;

use mapspec_core::layer::RouteLayer;
use mapspec_core::LngLat;

use super::{sub_layer_id, Draw, Plan, PlanContext, LINE};
use crate::engine::{SourceSpec, SubLayerKind, SubLayerSpec};
use crate::layer_sync::SyncError;
use crate::paint::{self, ResolvedStyle};
use crate::resolve::ResolveError;

fn route_draw(id: &str, path: &[LngLat], layer: &RouteLayer, style: &ResolvedStyle) -> Draw {
    let mut properties = serde_json::Map::new();
    properties.insert("id".to_string(), json!(id));
    properties.insert("profile".to_string(), json!(layer.profile.as_str()));
    if let Some(label) = &layer.common.label {
        properties.insert("label".to_string(), json!(label));
    }
    let feature = json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {"type": "LineString", "coordinates": path}
    });
    let line = SubLayerSpec::new(sub_layer_id(id, LINE), id, SubLayerKind::Line)
        .with_paint(paint::line_paint(style, false))
        .with_layout(paint::line_layout());
    let interactive = vec![line.id.clone()];
    Draw {
        source: SourceSpec::GeoJson {
            data: feature,
            cluster: None,
        },
        sub_layers: vec![line],
        interactive,
        table: None,
    }
}

/// Manual coordinates draw immediately. Waypoints are routed out of band,
/// falling back to a straight line through them when routing fails.
pub(super) fn plan_route(id: &str, layer: &RouteLayer, ctx: &PlanContext<'_>) -> Result<Plan, SyncError> {
    let style = ResolvedStyle::resolve(&layer.common.style.clone().unwrap_or_default(), ctx.settings);

    if let Some(coordinates) = &layer.coordinates {
        if coordinates.len() < 2 {
            return Err(SyncError::InvalidDefinition(format!(
                "route {} needs at least two coordinates",
                id
            )));
        }
        return Ok(Plan::Ready(route_draw(id, coordinates, layer, &style)));
    }
    if layer.waypoints.len() < 2 {
        return Err(SyncError::InvalidDefinition(format!(
            "route {} needs at least two waypoints",
            id
        )));
    }

    let resolution = match &ctx.resolvers.routes {
        Some(routes) => routes.resolve(&layer.waypoints, layer.profile),
        None => future::ready(Err(ResolveError::NotConfigured("route resolver"))).boxed_local(),
    };
    let id = id.to_string();
    let layer = layer.clone();
    Ok(Plan::Deferred(
        async move {
            let path = match resolution.await {
                Ok(path) if path.len() >= 2 => path,
                Ok(_) => {
                    log::warn!("Routing for {} returned no usable path, drawing a straight line", id);
                    layer.waypoints.clone()
                }
                Err(e) => {
                    log::warn!("Routing for {} failed ({}), drawing a straight line", id, e);
                    layer.waypoints.clone()
                }
            };
            Some(route_draw(&id, &path, &layer, &style))
        }
        .boxed_local(),
    ))
}
