//! # MapSpec Core
//!
//! Declarative map specification model, patch application,
//! reconciliation signatures and the render settings shared by the other
//! MapSpec crates.
//!
//! A specification is held in two shapes: the raw JSON document that
//! patches are applied to ([`SpecDocument`]), and the typed
//! [`Specification`] that the sync layer renders.

pub mod camera;
pub mod layer;
pub mod marker;
pub mod patch;
pub mod settings;
pub mod signature;
pub mod spec;

pub use camera::{CameraTarget, CameraView, LngLat, LngLatBounds, Projection};
pub use layer::{ColorSpec, LayerCommon, LayerDefinition, LayerKind, LayerStyle, Tooltip};
pub use marker::{MarkerDefinition, MarkerPopup};
pub use patch::{PatchError, PatchOp, PatchOperation, PatchPath, SpecDocument};
pub use settings::{RenderSettings, SettingsError};
pub use signature::{Signature, SignatureCache};
pub use spec::{ControlsBlock, Corner, LegendDefinition, Specification, WidgetDefinition};
