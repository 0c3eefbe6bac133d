//! # mapspec-sync
//!
//! Keeps a live rendering engine in line with successive map specifications.
//! Layer sync diffs layers by signature and dispatches each kind to its
//! handler; marker sync diffs markers by id; [`MapSession`] composes both
//! with basemap, projection and camera updates.
//!
//! Everything runs on one thread. Network and parse work is spawned on a
//! [`futures::task::LocalSpawn`] and lands only while still relevant.

pub mod archive;
pub mod engine;
pub mod events;
mod handlers;
pub mod latest;
pub mod layer_sync;
pub mod marker_sync;
pub mod paint;
pub mod pending;
pub mod ready;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod tabular;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{ArchiveProtocol, ARCHIVE_PROTOCOL};
pub use engine::{
    ClusterSettings, DragPhase, EngineError, EngineSlot, ListenerId, MarkerCallbacks, PointerCallback, PointerEvent,
    PointerEventKind, RenderEngine, SourceSpec, SubLayerKind, SubLayerSpec,
};
pub use events::{EventSink, MapEvent, SinkCell};
pub use latest::LatestCell;
pub use layer_sync::{LayerSync, LayerSyncBuilder, PassReport, RuntimeLayerHandle, SyncError};
pub use marker_sync::{MarkerReport, MarkerSync};
pub use pending::{PendingSet, Ticket};
pub use ready::style_ready;
pub use registry::{HandlerRegistry, Registration};
pub use resolve::{
    ColumnarLoader, ColumnarTable, ResolveError, Resolvers, RouteResolver, TileMetadata, TileMetadataLoader,
    VectorLayerInfo,
};
pub use session::{MapSession, SessionReport};
pub use tabular::{AnalyticsTables, TableData, TabularCache};
