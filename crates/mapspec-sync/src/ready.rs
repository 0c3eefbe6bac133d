use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::engine::RenderEngine;

/// Resolves once the engine's style is fully loaded.
///
/// Ready immediately when the style is already loaded. Otherwise waits on
/// the engine's one-shot load notification; resolves `false` if the engine
/// drops the notification without firing it.
pub fn style_ready(engine: &dyn RenderEngine) -> LocalBoxFuture<'static, bool> {
    if engine.is_style_loaded() {
        return future::ready(true).boxed_local();
    }
    let (tx, rx) = oneshot::channel::<()>();
    engine.on_style_load(Box::new(move || {
        let _ = tx.send(());
    }));
    rx.map(|r| r.is_ok()).boxed_local()
}
