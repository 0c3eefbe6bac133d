use std::sync::{Mutex, OnceLock, PoisonError};

use crate::engine::{EngineError, RenderEngine};

/// One-time registration of the URL scheme that serves archive-packaged tiles.
///
/// The scheme is registered with the engine library at most once per
/// process; concurrent first calls all observe the same registration. A
/// failed registration is not remembered, so the next call tries again.
pub struct ArchiveProtocol {
    scheme: OnceLock<String>,
    registering: Mutex<()>,
}

/// The process-wide registration used by default.
pub static ARCHIVE_PROTOCOL: ArchiveProtocol = ArchiveProtocol::new();

impl ArchiveProtocol {
    pub const fn new() -> Self {
        Self {
            scheme: OnceLock::new(),
            registering: Mutex::new(()),
        }
    }

    /// Register `scheme` on first use. Returns the registered scheme, which
    /// stays the first one registered for the life of the process.
    pub fn ensure(&self, engine: &dyn RenderEngine, scheme: &str) -> Result<&str, EngineError> {
        if let Some(registered) = self.scheme.get() {
            return Ok(registered);
        }
        let _guard = self.registering.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(registered) = self.scheme.get() {
            return Ok(registered);
        }
        match engine.register_protocol(scheme) {
            Ok(()) => {
                log::info!("Registered {}:// tile protocol", scheme);
                Ok(self.scheme.get_or_init(|| scheme.to_string()))
            }
            Err(e) => {
                log::warn!("Failed to register {}:// tile protocol: {}", scheme, e);
                Err(e)
            }
        }
    }

    pub fn is_registered(&self) -> bool {
        self.scheme.get().is_some()
    }

    /// Rewrite an archive URL to go through the registered scheme.
    pub fn url(&self, engine: &dyn RenderEngine, scheme: &str, url: &str) -> Result<String, EngineError> {
        let scheme = self.ensure(engine, scheme)?;
        let prefix = format!("{}://", scheme);
        if url.starts_with(&prefix) {
            Ok(url.to_string())
        } else {
            Ok(format!("{}{}", prefix, url))
        }
    }
}

impl Default for ArchiveProtocol {
    fn default() -> Self {
        Self::new()
    }
}
