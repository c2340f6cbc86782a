//! Publish / download facade.
//!
//! # Example
//!
//! ```no_run
//! use peerfs_core::transport::memory::MemoryMesh;
//! use peerfs_core::{SessionConfig, Swarm};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = MemoryMesh::new();
//! let publisher = Swarm::new(Arc::new(mesh.endpoint("pub")), SessionConfig::default());
//! let downloader = Swarm::new(Arc::new(mesh.endpoint("get")), SessionConfig::default());
//!
//! let seed = publisher.publish("report.pdf", "hunter2")?;
//! let tag = seed.ready().await?;
//! seed.start().await?;
//!
//! let fetch = downloader.download(tag, "report-copy.pdf", "hunter2")?;
//! fetch.ready().await?;
//! fetch.start().await?;
//! mesh.connect(&"pub".into(), &"get".into());
//! fetch.finished().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::SessionConfig;
use crate::session::{Publisher, SessionHandle, Spreader};
use crate::transport::Transport;
use crate::Result;
use peerfs_crypto::Tag;
use std::path::Path;
use std::sync::Arc;

/// Entry point for sessions sharing one transport
#[derive(Clone)]
pub struct Swarm {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
}

impl Swarm {
    /// Create a swarm over `transport`
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    /// Session configuration used for new sessions
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transport shared by all sessions
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Stage `filename` under a fresh tag and seed it.
    ///
    /// The returned session is not started; await [`SessionHandle::ready`]
    /// for the tag, then call [`SessionHandle::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be spawned. Staging failures
    /// surface through [`SessionHandle::ready`].
    pub fn publish(&self, filename: impl AsRef<Path>, password: &str) -> Result<SessionHandle> {
        let role = Publisher::new(filename.as_ref(), password);
        SessionHandle::spawn(role, self.transport.clone(), self.config.clone())
    }

    /// Collect the file tagged `tag` into `filename` and reseed it.
    ///
    /// Frames are handled as soon as the session is ready; reseeding starts
    /// with [`SessionHandle::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be spawned.
    pub fn download(
        &self,
        tag: Tag,
        filename: impl AsRef<Path>,
        password: &str,
    ) -> Result<SessionHandle> {
        let role = Spreader::new(tag, filename.as_ref(), password);
        SessionHandle::spawn(role, self.transport.clone(), self.config.clone())
    }
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm")
            .field("local_id", self.transport.local_id())
            .field("config", &self.config)
            .finish()
    }
}
