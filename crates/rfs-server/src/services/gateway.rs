//! Resource gateway
//!
//! Maps the Node, Content, Archive and Authority resources onto the core
//! filesystem primitives. Every guarded operation checks the caller's
//! session before touching the filesystem.

use crate::error::{ApiError, ApiResult};
use crate::services::CredentialVerifier;
use crate::storage::{Session, SessionContext, SessionStore};
use rfs_core::{
    codec, display_name, ArchiveBuilder, ContentStream, ContentStreamer, NodeInspector, RfsError,
    StreamableArtifact,
};
use rfs_types::NodeDescriptor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ResourceGateway {
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialVerifier>,
    inspector: NodeInspector,
    streamer: ContentStreamer,
    archives: ArchiveBuilder,
}

impl ResourceGateway {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialVerifier>,
        streamer: ContentStreamer,
        archives: ArchiveBuilder,
    ) -> Self {
        Self {
            sessions,
            credentials,
            inspector: NodeInspector::new(),
            streamer,
            archives,
        }
    }

    /// Describe the node named by `identifier`.
    pub async fn get_node(&self, ctx: &SessionContext, identifier: &str) -> ApiResult<NodeDescriptor> {
        self.require_session(ctx).await?;
        let path = resolve(identifier)?;
        debug!("Describing {}", path.display());

        let inspector = self.inspector;
        let node = tokio::task::spawn_blocking(move || inspector.describe(&path))
            .await
            .map_err(|e| ApiError::Internal(format!("node inspection task failed: {}", e)))??;
        Ok(node)
    }

    /// Resolve a regular file for raw download. Directories, FIFOs, sockets
    /// and devices are refused.
    pub async fn get_content(
        &self,
        ctx: &SessionContext,
        identifier: &str,
    ) -> ApiResult<StreamableArtifact> {
        self.require_session(ctx).await?;
        let path = resolve(identifier)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| RfsError::from_io(&path, e))?;
        if !metadata.is_file() {
            return Err(RfsError::NotAFile(path).into());
        }

        let filename = display_name(&path);
        Ok(StreamableArtifact::new(path, filename))
    }

    /// Build a scratch archive of the node named by `identifier`.
    pub async fn get_archive(
        &self,
        ctx: &SessionContext,
        identifier: &str,
    ) -> ApiResult<StreamableArtifact> {
        self.require_session(ctx).await?;
        let path = resolve(identifier)?;
        info!("Archive requested for {}", path.display());

        let archives = self.archives.clone();
        let artifact = tokio::task::spawn_blocking(move || archives.build(&path))
            .await
            .map_err(|e| ApiError::Internal(format!("archive task failed: {}", e)))??;
        Ok(artifact)
    }

    /// Hand an artifact to the streamer, which takes over its cleanup.
    pub async fn stream(&self, artifact: StreamableArtifact) -> ApiResult<ContentStream> {
        Ok(self.streamer.open_artifact(artifact).await?)
    }

    /// Check credentials and open a session.
    pub async fn authenticate(&self, username: &str, password: &str) -> ApiResult<Session> {
        if !self.credentials.verify(username, password).await {
            warn!("Authentication failed for: {}", username);
            return Err(ApiError::InvalidCredentials);
        }

        let session = self.sessions.create(username).await;
        info!("Authentication successful for: {}", username);
        Ok(session)
    }

    async fn require_session(&self, ctx: &SessionContext) -> ApiResult<()> {
        if self.sessions.is_authenticated(ctx).await {
            Ok(())
        } else {
            Err(ApiError::AuthenticationRequired)
        }
    }
}

/// Decode an identifier into an absolute path.
fn resolve(identifier: &str) -> Result<PathBuf, RfsError> {
    let path = codec::decode(identifier)?;
    if !path.is_absolute() {
        return Err(RfsError::Decode(format!(
            "{} does not name an absolute path",
            identifier
        )));
    }
    Ok(path)
}
