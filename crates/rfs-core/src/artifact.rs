//! Streamable artifacts and their finalize step

use std::fmt;
use std::path::PathBuf;

/// How a stream ended, reported to its cleanup action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every chunk was yielded and end-of-file was reached
    Completed,
    /// A read error aborted the stream before end-of-file
    Failed,
    /// The stream was dropped before finishing, e.g. the client went away
    Abandoned,
}

/// Action run once when streaming of an artifact ends
pub type CleanupAction = Box<dyn FnOnce(StreamOutcome) + Send + 'static>;

/// A file ready for chunked transport.
///
/// The artifact owns its cleanup action; whoever consumes the artifact
/// takes over the obligation to run it.
pub struct StreamableArtifact {
    pub path: PathBuf,
    pub filename: String,
    pub cleanup: Option<CleanupAction>,
}

impl StreamableArtifact {
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            cleanup: None,
        }
    }

    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce(StreamOutcome) + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Split the artifact into its parts, handing the cleanup to a guard.
    pub(crate) fn into_parts(mut self) -> (PathBuf, String, Finalizer) {
        let finalizer = Finalizer::new(self.cleanup.take());
        (
            std::mem::take(&mut self.path),
            std::mem::take(&mut self.filename),
            finalizer,
        )
    }
}

impl fmt::Debug for StreamableArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamableArtifact")
            .field("path", &self.path)
            .field("filename", &self.filename)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

impl Drop for StreamableArtifact {
    fn drop(&mut self) {
        // An artifact that never reached a stream still owes its cleanup.
        if let Some(cleanup) = self.cleanup.take() {
            cleanup(StreamOutcome::Abandoned);
        }
    }
}

/// Runs a cleanup action exactly once: explicitly via [`Finalizer::finish`]
/// or, failing that, on drop with [`StreamOutcome::Abandoned`].
pub(crate) struct Finalizer {
    action: Option<CleanupAction>,
}

impl Finalizer {
    pub(crate) fn new(action: Option<CleanupAction>) -> Self {
        Self { action }
    }

    pub(crate) fn finish(&mut self, outcome: StreamOutcome) {
        if let Some(action) = self.action.take() {
            action(outcome);
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.finish(StreamOutcome::Abandoned);
    }
}
