use thiserror::Error;

/// Errors raised while launching or controlling a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("waitpid failed: {0}")]
    Wait(#[source] nix::Error),

    #[error("failed to signal worker: {0}")]
    Signal(#[source] nix::Error),

    #[error("worker cannot be force-stopped")]
    ForceStopUnsupported,
}
