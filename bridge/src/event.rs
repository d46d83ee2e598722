use std::path::PathBuf;
use std::process::ExitStatus;

pub enum BridgeEvent {
    /// The bundler wrote an output artifact under the watched directory.
    ArtifactWritten(PathBuf),
    /// The spawned application process exited on its own (not killed by us).
    AppExited(ExitStatus),
    /// Ctrl+C received or the session was stopped; tear everything down.
    Shutdown,
}
