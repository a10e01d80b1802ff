pub mod actor;
pub mod config;
pub mod engine;
pub mod events;
pub mod outbound;
pub mod reconcile;
pub mod session;
pub mod state;

pub use actor::{spawn_engine, EngineCommand, EngineHandle, SpawnedEngine};
pub use config::ClientConfig;
pub use engine::{FlushReport, SyncEngine};
pub use events::{EngineEvent, ViewPayload};
pub use session::{Session, SessionError, SessionManager};
pub use state::{Connectivity, SyncSnapshot};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.  Respects `RUST_LOG`.
///
/// Logs go to stderr so they never interleave with the chat on stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("obrol_client=debug,obrol_store=info,obrol_net=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
