//! Process layer: spawning, supervising, and probing external commands.
//!
//! Everything the core runs — entry points, `conda`, `docker`, `kubectl`,
//! `git` — goes through this crate. Children that must be cancellable are
//! spawned as process-group leaders so best-effort cleanup can reach their
//! descendants.

mod error;
pub use error::ExecError;

mod spec;
pub use spec::{CmdSpec, HostEnv};

mod spawn;
pub use spawn::{SpawnedChild, kill_graceful, kill_group, spawn_in_group};

mod capture;
pub use capture::{probe, run_and_capture, run_checked, run_checked_with_stdin};

mod shell;
pub use shell::shell_cmd;
