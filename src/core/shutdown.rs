//! # Termination signal handling.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to stop; it drives
//! [`Scheduler::run_until_signal`](crate::Scheduler::run_until_signal).
//!
//! - Unix: `SIGINT`, `SIGTERM` (systemd/Kubernetes stop), `SIGQUIT`
//! - elsewhere: `Ctrl-C` via [`tokio::signal::ctrl_c`]

/// Waits for a termination signal.
///
/// Returns `Err` if the signal handlers cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
