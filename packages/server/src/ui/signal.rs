//! Shutdown signal handling.

use std::io::BufRead;

use tokio::{signal, sync::mpsc};

/// Operator command typed on the server console
pub const STOP_COMMAND: &str = "stop";

/// Resolves on Ctrl+C, SIGTERM or `stop` typed on the console.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let console = wait_for_stop_command(spawn_console_reader());

    let received = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
        _ = console => "stop command",
    };

    tracing::info!("Received {}, shutting down gracefully...", received);
}

/// Forward console lines from a detached thread.
///
/// A blocking read on stdin does not hold up runtime shutdown this way.
fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Console input unavailable: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Resolves once a line equal to `stop` (case-insensitive) is received.
///
/// Other lines are ignored. When the console closes without `stop` the future
/// never resolves, so a server without a terminal keeps running until it is
/// signalled.
pub async fn wait_for_stop_command(mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        if line.trim().eq_ignore_ascii_case(STOP_COMMAND) {
            return;
        }
        tracing::warn!(
            "Unknown console command '{}' (type '{}' to shut down)",
            line.trim(),
            STOP_COMMAND
        );
    }
    std::future::pending::<()>().await;
}
