//! Client execution logic with reconnection support.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
    args::{ClientConfig, parse_room},
    domain::{RoomAnswer, should_attempt_reconnect, should_exit_immediately},
    error::ClientError,
    formatter::MessageFormatter,
    session::run_client_session,
    ui::spawn_readline,
};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Run the client on stdin with reconnection logic
///
/// Unless `skip_room_confirmation` is set, the room is confirmed (or changed)
/// at the prompt before connecting.
pub async fn run_client(
    config: ClientConfig,
    skip_room_confirmation: bool,
) -> Result<(), ClientError> {
    let mut input = spawn_readline(&config.username);
    let config = if skip_room_confirmation {
        config
    } else {
        confirm_room(config, &mut input).await
    };
    run_with_input(&config, &mut input, RECONNECT_INTERVAL).await
}

/// Ask whether to join `config.room`; on `n`, read a new room number.
///
/// Invalid room numbers are asked again. If input closes, the current room is
/// kept and the session sees the closed input.
pub async fn confirm_room(
    mut config: ClientConfig,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> ClientConfig {
    println!("{}", MessageFormatter::format_room_question(&config.room));
    let Some(answer) = input.recv().await else {
        return config;
    };
    if RoomAnswer::parse(&answer) == RoomAnswer::Keep {
        tracing::info!("Room '{}' confirmed", config.room);
        return config;
    }

    loop {
        println!("{}", MessageFormatter::format_room_request());
        let Some(line) = input.recv().await else {
            return config;
        };
        match parse_room(&line) {
            Ok(room) => {
                tracing::info!("Room changed from '{}' to '{}'", config.room, room);
                config.room = room;
                return config;
            }
            Err(reason) => println!("Invalid room '{}': {}", line.trim(), reason),
        }
    }
}

/// Run sessions fed by `input`, reconnecting after lost connections.
///
/// A rejected registration is returned at once; other failures are retried up
/// to [`MAX_RECONNECT_ATTEMPTS`] times, `reconnect_interval` apart.
pub async fn run_with_input(
    config: &ClientConfig,
    input: &mut mpsc::UnboundedReceiver<String>,
    reconnect_interval: Duration,
) -> Result<(), ClientError> {
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} as '{}' in room '{}' (attempt {}/{})",
            config.url,
            config.username,
            config.room,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        match run_client_session(config, input).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                // If connection ended normally (user exit), don't reconnect
                return Ok(());
            }
            Err(e) if should_exit_immediately(&e) => {
                tracing::error!("{}", e);
                tracing::error!(
                    "Choose another username or room and start the client again."
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Connection lost: {}", e);
                reconnect_count += 1;

                if !should_attempt_reconnect(&e, reconnect_count, MAX_RECONNECT_ATTEMPTS) {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        MAX_RECONNECT_ATTEMPTS
                    );
                    return Err(e);
                }

                tracing::info!(
                    "Reconnecting in {:?}... (attempt {}/{})",
                    reconnect_interval,
                    reconnect_count + 1,
                    MAX_RECONNECT_ATTEMPTS
                );

                tokio::time::sleep(reconnect_interval).await;
            }
        }
    }
}
