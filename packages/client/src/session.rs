//! WebSocket client session management.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use roomchat_shared::protocol::{
    GET_SERVER_STATE, REGISTRATION_SUCCESS, ServerStateMessage, credentials, parse_error_reply,
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::{
    args::ClientConfig,
    domain::InputCommand,
    error::ClientError,
    formatter::MessageFormatter,
    pending::PendingRequests,
    ui::redisplay_prompt,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Run one WebSocket client session
///
/// Connects, registers `username:room`, prints the connected users and then
/// forwards lines from `input` until `exit`, the end of input, or a lost
/// connection.
///
/// # Returns
///
/// * `Ok(())` - The user left the chat
/// * `Err(ClientError::RegistrationRejected)` - The server refused the credentials
/// * `Err(_)` - The connection failed or was lost
pub async fn run_client_session(
    config: &ClientConfig,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let (ws_stream, _response) = connect_async(config.url.as_str())
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    tracing::info!("Connected to chat server!");

    let (mut write, mut read) = ws_stream.split();
    register(&mut write, &mut read, config).await?;
    tracing::info!(
        "Registered as '{}' in room '{}'",
        config.username,
        config.room
    );
    print!(
        "{}",
        MessageFormatter::format_welcome(&config.username, &config.room)
    );

    let pending = PendingRequests::new();
    let mut read_task = reader_loop(read, pending.clone(), config.clone());

    let result = chat_loop(&mut write, &mut read_task, input, &pending, config).await;

    read_task.abort();
    pending.cancel_all();
    if let Err(e) = write.close().await {
        tracing::debug!("Failed to close connection: {}", e);
    }
    result
}

async fn chat_loop(
    write: &mut WsSink,
    read_task: &mut JoinHandle<()>,
    input: &mut mpsc::UnboundedReceiver<String>,
    pending: &PendingRequests,
    config: &ClientConfig,
) -> Result<(), ClientError> {
    show_server_state(write, pending, config).await?;

    loop {
        tokio::select! {
            _ = &mut *read_task => {
                return Err(ClientError::ConnectionError("Connection lost".to_string()));
            }
            line = input.recv() => {
                let Some(line) = line else {
                    tracing::info!("Input closed, leaving the chat");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match InputCommand::parse(&line) {
                    InputCommand::Exit => {
                        tracing::info!("Exit requested");
                        return Ok(());
                    }
                    InputCommand::List => show_server_state(write, pending, config).await?,
                    InputCommand::Chat(text) => send_text(write, text).await?,
                }
            }
        }
    }
}

/// Send the credentials and wait for the registration verdict.
async fn register(
    write: &mut WsSink,
    read: &mut WsSource,
    config: &ClientConfig,
) -> Result<(), ClientError> {
    send_text(write, &credentials(&config.username, &config.room)).await?;

    let reply = tokio::time::timeout(config.reply_timeout, next_text(read))
        .await
        .map_err(|_| ClientError::Timeout("registration reply"))??;

    if reply == REGISTRATION_SUCCESS {
        return Ok(());
    }
    match parse_error_reply(&reply) {
        Some(reason) => Err(ClientError::RegistrationRejected(reason.to_string())),
        None => Err(ClientError::ConnectionError(format!(
            "unexpected registration reply: {}",
            reply
        ))),
    }
}

async fn next_text(read: &mut WsSource) -> Result<String, ClientError> {
    while let Some(message) = read.next().await {
        match message.map_err(|e| ClientError::ConnectionError(e.to_string()))? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Close(frame) => {
                let reason = frame
                    .map(|frame| frame.reason.as_str().to_owned())
                    .unwrap_or_default();
                return Err(ClientError::ConnectionError(format!(
                    "server closed the connection: {}",
                    reason
                )));
            }
            _ => {}
        }
    }
    Err(ClientError::ConnectionError(
        "connection closed".to_string(),
    ))
}

/// Request the connected users and print them.
///
/// A missing reply is logged and does not end the session.
async fn show_server_state(
    write: &mut WsSink,
    pending: &PendingRequests,
    config: &ClientConfig,
) -> Result<(), ClientError> {
    let reply = pending.register();
    send_text(write, GET_SERVER_STATE).await?;

    match reply.wait(config.reply_timeout).await {
        Ok(state) => {
            print_server_state(&state, config);
            Ok(())
        }
        Err(ClientError::Timeout(what)) => {
            tracing::warn!(
                "No reply for {} within {:?}",
                what,
                config.reply_timeout
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_server_state(state: &ServerStateMessage, config: &ClientConfig) {
    print!(
        "{}",
        MessageFormatter::format_server_state(state, &config.username, &config.room)
    );
    redisplay_prompt(&config.username);
}

async fn send_text(write: &mut WsSink, text: &str) -> Result<(), ClientError> {
    write
        .send(Message::text(text))
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))
}

/// Spawns a task that prints incoming frames and resolves pending state requests.
fn reader_loop(
    mut read: WsSource,
    pending: PendingRequests,
    config: ClientConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let text = text.as_str();
                    if let Some(state) = parse_server_state(text) {
                        if let Some(unclaimed) = pending.resolve(state) {
                            print_server_state(&unclaimed, &config);
                        }
                        continue;
                    }
                    print!("{}", MessageFormatter::format_chat_line(text));
                    redisplay_prompt(&config.username);
                }
                Ok(Message::Binary(data)) => {
                    print!("{}", MessageFormatter::format_binary_message(data.len()));
                    redisplay_prompt(&config.username);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        pending.cancel_all();
    })
}

/// Server state replies are the only JSON documents on the wire.
fn parse_server_state(text: &str) -> Option<ServerStateMessage> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    serde_json::from_str(text).ok()
}
