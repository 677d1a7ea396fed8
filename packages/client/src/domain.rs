//! Prompt commands and reconnect policy.

use crate::error::ClientError;

/// One line typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand<'a> {
    /// `exit`: leave the chat
    Exit,
    /// `list`: print the connected users
    List,
    /// Anything else is sent as a chat message
    Chat(&'a str),
}

impl<'a> InputCommand<'a> {
    /// Interpret a prompt line. Commands are case-insensitive.
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            Self::Exit
        } else if trimmed.eq_ignore_ascii_case("list") {
            Self::List
        } else {
            Self::Chat(line)
        }
    }
}

/// Answer to "join this room? (Y/n)". Anything but `n` keeps the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAnswer {
    Keep,
    Change,
}

impl RoomAnswer {
    pub fn parse(line: &str) -> Self {
        if line.trim().eq_ignore_ascii_case("n") {
            Self::Change
        } else {
            Self::Keep
        }
    }
}

/// 再試行しても結果が変わらないエラーか。
///
/// サーバーが資格情報を拒否した場合（重複・不正な形式）は同じ credentials で
/// 再接続しても拒否されるため、即座に終了する。
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::RegistrationRejected(_))
}

/// `attempts_so_far` 回の再接続を終えた時点で、もう一度接続を試みるか。
pub fn should_attempt_reconnect(error: &ClientError, attempts_so_far: u32, limit: u32) -> bool {
    !should_exit_immediately(error) && attempts_so_far < limit
}
