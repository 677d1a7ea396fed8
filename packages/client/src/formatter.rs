//! Message formatting utilities for client display.

use roomchat_shared::protocol::ServerStateMessage;

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the connected users, one line per room
    ///
    /// # Arguments
    ///
    /// * `state` - Snapshot received from the server
    /// * `current_username` - The current user's name
    /// * `current_room` - The current user's room (to mark the user as "me")
    ///
    /// # Returns
    ///
    /// A formatted string with rooms in numeric order
    pub fn format_server_state(
        state: &ServerStateMessage,
        current_username: &str,
        current_room: &str,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nRooms and users:\n", RULE));

        let rooms = state.rooms();
        if rooms.is_empty() {
            output.push_str("(No users connected)\n");
        } else {
            for (room, users) in rooms {
                let users: Vec<String> = users
                    .into_iter()
                    .map(|user| {
                        if room == current_room && user == current_username {
                            format!("{} (me)", user)
                        } else {
                            user.to_string()
                        }
                    })
                    .collect();
                output.push_str(&format!("Room {}: [{}]\n", room, users.join(", ")));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format a chat line received from the server (`"<user> : <room> : <content>"`)
    pub fn format_chat_line(line: &str) -> String {
        format!("\n{}\n", line)
    }

    /// Question asked before connecting
    pub fn format_room_question(room: &str) -> String {
        format!("You chose room '{}'. Join it? (Y/n)", room)
    }

    /// Request for a new room number
    pub fn format_room_request() -> String {
        "Enter a room number (1-20):".to_string()
    }

    /// Format the banner printed after registration
    pub fn format_welcome(username: &str, room: &str) -> String {
        format!(
            "\nYou are '{}' in room '{}'. Type messages and press Enter to send.\n\
             Commands: 'list' shows connected users, 'exit' quits.\n",
            username, room
        )
    }

    /// Format a binary message notification
    pub fn format_binary_message(byte_count: usize) -> String {
        format!("\n← Received {} bytes of binary data\n", byte_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomchat_shared::protocol::ConnectedUser;

    fn user(room: &str, username: &str) -> ConnectedUser {
        ConnectedUser {
            room: room.to_string(),
            username: username.to_string(),
        }
    }

    #[test]
    fn test_format_server_state_with_no_users() {
        // テスト項目: 接続中ユーザーが空の場合、適切なメッセージが表示される
        // given (前提条件):
        let state = ServerStateMessage {
            connected_users: vec![],
        };

        // when (操作):
        let result = MessageFormatter::format_server_state(&state, "alice", "1");

        // then (期待する結果):
        assert!(result.contains("Rooms and users:"));
        assert!(result.contains("(No users connected)"));
    }

    #[test]
    fn test_format_server_state_groups_and_orders_rooms() {
        // テスト項目: ルームごとにまとめられ、ルームは数値順に並び、自分には (me) が付く
        // given (前提条件):
        let state = ServerStateMessage {
            connected_users: vec![
                user("10", "dave"),
                user("2", "bob"),
                user("1", "alice"),
                user("2", "carol"),
            ],
        };

        // when (操作):
        let result = MessageFormatter::format_server_state(&state, "bob", "2");

        // then (期待する結果):
        let expected = "Room 1: [alice]\nRoom 2: [bob (me), carol]\nRoom 10: [dave]\n";
        assert!(result.contains(expected), "{}", result);
    }

    #[test]
    fn test_same_name_in_other_room_is_not_me() {
        // テスト項目: 別のルームの同名ユーザーには (me) が付かない
        // given (前提条件):
        let state = ServerStateMessage {
            connected_users: vec![user("1", "alice"), user("2", "alice")],
        };

        // when (操作):
        let result = MessageFormatter::format_server_state(&state, "alice", "2");

        // then (期待する結果):
        assert!(result.contains("Room 1: [alice]\n"));
        assert!(result.contains("Room 2: [alice (me)]\n"));
    }

    #[test]
    fn test_format_chat_line_is_verbatim() {
        // テスト項目: チャット行はそのまま表示される
        // given (前提条件):
        let line = "alice : 1 : time: 12:30";

        // when (操作):
        let result = MessageFormatter::format_chat_line(line);

        // then (期待する結果):
        assert_eq!(result, "\nalice : 1 : time: 12:30\n");
    }
}
