//! JSON-lines bridge between the session and an embedding UI.
//!
//! The UI writes one request per line on stdin and reads surface commands
//! and errors, one per line, on stdout. Logs go to stderr.

use flashplay_host::{Color, DeckId, Envelope, Generation, SessionCommand, SurfaceCommand};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

/// A request line from the UI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    SelectDeck {
        deck_id: DeckId,
    },
    /// A message the UI received from a plugin frame.
    Message {
        origin: String,
        generation: Generation,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Without a color the next palette color is used.
    ChangeBackgroundColor {
        #[serde(default)]
        color: Option<Color>,
    },
    Skip,
}

/// A line for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Surface(SurfaceCommand),
    Notice(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    Error { message: String },
}

impl Outbound {
    pub fn error(message: impl Into<String>) -> Self {
        Outbound::Notice(Notice::Error {
            message: message.into(),
        })
    }
}

/// Ask the session to study `deck_id`; a failure is reported to the UI.
///
/// Returns `false` once the session is gone.
pub async fn request_deck(
    commands: &mpsc::Sender<SessionCommand>,
    outbound: &mpsc::UnboundedSender<Outbound>,
    deck_id: DeckId,
) -> bool {
    let (reply, result) = oneshot::channel();
    let command = SessionCommand::SelectDeck {
        deck_id: deck_id.clone(),
        reply: Some(reply),
    };
    if commands.send(command).await.is_err() {
        return false;
    }

    let outbound = outbound.clone();
    tokio::spawn(async move {
        if let Ok(Err(e)) = result.await {
            tracing::warn!(deck_id = %deck_id, "deck selection failed: {e}");
            let _ = outbound.send(Outbound::error(e.to_string()));
        }
    });
    true
}

/// Turn one input line into a session command.
async fn dispatch(
    line: &str,
    commands: &mpsc::Sender<SessionCommand>,
    outbound: &mpsc::UnboundedSender<Outbound>,
) -> bool {
    let request: Inbound = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("ignoring malformed bridge request: {e}");
            return true;
        }
    };

    let command = match request {
        Inbound::SelectDeck { deck_id } => {
            return request_deck(commands, outbound, deck_id).await;
        }
        Inbound::Message {
            origin,
            generation,
            data,
        } => SessionCommand::Message(Envelope {
            origin,
            generation,
            data,
        }),
        Inbound::ChangeBackgroundColor { color: Some(color) } => SessionCommand::Broadcast(color),
        Inbound::ChangeBackgroundColor { color: None } => SessionCommand::CycleColor,
        Inbound::Skip => SessionCommand::Skip,
    };
    commands.send(command).await.is_ok()
}

/// Read requests until EOF or until the session stops.
pub async fn read_inbound<R>(
    reader: R,
    commands: mpsc::Sender<SessionCommand>,
    outbound: mpsc::UnboundedSender<Outbound>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !dispatch(line, &commands, &outbound).await {
            tracing::info!("session stopped, no longer reading requests");
            break;
        }
    }
    Ok(())
}

/// Write outbound lines until every sender is dropped.
pub async fn write_outbound<W>(
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashplay_host::{HostError, HostMessage};
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Inbound {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_select_deck() {
        assert_eq!(
            parse(json!({"type": "selectDeck", "deckId": 4})),
            Inbound::SelectDeck {
                deck_id: DeckId::from("4")
            }
        );
    }

    #[test]
    fn test_parse_message_defaults_data() {
        assert_eq!(
            parse(json!({"type": "message", "origin": "http://localhost:8080", "generation": 2})),
            Inbound::Message {
                origin: "http://localhost:8080".into(),
                generation: Generation::new(2),
                data: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn test_parse_color_optional() {
        assert_eq!(
            parse(json!({"type": "changeBackgroundColor", "color": "blue"})),
            Inbound::ChangeBackgroundColor {
                color: Some(Color::Blue)
            }
        );
        assert_eq!(
            parse(json!({"type": "changeBackgroundColor"})),
            Inbound::ChangeBackgroundColor { color: None }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(serde_json::from_value::<Inbound>(json!({"type": "reboot"})).is_err());
    }

    #[test]
    fn test_outbound_shapes() {
        let post = Outbound::Surface(SurfaceCommand::PostMessage {
            generation: Generation::new(3),
            message: HostMessage::ChangeBackgroundColor { color: Color::Red },
            target_origin: "http://localhost:8080".into(),
        });
        assert_eq!(
            serde_json::to_value(&post).unwrap(),
            json!({
                "type": "postMessage",
                "generation": 3,
                "message": {"type": "changeBackgroundColor", "color": "red"},
                "targetOrigin": "http://localhost:8080"
            })
        );
        assert_eq!(
            serde_json::to_value(Outbound::error("deck is empty")).unwrap(),
            json!({"type": "error", "message": "deck is empty"})
        );
    }

    #[tokio::test]
    async fn test_read_inbound_forwards_commands() {
        let input: &[u8] = b"{\"type\":\"message\",\"origin\":\"http://localhost:8080\",\"generation\":1,\"data\":{\"type\":\"finish\"}}\n\
            \n\
            not json\n\
            {\"type\":\"changeBackgroundColor\",\"color\":\"green\"}\n\
            {\"type\":\"changeBackgroundColor\"}\n\
            {\"type\":\"skip\"}\n";
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (out_tx, _out_rx) = mpsc::unbounded_channel();

        read_inbound(input, cmd_tx, out_tx).await.unwrap();

        match cmd_rx.recv().await {
            Some(SessionCommand::Message(envelope)) => {
                assert_eq!(envelope.generation, Generation::new(1));
                assert_eq!(envelope.data, json!({"type": "finish"}));
            }
            other => panic!("expected message, got {other:?}"),
        }
        assert!(matches!(
            cmd_rx.recv().await,
            Some(SessionCommand::Broadcast(Color::Green))
        ));
        assert!(matches!(
            cmd_rx.recv().await,
            Some(SessionCommand::CycleColor)
        ));
        assert!(matches!(cmd_rx.recv().await, Some(SessionCommand::Skip)));
        assert!(cmd_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_deck_error_is_reported() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        assert!(request_deck(&cmd_tx, &out_tx, DeckId::from("9")).await);
        match cmd_rx.recv().await {
            Some(SessionCommand::SelectDeck { deck_id, reply }) => {
                assert_eq!(deck_id, DeckId::from("9"));
                let _ = reply
                    .unwrap()
                    .send(Err(HostError::EmptyDeck(deck_id.to_string())));
            }
            other => panic!("expected deck selection, got {other:?}"),
        }

        assert_eq!(
            out_rx.recv().await.unwrap(),
            Outbound::error("deck 9 has no playable cards")
        );
    }

    #[tokio::test]
    async fn test_request_deck_after_session_stopped() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        drop(cmd_rx);
        assert!(!request_deck(&cmd_tx, &out_tx, DeckId::from("1")).await);
    }

    #[tokio::test]
    async fn test_write_outbound_one_json_per_line() {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        out_tx.send(Outbound::error("first")).unwrap();
        out_tx.send(Outbound::error("second")).unwrap();
        drop(out_tx);

        let mut buf = Vec::new();
        write_outbound(out_rx, &mut buf).await.unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"type":"error","message":"first"}"#,
                r#"{"type":"error","message":"second"}"#
            ]
        );
    }
}
