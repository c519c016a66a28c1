// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Message normalization and provider wire conversion.
//!
//! Incoming raw messages are normalized exactly once into the tagged
//! [`MessageContent`] representation (simple flat text or rich content
//! parts); the wire layer converts between that representation and what a
//! given provider accepts. Providers that only understand flat text get
//! every part serialized to text and concatenated; providers with rich
//! content pass parts through unchanged.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::{ChatMessage, ContentPart, MessageContent, Role};

/// Separator used when collapsing multiple content parts into flat text.
const PART_SEPARATOR: &str = "\n\n";

/// The richest message shape a provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// Provider only accepts a single flat text field per message.
    FlatText,
    /// Provider accepts ordered content parts, including non-text payloads.
    RichParts,
}

/// A message in provider wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: WireContent,
}

/// Wire content is either a flat string or an array of parts, matching the
/// two shapes real chat APIs expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Normalize a raw message into a [`ChatMessage`].
///
/// Empty parts are dropped; a message left with no usable content is
/// rejected with [`SessionError::InvalidMessage`] before it can reach a
/// history. A rich message whose only surviving part is bare text collapses
/// to the simple shape. Unrecognized roles coerce to system (see
/// [`Role::parse_lossy`]).
pub fn normalize(role: &str, content: MessageContent) -> Result<ChatMessage, SessionError> {
    let role = Role::parse_lossy(role);

    let content = match content {
        MessageContent::Text(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(SessionError::InvalidMessage(
                    "message has no usable content".to_string(),
                ));
            }
            MessageContent::Text(text)
        }
        MessageContent::Parts(parts) => {
            let parts: Vec<ContentPart> = parts.into_iter().filter(|p| !p.is_empty()).collect();
            match parts.as_slice() {
                [] => {
                    return Err(SessionError::InvalidMessage(
                        "message has no usable content".to_string(),
                    ))
                }
                [ContentPart::Text { text }] => MessageContent::Text(text.trim().to_string()),
                _ => MessageContent::Parts(parts),
            }
        }
    };

    Ok(ChatMessage::new(role, content))
}

/// Serialize one message's content to a single flat string.
///
/// Text parts pass through; structured parts are JSON-stringified. Parts are
/// joined with a blank line, in part order. Also used for local token
/// estimation.
pub fn flatten_to_text(message: &ChatMessage) -> String {
    match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                // Opaque parts survive flattening as their JSON form
                other => serde_json::to_string(other).unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR),
    }
}

/// Convert provider-neutral messages to the wire form for `shape`.
pub fn to_wire(shape: WireShape, messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| {
            let content = match (shape, &msg.content) {
                (_, MessageContent::Text(text)) => WireContent::Text(text.clone()),
                (WireShape::FlatText, MessageContent::Parts(_)) => {
                    WireContent::Text(flatten_to_text(msg))
                }
                (WireShape::RichParts, MessageContent::Parts(parts)) => {
                    WireContent::Parts(parts.clone())
                }
            };
            WireMessage {
                role: msg.role.as_str().to_string(),
                content,
            }
        })
        .collect()
}

/// Convert wire messages back to the provider-neutral form.
///
/// If every part of every message is bare text the whole set comes back in
/// the simple shape; otherwise messages keep their rich shape. The
/// classification is deterministic, but exact equality with the inbound side
/// is not guaranteed for structured-part sets.
pub fn from_wire(shape: WireShape, wire: Vec<WireMessage>) -> Vec<ChatMessage> {
    let _ = shape;
    let all_text = wire.iter().all(|msg| match &msg.content {
        WireContent::Text(_) => true,
        WireContent::Parts(parts) => parts.iter().all(ContentPart::is_text),
    });

    wire.into_iter()
        .map(|msg| {
            let role = Role::parse_lossy(&msg.role);
            let content = match msg.content {
                WireContent::Text(text) => MessageContent::Text(text),
                WireContent::Parts(parts) if all_text => MessageContent::Text(
                    parts
                        .iter()
                        .filter_map(|p| match p {
                            ContentPart::Text { text } => Some(text.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(PART_SEPARATOR),
                ),
                WireContent::Parts(parts) => MessageContent::Parts(parts),
            };
            ChatMessage::new(role, content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flat_text() {
        let msg = normalize("user", MessageContent::Text("  hello  ".into())).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.as_text(), Some("hello"));
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(
            normalize("user", MessageContent::Text("   ".into())),
            Err(SessionError::InvalidMessage(_))
        ));
        assert!(matches!(
            normalize("user", MessageContent::Parts(vec![])),
            Err(SessionError::InvalidMessage(_))
        ));
        // Parts that are all empty are dropped, leaving nothing usable
        assert!(matches!(
            normalize(
                "user",
                MessageContent::Parts(vec![ContentPart::text("  "), ContentPart::text("")])
            ),
            Err(SessionError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_normalize_coerces_unknown_role() {
        let msg = normalize("tool", MessageContent::Text("output".into())).unwrap();
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_normalize_collapses_single_text_part() {
        let msg = normalize(
            "assistant",
            MessageContent::Parts(vec![ContentPart::text("just text")]),
        )
        .unwrap();
        assert_eq!(msg.as_text(), Some("just text"));
    }

    #[test]
    fn test_normalize_keeps_rich_shape() {
        let msg = normalize(
            "user",
            MessageContent::Parts(vec![
                ContentPart::text("look at this"),
                ContentPart::data("image/png", "aGk="),
            ]),
        )
        .unwrap();
        assert_eq!(msg.as_parts().unwrap().len(), 2);
    }

    #[test]
    fn test_flatten_stringifies_structured_parts() {
        let msg = ChatMessage::with_parts(
            Role::User,
            vec![
                ContentPart::text("caption"),
                ContentPart::data("image/png", "aGk="),
            ],
        );
        let flat = flatten_to_text(&msg);
        assert!(flat.starts_with("caption\n\n"));
        assert!(flat.contains("\"type\":\"data\""));
        assert!(flat.contains("\"media_type\":\"image/png\""));
    }

    #[test]
    fn test_to_wire_flat_degrades_parts() {
        let messages = vec![ChatMessage::with_parts(
            Role::User,
            vec![
                ContentPart::text("a"),
                ContentPart::data("application/json", "e30="),
            ],
        )];
        let wire = to_wire(WireShape::FlatText, &messages);
        match &wire[0].content {
            WireContent::Text(text) => {
                assert!(text.starts_with("a\n\n"));
                assert!(text.contains("application/json"));
            }
            _ => panic!("expected flat text"),
        }
    }

    #[test]
    fn test_to_wire_rich_passes_parts_through() {
        let parts = vec![
            ContentPart::text("a"),
            ContentPart::data("image/png", "aGk="),
        ];
        let messages = vec![ChatMessage::with_parts(Role::User, parts.clone())];
        let wire = to_wire(WireShape::RichParts, &messages);
        assert_eq!(wire[0].content, WireContent::Parts(parts));
    }

    #[test]
    fn test_round_trip_preserves_text_and_roles() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi there"),
        ];
        for shape in [WireShape::FlatText, WireShape::RichParts] {
            let back = from_wire(shape, to_wire(shape, &messages));
            assert_eq!(back.len(), messages.len());
            for (orig, round) in messages.iter().zip(&back) {
                assert_eq!(orig.role, round.role);
                assert_eq!(orig.as_text(), round.as_text());
            }
        }
    }

    #[test]
    fn test_from_wire_classifies_rich() {
        let wire = vec![
            WireMessage {
                role: "user".into(),
                content: WireContent::Text("plain".into()),
            },
            WireMessage {
                role: "user".into(),
                content: WireContent::Parts(vec![ContentPart::data("image/png", "aGk=")]),
            },
        ];
        let back = from_wire(WireShape::RichParts, wire);
        // One structured part anywhere keeps part-messages in the rich shape
        assert!(back[0].as_text().is_some());
        assert!(back[1].as_parts().is_some());
    }

    #[test]
    fn test_from_wire_all_text_parts_collapse() {
        let wire = vec![WireMessage {
            role: "assistant".into(),
            content: WireContent::Parts(vec![
                ContentPart::text("first"),
                ContentPart::text("second"),
            ]),
        }];
        let back = from_wire(WireShape::RichParts, wire);
        assert_eq!(back[0].as_text(), Some("first\n\nsecond"));
    }
}
