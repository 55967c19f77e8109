//! Log line parser.

use crate::ParseError;
use pubsub_shadow_observability::LOG_TIME_FORMAT;
use pubsub_shadow_tracer::{
    RpcAction,
    render::{GOSSIPSUB, GOSSIPSUB_RPC, PUBLISHED, RECEIVED},
};
use std::fmt;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Width of the `YYYY/MM/DD HH:MM:SS.ffffff` prefix.
const TIMESTAMP_LEN: usize = 26;

/// Stage of a message's life at one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageStage {
    Validated,
    Delivered,
    Rejected,
    Duplicated,
    Undeliverable,
    /// Application publish.
    Published,
    /// Application delivery.
    Received,
}

impl MessageStage {
    fn from_gossipsub(action: &str) -> Option<Self> {
        Some(match action {
            "Validated" => Self::Validated,
            "Delivered" => Self::Delivered,
            "Rejected" => Self::Rejected,
            "Duplicated" => Self::Duplicated,
            "Undeliverable" => Self::Undeliverable,
            _ => return None,
        })
    }
}

/// Sub-message kind of an RPC line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RpcKind {
    IHave,
    IWant,
    IDontWant,
    IAnnounce,
    INeed,
    Publish,
}

impl RpcKind {
    fn from_verb(verb: &str) -> Option<Self> {
        Some(match verb {
            "IHAVE" => Self::IHave,
            "IWANT" => Self::IWant,
            "IDONTWANT" => Self::IDontWant,
            "IANNOUNCE" => Self::IAnnounce,
            "INEED" => Self::INeed,
            "Publish" => Self::Publish,
            _ => return None,
        })
    }

    /// Whether the line carries an id list rather than a single id.
    fn has_id_list(self) -> bool {
        matches!(self, Self::IHave | Self::IWant | Self::IDontWant)
    }
}

impl fmt::Display for RpcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IHave => "IHAVE",
            Self::IWant => "IWANT",
            Self::IDontWant => "IDONTWANT",
            Self::IAnnounce => "IANNOUNCE",
            Self::INeed => "INEED",
            Self::Publish => "Publish",
        })
    }
}

/// What an event line reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PeerAdded { peer: String },
    PeerRemoved { peer: String },
    Throttled { peer: String },
    Joined { topic: String },
    Left { topic: String },
    Grafted { topic: String, peer: String },
    Pruned { topic: String, peer: String },
    Message { stage: MessageStage, id: String },
    Rpc {
        action: RpcAction,
        kind: RpcKind,
        ids: Vec<String>,
    },
}

/// One timestamped event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub at: OffsetDateTime,
    pub kind: EventKind,
}

/// Parses one log line.
///
/// Returns `Ok(None)` for blank lines and diagnostic lines that are not overlay or
/// application events.
pub fn parse_line(line: &str) -> Result<Option<LogEvent>, ParseError> {
    let line = line.trim_end();
    if line.is_empty() {
        return Ok(None);
    }

    let (Some(stamp), Some(content)) = (line.get(..TIMESTAMP_LEN), line.get(TIMESTAMP_LEN..))
    else {
        return Err(ParseError::MissingTimestamp);
    };
    let at = parse_timestamp(stamp)?;

    let Some((category, rest)) = content.trim_start().split_once(": ") else {
        return Ok(None);
    };
    let kind = match category {
        GOSSIPSUB => gossipsub_event(rest)?,
        GOSSIPSUB_RPC => rpc_event(rest)?,
        PUBLISHED => app_event(MessageStage::Published, rest)?,
        RECEIVED => app_event(MessageStage::Received, rest)?,
        _ => None,
    };

    Ok(kind.map(|kind| LogEvent { at, kind }))
}

/// Parses a `YYYY/MM/DD HH:MM:SS.ffffff` UTC timestamp.
pub fn parse_timestamp(stamp: &str) -> Result<OffsetDateTime, ParseError> {
    PrimitiveDateTime::parse(stamp, LOG_TIME_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| ParseError::Timestamp {
            stamp: stamp.to_owned(),
            reason: e.to_string(),
        })
}

/// `key: value` pairs of an event line.
struct Fields<'a> {
    action: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    /// Splits `<action> (<key>: <value>, ...)`.
    fn parse(rest: &'a str) -> Result<Self, ParseError> {
        let (action, body) = rest
            .split_once(" (")
            .ok_or_else(|| ParseError::malformed(rest, "missing field list"))?;
        let body = body
            .strip_suffix(')')
            .ok_or_else(|| ParseError::malformed(action, "unterminated field list"))?;

        let pairs = body
            .split(", ")
            .filter_map(|pair| pair.split_once(": "))
            .collect();

        Ok(Self { action, pairs })
    }

    fn get(&self, key: &str) -> Result<&'a str, ParseError> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| ParseError::malformed(self.action, format!("missing {key:?}")))
    }

    fn owned(&self, key: &str) -> Result<String, ParseError> {
        self.get(key).map(str::to_owned)
    }
}

fn gossipsub_event(rest: &str) -> Result<Option<EventKind>, ParseError> {
    let fields = Fields::parse(rest)?;

    let kind = match fields.action {
        "Peer Added" => EventKind::PeerAdded {
            peer: fields.owned("id")?,
        },
        "Peer Removed" => EventKind::PeerRemoved {
            peer: fields.owned("id")?,
        },
        "Throttled" => EventKind::Throttled {
            peer: fields.owned("peer")?,
        },
        "Joined" => EventKind::Joined {
            topic: fields.owned("topic")?,
        },
        "Left" => EventKind::Left {
            topic: fields.owned("topic")?,
        },
        "Grafted" => EventKind::Grafted {
            topic: fields.owned("topic")?,
            peer: fields.owned("peer")?,
        },
        "Pruned" => EventKind::Pruned {
            topic: fields.owned("topic")?,
            peer: fields.owned("peer")?,
        },
        action => match MessageStage::from_gossipsub(action) {
            Some(stage) => EventKind::Message {
                stage,
                id: fields.owned("id")?,
            },
            None => return Ok(None),
        },
    };

    Ok(Some(kind))
}

fn rpc_event(rest: &str) -> Result<Option<EventKind>, ParseError> {
    let fields = Fields::parse(rest)?;

    let Some((direction, verb)) = fields.action.split_once(' ') else {
        return Err(ParseError::malformed(fields.action, "missing RPC direction"));
    };
    let action = match direction {
        "Received" => RpcAction::Received,
        "Sent" => RpcAction::Sent,
        "Dropped" => RpcAction::Dropped,
        _ => return Ok(None),
    };
    let Some(kind) = RpcKind::from_verb(verb) else {
        return Ok(None);
    };
    // Aggregate drop counts name no message.
    if fields.get("count").is_ok() {
        return Ok(None);
    }

    let ids = if kind.has_id_list() {
        parse_id_list(fields.action, fields.get("ids")?)?
    } else {
        vec![fields.owned("id")?]
    };

    Ok(Some(EventKind::Rpc { action, kind, ids }))
}

fn app_event(stage: MessageStage, rest: &str) -> Result<Option<EventKind>, ParseError> {
    let fields = Fields::parse(rest)?;
    if fields.action != "Message" {
        return Ok(None);
    }
    Ok(Some(EventKind::Message {
        stage,
        id: fields.owned("id")?,
    }))
}

/// Parses `["a" "b"]`.
fn parse_id_list(action: &str, raw: &str) -> Result<Vec<String>, ParseError> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ParseError::malformed(action, format!("bad id list {raw:?}")))?;

    Ok(inner
        .split('"')
        .skip(1)
        .step_by(2)
        .map(str::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    const STAMP: &str = "2026/10/18 12:00:00.000123";

    fn parse(content: &str) -> Option<EventKind> {
        let event = parse_line(&format!("{STAMP} {content}")).unwrap()?;
        assert_eq!(event.at, datetime!(2026-10-18 12:00:00.000123 UTC));
        Some(event.kind)
    }

    #[test]
    fn topology_lines() {
        assert_eq!(
            parse("GossipSub: Peer Added (id: 12D3Koo, addr: /ip4/10.0.0.1/tcp/9000)"),
            Some(EventKind::PeerAdded {
                peer: "12D3Koo".into()
            })
        );
        assert_eq!(
            parse("GossipSub: Grafted (topic: foobar, peer: 12D3Koo)"),
            Some(EventKind::Grafted {
                topic: "foobar".into(),
                peer: "12D3Koo".into()
            })
        );
        assert_eq!(
            parse("GossipSub: Left (topic: foobar)"),
            Some(EventKind::Left {
                topic: "foobar".into()
            })
        );
    }

    #[test]
    fn message_lines() {
        assert_eq!(
            parse("GossipSub: Delivered (id: abc=, from: 12D3Koo)"),
            Some(EventKind::Message {
                stage: MessageStage::Delivered,
                id: "abc=".into()
            })
        );
        assert_eq!(
            parse("Received: Message (topic: foobar, id: abc=, from: 12D3Koo, size: 32, duplicates: 0)"),
            Some(EventKind::Message {
                stage: MessageStage::Received,
                id: "abc=".into()
            })
        );
        assert_eq!(
            parse("Published: Message (topic: foobar, id: abc=, size: 32)"),
            Some(EventKind::Message {
                stage: MessageStage::Published,
                id: "abc=".into()
            })
        );
    }

    #[test]
    fn rpc_lines() {
        assert_eq!(
            parse(r#"GossipSubRPC: Received IHAVE (topic: foobar, ids: ["a" "b"], from: 12D3Koo)"#),
            Some(EventKind::Rpc {
                action: RpcAction::Received,
                kind: RpcKind::IHave,
                ids: vec!["a".into(), "b".into()]
            })
        );
        assert_eq!(
            parse("GossipSubRPC: Sent INEED (id: n1, to: 12D3Koo)"),
            Some(EventKind::Rpc {
                action: RpcAction::Sent,
                kind: RpcKind::INeed,
                ids: vec!["n1".into()]
            })
        );
        assert_eq!(
            parse("GossipSubRPC: Dropped IWANT (ids: [])"),
            Some(EventKind::Rpc {
                action: RpcAction::Dropped,
                kind: RpcKind::IWant,
                ids: vec![]
            })
        );
        assert_eq!(parse("GossipSubRPC: Dropped Publish (count: 3, to: 12D3Koo)"), None);
        assert_eq!(parse("GossipSubRPC: Dropped Forward (count: 1, to: 12D3Koo)"), None);
    }

    #[test]
    fn diagnostic_lines_are_ignored() {
        assert_eq!(parse("Starting node count=5000 target=70"), None);
        assert_eq!(parse("Failed to publish message error=publish failed: full"), None);
        assert_eq!(parse("GossipSub: Unknown (id: x)"), None);
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn bad_lines_are_errors() {
        assert_matches!(parse_line("short"), Err(ParseError::MissingTimestamp));
        assert_matches!(
            parse_line("2026-10-18T12:00:00.000123 GossipSub: Joined (topic: x)"),
            Err(ParseError::Timestamp { .. })
        );
        assert_matches!(
            parse_line(&format!("{STAMP} GossipSub: Delivered (from: x)")),
            Err(ParseError::Malformed { .. })
        );
        assert_matches!(
            parse_line(&format!("{STAMP} GossipSubRPC: Sent IHAVE (topic: t, ids: a b)")),
            Err(ParseError::Malformed { .. })
        );
    }
}
