//! Rendering of trace events as log lines.
//!
//! Every line reads `<category>: <action> (<key>: <value>, ...)`. Lists of message ids
//! render as `["a" "b"]`.

use crate::{DroppedMessages, RpcAction, RpcMeta, TracedMessage};
use libp2p::{Multiaddr, PeerId};
use pubsub_shadow_primitives::ContentId;
use std::fmt::{Display, Write};

/// Category of topology and message lifecycle lines.
pub const GOSSIPSUB: &str = "GossipSub";

/// Category of RPC decomposition lines.
pub const GOSSIPSUB_RPC: &str = "GossipSubRPC";

/// Category of application publish lines.
pub const PUBLISHED: &str = "Published";

/// Category of application delivery lines.
pub const RECEIVED: &str = "Received";

/// Renders one event line.
pub fn line(category: &str, action: &str, fields: &[(&str, &dyn Display)]) -> String {
    let mut out = format!("{category}: {action} (");
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{key}: {value}");
    }
    out.push(')');
    out
}

/// Renders a list of ids as `["a" "b"]`.
pub fn id_list(ids: &[ContentId]) -> String {
    let mut out = String::from("[");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:?}", id.as_str());
    }
    out.push(']');
    out
}

pub fn peer_added(peer: &PeerId, addr: &Multiaddr) -> String {
    line(GOSSIPSUB, "Peer Added", &[("id", peer), ("addr", addr)])
}

pub fn peer_removed(peer: &PeerId) -> String {
    line(GOSSIPSUB, "Peer Removed", &[("id", peer)])
}

pub fn joined(topic: &str) -> String {
    line(GOSSIPSUB, "Joined", &[("topic", &topic)])
}

pub fn left(topic: &str) -> String {
    line(GOSSIPSUB, "Left", &[("topic", &topic)])
}

pub fn grafted(peer: &PeerId, topic: &str) -> String {
    line(GOSSIPSUB, "Grafted", &[("topic", &topic), ("peer", peer)])
}

pub fn pruned(peer: &PeerId, topic: &str) -> String {
    line(GOSSIPSUB, "Pruned", &[("topic", &topic), ("peer", peer)])
}

pub fn throttled(peer: &PeerId) -> String {
    line(GOSSIPSUB, "Throttled", &[("peer", peer)])
}

/// Renders a message lifecycle line (`Validated`, `Delivered`, `Duplicated`, ...).
pub fn message(action: &str, msg: &TracedMessage) -> String {
    line(
        GOSSIPSUB,
        action,
        &[("id", &msg.id), ("from", &msg.received_from)],
    )
}

pub fn rejected(msg: &TracedMessage, reason: &str) -> String {
    line(
        GOSSIPSUB,
        "Rejected",
        &[
            ("id", &msg.id),
            ("from", &msg.received_from),
            ("reason", &reason),
        ],
    )
}

/// Decomposes an RPC into one line per control sub-message and per data message.
///
/// Control lines come first, in IHAVE, IWANT, IDONTWANT, IANNOUNCE, INEED order, followed
/// by the data publishes. `peer` is appended as the last field.
pub fn rpc(action: RpcAction, rpc: &RpcMeta, peer: Option<&PeerId>) -> Vec<String> {
    let mut lines = Vec::new();

    for ihave in &rpc.control.ihave {
        let ids = id_list(&ihave.message_ids);
        lines.push(rpc_line(
            action,
            "IHAVE",
            &[("topic", &ihave.topic), ("ids", &ids)],
            peer,
        ));
    }
    for iwant in &rpc.control.iwant {
        let ids = id_list(&iwant.message_ids);
        lines.push(rpc_line(action, "IWANT", &[("ids", &ids)], peer));
    }
    for idontwant in &rpc.control.idontwant {
        let ids = id_list(&idontwant.message_ids);
        lines.push(rpc_line(action, "IDONTWANT", &[("ids", &ids)], peer));
    }
    for iannounce in &rpc.control.iannounce {
        lines.push(rpc_line(
            action,
            "IANNOUNCE",
            &[("topic", &iannounce.topic), ("id", &iannounce.message_id)],
            peer,
        ));
    }
    for ineed in &rpc.control.ineed {
        lines.push(rpc_line(action, "INEED", &[("id", &ineed.message_id)], peer));
    }
    for msg in &rpc.messages {
        lines.push(rpc_line(
            action,
            "Publish",
            &[("topic", &msg.topic), ("id", &msg.id)],
            peer,
        ));
    }

    lines
}

/// Renders one `Dropped` line per kind with a non-zero count, in publish, forward, timeout
/// order.
pub fn dropped(dropped: &DroppedMessages, peer: &PeerId) -> Vec<String> {
    [
        ("Publish", dropped.publish),
        ("Forward", dropped.forward),
        ("Timeout", dropped.timed_out),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(verb, count)| rpc_line(RpcAction::Dropped, verb, &[("count", &count)], Some(peer)))
    .collect()
}

fn rpc_line(
    action: RpcAction,
    verb: &str,
    fields: &[(&str, &dyn Display)],
    peer: Option<&PeerId>,
) -> String {
    let mut all: Vec<(&str, &dyn Display)> = fields.to_vec();
    if let Some(peer) = peer {
        all.push((action.peer_key(), peer));
    }
    line(GOSSIPSUB_RPC, &format!("{action} {verb}"), &all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlIAnnounce, ControlIDontWant, ControlIHave, ControlINeed, ControlIWant};

    fn cid(s: &str) -> ContentId {
        ContentId::from_encoded(s)
    }

    #[test]
    fn line_format() {
        assert_eq!(
            line("GossipSub", "Joined", &[("topic", &"foobar")]),
            "GossipSub: Joined (topic: foobar)"
        );
        assert_eq!(
            line("Cat", "Act", &[("a", &1), ("b", &"two")]),
            "Cat: Act (a: 1, b: two)"
        );
        assert_eq!(line("Cat", "Act", &[]), "Cat: Act ()");
    }

    #[test]
    fn id_list_format() {
        assert_eq!(id_list(&[]), "[]");
        assert_eq!(id_list(&[cid("abc=")]), r#"["abc="]"#);
        assert_eq!(id_list(&[cid("a"), cid("b")]), r#"["a" "b"]"#);
    }

    #[test]
    fn message_lines() {
        let peer = PeerId::random();
        let msg = TracedMessage {
            id: cid("xyz="),
            received_from: peer,
            topic: "foobar".into(),
            size: 3,
        };
        assert_eq!(
            message("Delivered", &msg),
            format!("GossipSub: Delivered (id: xyz=, from: {peer})")
        );
        assert_eq!(
            rejected(&msg, "invalid"),
            format!("GossipSub: Rejected (id: xyz=, from: {peer}, reason: invalid)")
        );
    }

    #[test]
    fn rpc_decomposition_tags_every_sub_message() {
        let peer = PeerId::random();
        let rpc = RpcMeta {
            messages: vec![crate::PublishMeta {
                topic: "foobar".into(),
                id: cid("m1"),
            }],
            control: crate::ControlMeta {
                ihave: vec![ControlIHave {
                    topic: "foobar".into(),
                    message_ids: vec![cid("h1"), cid("h2")],
                }],
                iwant: vec![ControlIWant {
                    message_ids: vec![cid("w1")],
                }],
                idontwant: vec![ControlIDontWant {
                    message_ids: vec![cid("d1")],
                }],
                iannounce: vec![ControlIAnnounce {
                    topic: "foobar".into(),
                    message_id: cid("a1"),
                }],
                ineed: vec![ControlINeed {
                    message_id: cid("n1"),
                }],
            },
        };

        let lines = super::rpc(RpcAction::Received, &rpc, Some(&peer));
        assert_eq!(
            lines,
            vec![
                format!(
                    r#"GossipSubRPC: Received IHAVE (topic: foobar, ids: ["h1" "h2"], from: {peer})"#
                ),
                format!(r#"GossipSubRPC: Received IWANT (ids: ["w1"], from: {peer})"#),
                format!(r#"GossipSubRPC: Received IDONTWANT (ids: ["d1"], from: {peer})"#),
                format!("GossipSubRPC: Received IANNOUNCE (topic: foobar, id: a1, from: {peer})"),
                format!("GossipSubRPC: Received INEED (id: n1, from: {peer})"),
                format!("GossipSubRPC: Received Publish (topic: foobar, id: m1, from: {peer})"),
            ]
        );
    }

    #[test]
    fn rpc_peer_key_follows_direction() {
        let peer = PeerId::random();
        let rpc = RpcMeta::publish("foobar", cid("m1"));

        let sent = super::rpc(RpcAction::Sent, &rpc, Some(&peer));
        assert_eq!(
            sent,
            vec![format!("GossipSubRPC: Sent Publish (topic: foobar, id: m1, to: {peer})")]
        );

        let dropped = super::rpc(RpcAction::Dropped, &rpc, None);
        assert_eq!(
            dropped,
            vec!["GossipSubRPC: Dropped Publish (topic: foobar, id: m1)".to_string()]
        );
    }

    #[test]
    fn dropped_counts_skip_empty_kinds() {
        let peer = PeerId::random();
        let dropped = DroppedMessages {
            publish: 2,
            forward: 0,
            timed_out: 5,
        };

        assert_eq!(
            super::dropped(&dropped, &peer),
            vec![
                format!("GossipSubRPC: Dropped Publish (count: 2, to: {peer})"),
                format!("GossipSubRPC: Dropped Timeout (count: 5, to: {peer})"),
            ]
        );
        assert!(super::dropped(&DroppedMessages::default(), &peer).is_empty());
    }

    #[test]
    fn empty_rpc_renders_nothing() {
        assert!(super::rpc(RpcAction::Sent, &RpcMeta::default(), None).is_empty());
    }
}
