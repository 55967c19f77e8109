//! Engine-neutral RPC metadata.

use pubsub_shadow_primitives::ContentId;
use std::fmt;

/// Direction of an RPC event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RpcAction {
    Received,
    Sent,
    Dropped,
}

impl RpcAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Sent => "Sent",
            Self::Dropped => "Dropped",
        }
    }

    /// Key naming the remote peer in a log line.
    pub fn peer_key(self) -> &'static str {
        match self {
            Self::Received => "from",
            Self::Sent | Self::Dropped => "to",
        }
    }
}

impl fmt::Display for RpcAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of one RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcMeta {
    /// Data messages carried by the RPC.
    pub messages: Vec<PublishMeta>,
    pub control: ControlMeta,
}

impl RpcMeta {
    /// An RPC carrying a single data message.
    pub fn publish(topic: impl Into<String>, id: ContentId) -> Self {
        Self {
            messages: vec![PublishMeta {
                topic: topic.into(),
                id,
            }],
            control: ControlMeta::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.control.is_empty()
    }
}

/// Messages the engine gave up sending to a slow peer, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedMessages {
    /// Own publishes dropped on a full send queue.
    pub publish: usize,
    /// Forwards dropped on a full send queue.
    pub forward: usize,
    /// Messages that expired in the send queue.
    pub timed_out: usize,
}

impl DroppedMessages {
    pub fn is_empty(&self) -> bool {
        self.publish == 0 && self.forward == 0 && self.timed_out == 0
    }
}

/// A data message inside an RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMeta {
    pub topic: String,
    pub id: ContentId,
}

/// Control sub-messages of an RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlMeta {
    pub ihave: Vec<ControlIHave>,
    pub iwant: Vec<ControlIWant>,
    pub idontwant: Vec<ControlIDontWant>,
    pub iannounce: Vec<ControlIAnnounce>,
    pub ineed: Vec<ControlINeed>,
}

impl ControlMeta {
    pub fn is_empty(&self) -> bool {
        self.ihave.is_empty()
            && self.iwant.is_empty()
            && self.idontwant.is_empty()
            && self.iannounce.is_empty()
            && self.ineed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIHave {
    pub topic: String,
    pub message_ids: Vec<ContentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIWant {
    pub message_ids: Vec<ContentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIDontWant {
    pub message_ids: Vec<ContentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIAnnounce {
    pub topic: String,
    pub message_id: ContentId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlINeed {
    pub message_id: ContentId,
}
