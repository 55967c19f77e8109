//! Per-node event timelines.

use crate::{AnalysisError, EventKind, LogEvent, MessageStage, RpcKind, parse_line};
use pubsub_shadow_tracer::RpcAction;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use time::OffsetDateTime;
use tracing::debug;

/// A peer-level event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEvent {
    pub at: OffsetDateTime,
    pub peer: String,
}

/// A topic membership event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEvent {
    pub at: OffsetDateTime,
    pub topic: String,
}

/// A mesh graft or prune.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshEvent {
    pub at: OffsetDateTime,
    pub topic: String,
    pub peer: String,
}

/// Everything one node logged about one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTimeline {
    stages: BTreeMap<MessageStage, Vec<OffsetDateTime>>,
    rpc: BTreeMap<(RpcAction, RpcKind), Vec<OffsetDateTime>>,
}

impl MessageTimeline {
    pub fn at(&self, stage: MessageStage) -> &[OffsetDateTime] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    /// Earliest time the message reached `stage`.
    pub fn first(&self, stage: MessageStage) -> Option<OffsetDateTime> {
        self.at(stage).iter().min().copied()
    }

    pub fn rpc(&self, action: RpcAction, kind: RpcKind) -> &[OffsetDateTime] {
        self.rpc
            .get(&(action, kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Redundant copies the node saw: engine duplicate reports, or application deliveries
    /// beyond the first when the engine reported none.
    pub fn duplicates(&self) -> usize {
        self.at(MessageStage::Duplicated)
            .len()
            .max(self.at(MessageStage::Received).len().saturating_sub(1))
    }

    fn record_stage(&mut self, stage: MessageStage, at: OffsetDateTime) {
        self.stages.entry(stage).or_default().push(at);
    }

    fn record_rpc(&mut self, action: RpcAction, kind: RpcKind, at: OffsetDateTime) {
        self.rpc.entry((action, kind)).or_default().push(at);
    }
}

/// Timeline of one node's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTimeline {
    node: String,
    pub peers_added: Vec<PeerEvent>,
    pub peers_removed: Vec<PeerEvent>,
    pub throttled: Vec<PeerEvent>,
    pub joined: Vec<TopicEvent>,
    pub left: Vec<TopicEvent>,
    pub grafted: Vec<MeshEvent>,
    pub pruned: Vec<MeshEvent>,
    messages: BTreeMap<String, MessageTimeline>,
    skipped: usize,
}

impl NodeTimeline {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            peers_added: Vec::new(),
            peers_removed: Vec::new(),
            throttled: Vec::new(),
            joined: Vec::new(),
            left: Vec::new(),
            grafted: Vec::new(),
            pruned: Vec::new(),
            messages: BTreeMap::new(),
            skipped: 0,
        }
    }

    /// Reads a log file. The node is named after the path.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read(path.display().to_string(), BufReader::new(file)).map_err(|source| {
            AnalysisError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Reads a log stream. Lines that fail to parse are counted and skipped.
    pub fn read(node: impl Into<String>, reader: impl BufRead) -> io::Result<Self> {
        let mut timeline = Self::new(node);

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            match parse_line(&line) {
                Ok(Some(event)) => timeline.record(event),
                Ok(None) => {}
                Err(e) => {
                    debug!(node = %timeline.node, line = n + 1, error = %e, "Skipping log line");
                    timeline.skipped += 1;
                }
            }
        }

        Ok(timeline)
    }

    pub fn record(&mut self, event: LogEvent) {
        let at = event.at;
        match event.kind {
            EventKind::PeerAdded { peer } => self.peers_added.push(PeerEvent { at, peer }),
            EventKind::PeerRemoved { peer } => self.peers_removed.push(PeerEvent { at, peer }),
            EventKind::Throttled { peer } => self.throttled.push(PeerEvent { at, peer }),
            EventKind::Joined { topic } => self.joined.push(TopicEvent { at, topic }),
            EventKind::Left { topic } => self.left.push(TopicEvent { at, topic }),
            EventKind::Grafted { topic, peer } => self.grafted.push(MeshEvent { at, topic, peer }),
            EventKind::Pruned { topic, peer } => self.pruned.push(MeshEvent { at, topic, peer }),
            EventKind::Message { stage, id } => {
                self.messages.entry(id).or_default().record_stage(stage, at);
            }
            EventKind::Rpc { action, kind, ids } => {
                for id in ids {
                    self.messages
                        .entry(id)
                        .or_default()
                        .record_rpc(action, kind, at);
                }
            }
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn messages(&self) -> &BTreeMap<String, MessageTimeline> {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&MessageTimeline> {
        self.messages.get(id)
    }

    /// Lines that looked like log lines but failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
