//! Analysis of log files written in the node's own line format.

use assert_matches::assert_matches;
use libp2p::PeerId;
use pubsub_shadow_analysis::{AnalysisError, MessageStage, NodeTimeline, RpcKind, analyze_files};
use pubsub_shadow_observability::LOG_TIME_FORMAT;
use pubsub_shadow_primitives::ContentId;
use pubsub_shadow_tracer::{RpcAction, RpcMeta, TracedMessage, render};
use std::{io::Write, path::PathBuf};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime, macros::datetime};

const START: OffsetDateTime = datetime!(2026-10-18 12:00:00 UTC);

struct LogWriter {
    lines: Vec<String>,
}

impl LogWriter {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn at(&mut self, offset_ms: i64, content: impl AsRef<str>) -> &mut Self {
        let stamp = (START + Duration::milliseconds(offset_ms))
            .format(LOG_TIME_FORMAT)
            .unwrap();
        self.lines.push(format!("{stamp} {}", content.as_ref()));
        self
    }

    fn write(&self, dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in &self.lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }
}

fn traced(id: &ContentId, from: PeerId) -> TracedMessage {
    TracedMessage {
        id: id.clone(),
        received_from: from,
        topic: "foobar".into(),
        size: 16,
    }
}

#[test]
fn rendered_lines_read_back_into_a_timeline() {
    let dir = TempDir::new().unwrap();
    let peer = PeerId::random();
    let id = ContentId::of(b"Hello from node0");

    let mut log = LogWriter::new();
    log.at(0, render::peer_added(&peer, &"/ip4/10.0.0.1/tcp/9000".parse().unwrap()))
        .at(1, render::joined("foobar"))
        .at(2, render::grafted(&peer, "foobar"))
        .at(3, render::throttled(&peer));
    for line in render::rpc(RpcAction::Received, &RpcMeta::publish("foobar", id.clone()), Some(&peer)) {
        log.at(4, line);
    }
    log.at(5, render::message("Validated", &traced(&id, peer)))
        .at(5, render::message("Delivered", &traced(&id, peer)))
        .at(9, render::pruned(&peer, "foobar"))
        .at(10, render::left("foobar"))
        .at(11, render::peer_removed(&peer));
    let path = log.write(&dir, "node1.stdout");

    let timeline = NodeTimeline::open(&path).unwrap();
    assert_eq!(timeline.skipped(), 0);
    assert_eq!(timeline.peers_added[0].peer, peer.to_string());
    assert_eq!(timeline.peers_removed[0].at, START + Duration::milliseconds(11));
    assert_eq!(timeline.throttled.len(), 1);
    assert_eq!(timeline.joined.len(), 1);
    assert_eq!(timeline.left.len(), 1);
    assert_eq!(timeline.grafted[0].topic, "foobar");
    assert_eq!(timeline.pruned[0].peer, peer.to_string());

    let message = timeline.message(id.as_str()).unwrap();
    assert_eq!(message.rpc(RpcAction::Received, RpcKind::Publish).len(), 1);
    assert_eq!(
        message.first(MessageStage::Delivered),
        Some(START + Duration::milliseconds(5))
    );
    assert_eq!(message.at(MessageStage::Validated).len(), 1);
}

#[test]
fn summary_across_nodes() {
    let dir = TempDir::new().unwrap();
    let publisher = PeerId::random();
    let id = ContentId::of(b"payload");

    let mut node0 = LogWriter::new();
    node0.at(
        100,
        render::line(
            render::PUBLISHED,
            "Message",
            &[("topic", &"foobar"), ("id", &id), ("size", &7)],
        ),
    );

    let mut node1 = LogWriter::new();
    node1
        .at(130, render::message("Delivered", &traced(&id, publisher)))
        .at(140, render::message("Duplicated", &traced(&id, publisher)));

    let mut node2 = LogWriter::new();
    node2.at(150, render::message("Delivered", &traced(&id, publisher)));

    let paths = vec![
        node0.write(&dir, "node0.stdout"),
        node1.write(&dir, "node1.stdout"),
        node2.write(&dir, "node2.stdout"),
    ];
    let analysis = analyze_files(&paths).unwrap();

    let report = analysis.published().next().unwrap();
    assert_eq!(report.id, id.as_str());
    assert_eq!(report.arrivals.len(), 2);
    assert_eq!(report.mean_latency_ms(), Some(40.0));
    assert_eq!(report.max_latency(), Some(Duration::milliseconds(50)));
    assert_eq!(report.mean_duplicates(analysis.nodes), Some(1.0 / 3.0));

    let summary = analysis.to_string();
    assert!(summary.contains("Analysed 3 node logs"));
    assert!(summary.contains(&format!("Message {}", id.as_str())));
    assert!(summary.contains("reached:   2/3 nodes"));
}

#[test]
fn missing_inputs_are_errors() {
    let none: &[PathBuf] = &[];
    assert_matches!(analyze_files(none), Err(AnalysisError::NoInput));

    let dir = TempDir::new().unwrap();
    assert_matches!(
        analyze_files(&[dir.path().join("absent.log")]),
        Err(AnalysisError::Io { .. })
    );
}
