//! Offline analysis of node logs.
//!
//! Nodes write one event line per overlay or application event (see
//! `pubsub_shadow_tracer::render`). This crate reads those lines back:
//!
//! - [`parse_line`] turns one line into a [`LogEvent`].
//! - [`NodeTimeline`] collects one node's events, with a [`MessageTimeline`] per message id.
//! - [`Analysis`] combines timelines into per-message arrival latencies and duplicate
//!   statistics.

mod error;
mod parse;
mod report;
mod timeline;

pub use error::{AnalysisError, ParseError};
pub use parse::{EventKind, LogEvent, MessageStage, RpcKind, parse_line, parse_timestamp};
pub use report::{Analysis, Arrival, MessageReport};
pub use timeline::{MeshEvent, MessageTimeline, NodeTimeline, PeerEvent, TopicEvent};

use std::path::Path;

/// Reads every log file and analyses them together.
pub fn analyze_files<P: AsRef<Path>>(paths: &[P]) -> Result<Analysis, AnalysisError> {
    if paths.is_empty() {
        return Err(AnalysisError::NoInput);
    }
    let timelines = paths
        .iter()
        .map(|path| NodeTimeline::open(path.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Analysis::new(&timelines))
}
