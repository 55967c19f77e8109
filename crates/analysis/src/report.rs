//! Cross-node message statistics.

use crate::{MessageStage, NodeTimeline};
use std::{collections::BTreeMap, fmt};
use time::{Duration, OffsetDateTime};

/// First arrival of a message at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub node: String,
    /// First delivery minus the publish time.
    pub latency: Duration,
}

/// How one message spread through the analysed nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageReport {
    pub id: String,
    /// Earliest publish line across all nodes.
    pub published_at: Option<OffsetDateTime>,
    pub publisher: Option<String>,
    /// Sorted by latency. Empty when no publish line was found.
    pub arrivals: Vec<Arrival>,
    /// Duplicates seen by each node that logged the message.
    pub duplicates: Vec<usize>,
}

impl MessageReport {
    /// Mean arrival latency in milliseconds.
    pub fn mean_latency_ms(&self) -> Option<f64> {
        mean(&self.latencies_ms())
    }

    pub fn median_latency_ms(&self) -> Option<f64> {
        median(self.latencies_ms())
    }

    pub fn max_latency(&self) -> Option<Duration> {
        self.arrivals.last().map(|a| a.latency)
    }

    /// Mean duplicates per node, over all `nodes` analysed.
    pub fn mean_duplicates(&self, nodes: usize) -> Option<f64> {
        (nodes > 0).then(|| self.duplicates.iter().sum::<usize>() as f64 / nodes as f64)
    }

    /// Median duplicates over the nodes that logged the message.
    pub fn median_duplicates(&self) -> Option<f64> {
        median(self.duplicates.iter().map(|&d| d as f64).collect())
    }

    fn latencies_ms(&self) -> Vec<f64> {
        self.arrivals.iter().map(|a| millis(a.latency)).collect()
    }
}

/// Arrival and duplicate statistics for every message in a set of node logs.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub nodes: usize,
    pub skipped_lines: usize,
    pub messages: Vec<MessageReport>,
}

impl Analysis {
    pub fn new(timelines: &[NodeTimeline]) -> Self {
        let mut reports: BTreeMap<&str, MessageReport> = BTreeMap::new();

        for timeline in timelines {
            for (id, message) in timeline.messages() {
                let report = reports.entry(id.as_str()).or_insert_with(|| MessageReport {
                    id: id.clone(),
                    published_at: None,
                    publisher: None,
                    arrivals: Vec::new(),
                    duplicates: Vec::new(),
                });
                report.duplicates.push(message.duplicates());

                if let Some(at) = message.first(MessageStage::Published)
                    && report.published_at.is_none_or(|earliest| at < earliest)
                {
                    report.published_at = Some(at);
                    report.publisher = Some(timeline.node().to_owned());
                }
            }
        }

        for timeline in timelines {
            for (id, message) in timeline.messages() {
                let Some(report) = reports.get_mut(id.as_str()) else {
                    continue;
                };
                let Some(published_at) = report.published_at else {
                    continue;
                };
                let arrived = message
                    .first(MessageStage::Delivered)
                    .or_else(|| message.first(MessageStage::Received));
                if let Some(arrived) = arrived {
                    report.arrivals.push(Arrival {
                        node: timeline.node().to_owned(),
                        latency: arrived - published_at,
                    });
                }
            }
        }

        let mut messages: Vec<_> = reports.into_values().collect();
        for report in &mut messages {
            report.arrivals.sort_by_key(|a| a.latency);
        }

        Self {
            nodes: timelines.len(),
            skipped_lines: timelines.iter().map(NodeTimeline::skipped).sum(),
            messages,
        }
    }

    /// Messages that were published within the analysed logs.
    pub fn published(&self) -> impl Iterator<Item = &MessageReport> {
        self.messages.iter().filter(|m| m.published_at.is_some())
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Analysed {} node logs ({} unparsable lines skipped)",
            self.nodes, self.skipped_lines
        )?;

        let mut any = false;
        for report in self.published() {
            any = true;
            writeln!(f)?;
            writeln!(f, "Message {}", report.id)?;
            if let (Some(at), Some(publisher)) = (report.published_at, &report.publisher) {
                writeln!(f, "  published: {at} by {publisher}")?;
            }
            writeln!(f, "  reached:   {}/{} nodes", report.arrivals.len(), self.nodes)?;
            if let (Some(mean), Some(median), Some(max)) = (
                report.mean_latency_ms(),
                report.median_latency_ms(),
                report.max_latency(),
            ) {
                writeln!(
                    f,
                    "  arrival:   mean {mean:.3} ms, median {median:.3} ms, max {:.3} ms",
                    millis(max)
                )?;
            }
            if let (Some(mean), Some(median)) = (
                report.mean_duplicates(self.nodes),
                report.median_duplicates(),
            ) {
                writeln!(f, "  duplicates: mean {mean:.2}, median {median:.2}")?;
            }
        }

        if !any {
            writeln!(f)?;
            writeln!(f, "No published messages found")?;
        }
        Ok(())
    }
}

fn millis(d: Duration) -> f64 {
    d.whole_microseconds() as f64 / 1e3
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    match values.len() {
        0 => None,
        n if n % 2 == 1 => values.get(mid).copied(),
        _ => Some((values.get(mid - 1)? + values.get(mid)?) / 2.0),
    }
}
