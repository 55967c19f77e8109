//! Node launcher: wires identity, tracer, overlay, discovery and the coordinator together.

use crate::{Coordinator, Exit, FaultDecision, NodeConfig, NodeError, Simulation};
use pubsub_shadow_discovery::DnsResolver;
use pubsub_shadow_identity::Identity;
use pubsub_shadow_overlay::OverlayHandle;
use pubsub_shadow_primitives::NodeIndex;
use pubsub_shadow_tracer::{FaultInjector, LogTracer, shutdown_channel};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Hostname of this process: the configured override, else the system hostname.
pub fn resolve_hostname(config: &NodeConfig) -> Result<String, NodeError> {
    if let Some(hostname) = &config.simulation.hostname {
        return Ok(hostname.clone());
    }
    gethostname::gethostname()
        .into_string()
        .map_err(|raw| NodeError::Hostname(format!("not valid UTF-8: {raw:?}")))
}

/// Runs a node to completion.
///
/// Startup failures (hostname, identity, listen socket, resolver) are returned immediately.
/// Otherwise the node runs until a fault shutdown completes or the process is killed.
pub async fn run_node(config: NodeConfig) -> Result<Exit, NodeError> {
    let hostname = resolve_hostname(&config)?;
    let index = NodeIndex::from_hostname(&hostname)?;
    info!(
        count = config.simulation.universe_size,
        target = config.simulation.target_peers,
        %hostname,
        node_id = %index,
        "Starting node"
    );

    let identity = Identity::derive(index)?;
    identity.log();

    let decision = FaultDecision::decide(config.fault.percent, &mut rand::rng());
    info!(
        faulty = decision.is_faulty(),
        draw = decision.draw(),
        percent = config.fault.percent,
        trigger = %config.fault.trigger,
        "Fault decision"
    );

    let (signal, listener) = shutdown_channel();
    let tracer = Arc::new(FaultInjector::new(
        LogTracer::new(),
        decision.is_faulty(),
        config.fault.trigger,
        signal,
    ));

    let resolver = DnsResolver::from_system_conf()?;
    let overlay = OverlayHandle::spawn(
        &identity,
        config.overlay.listen_multiaddr(),
        config.overlay_config(),
        tracer,
    )?;

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(&overlay, listener, cancel.clone(), config.grace_period());
    let simulation = Simulation::new(&overlay, &resolver, &config, index);

    let exit = coordinator.run(simulation.run(&cancel)).await?;
    info!(?exit, "Node stopped");
    Ok(exit)
}
