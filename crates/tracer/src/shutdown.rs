//! Single-slot shutdown notification.

use crate::FaultTrigger;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;

/// Request to shut the process down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownRequest {
    /// Event that triggered the request.
    pub trigger: FaultTrigger,
}

/// Creates a connected signal/listener pair.
pub fn shutdown_channel() -> (ShutdownSignal, ShutdownListener) {
    let (tx, rx) = mpsc::channel(1);
    (
        ShutdownSignal {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        },
        ShutdownListener { rx },
    )
}

/// Write side. Accepts at most one request across all clones; later writes are discarded
/// without blocking.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: mpsc::Sender<ShutdownRequest>,
    fired: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Sends `request` if no request was sent before. Returns whether this call sent it.
    pub fn fire(&self, request: ShutdownRequest) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.try_send(request).is_ok()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Read side, owned by the shutdown coordinator.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::Receiver<ShutdownRequest>,
}

impl ShutdownListener {
    /// Waits for a request. Returns `None` once every signal is dropped without firing.
    pub async fn recv(&mut self) -> Option<ShutdownRequest> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_first_request_only() {
        let (signal, mut listener) = shutdown_channel();
        let second = signal.clone();

        assert!(signal.fire(ShutdownRequest {
            trigger: FaultTrigger::Joined
        }));
        assert!(!second.fire(ShutdownRequest {
            trigger: FaultTrigger::Delivered
        }));
        assert!(second.has_fired());

        assert_eq!(
            listener.recv().await,
            Some(ShutdownRequest {
                trigger: FaultTrigger::Joined
            })
        );

        drop(signal);
        drop(second);
        assert_eq!(listener.recv().await, None);
    }

    #[tokio::test]
    async fn repeated_writes_never_block() {
        let (signal, _listener) = shutdown_channel();
        let writes = async {
            for _ in 0..100 {
                signal.fire(ShutdownRequest {
                    trigger: FaultTrigger::Grafted,
                });
            }
        };
        tokio::time::timeout(Duration::from_secs(1), writes)
            .await
            .unwrap();
    }

    #[test]
    fn concurrent_writers_fire_once() {
        let (signal, _listener) = shutdown_channel();
        let fired: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let signal = signal.clone();
                    scope.spawn(move || {
                        usize::from(signal.fire(ShutdownRequest {
                            trigger: FaultTrigger::Joined,
                        }))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(fired, 1);
    }
}
