//! Service lifecycle: dependency wiring, dual-mode hosting, and graceful
//! shutdown with a drain deadline.
//!
//! [`start`] is the single entry point for both hosting modes. It wires the
//! dependency graph leaf to root (store, echo engine, route table), binds the
//! listener, and spawns the serve loop, returning a [`ServiceHandle`]:
//! - Standalone: the caller follows `start` with [`ServiceHandle::run`],
//!   which blocks until shutdown or a fatal serve error.
//! - Embedded: the caller keeps the handle and continues. The service is
//!   then running concurrently with the caller's own code, on the caller's
//!   runtime, until [`ServiceHandle::shutdown`] is invoked.
//!
//! Both modes execute the identical wiring and serve future; the mode only
//! decides whether the entry call is followed by a blocking await. Any
//! construction failure surfaces synchronously from `start` and leaves no
//! listener bound. On shutdown, resources are released in reverse wiring
//! order: the listener stops accepting, in-flight requests drain up to the
//! configured deadline, then the route table, engine, and store are dropped.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ServiceConfig, StoreProvider};
use crate::error::{Error, Result};
use crate::logic::{Echo, EchoEngine};
use crate::router::{RouterState, build_router};
use crate::store::{MemoryStore, NullStore, Store};

/// Lifecycle states. Transitions are strictly forward:
/// `Uninitialized → Wiring → Serving → ShuttingDown → Stopped`, with the
/// single exception that a wiring failure goes directly to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Wiring,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Handle to a started service.
#[derive(Debug)]
pub struct ServiceHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    state: watch::Receiver<LifecycleState>,
    serve_task: JoinHandle<Result<()>>,
}

impl ServiceHandle {
    /// The address the listener is bound to. With an ephemeral port this is
    /// the resolved address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Token that triggers shutdown when cancelled. Lets an external event
    /// source (signal handler, supervisor) request shutdown without holding
    /// the handle itself.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request shutdown: stop accepting, drain in-flight requests up to the
    /// drain deadline, then stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Block until the service has stopped. This is the standalone hosting
    /// path; embedded callers usually await it only after `shutdown`.
    ///
    /// Returns `Err(Error::ShutdownTimeout { .. })` if the drain deadline
    /// elapsed with requests still in flight; the service is stopped either
    /// way.
    pub async fn run(self) -> Result<()> {
        match self.serve_task.await {
            Ok(result) => result,
            Err(join_err) => Err(Error::Serve(std::io::Error::other(join_err))),
        }
    }

    /// Wait until the lifecycle reaches `Stopped`, without consuming the
    /// handle or observing the serve result.
    pub async fn stopped(&mut self) {
        let _ = self
            .state
            .wait_for(|state| *state == LifecycleState::Stopped)
            .await;
    }
}

/// Wire the dependency graph, bind the listener, and start serving.
///
/// This is the only construction path; see the module docs for the
/// mode-specific calling conventions.
pub async fn start(config: ServiceConfig) -> Result<ServiceHandle> {
    let (state_tx, state_rx) = watch::channel(LifecycleState::Uninitialized);
    let cancel = CancellationToken::new();

    state_tx.send_replace(LifecycleState::Wiring);
    info!(listen = %config.listen, mode = ?config.mode, store = ?config.store, "Wiring service");

    // Leaf to root: store, then the echo engine, then the route table.
    let store = match build_store(&config.store) {
        Ok(store) => store,
        Err(err) => {
            state_tx.send_replace(LifecycleState::Stopped);
            return Err(err);
        }
    };
    let echo: Arc<dyn Echo> = Arc::new(EchoEngine::new(store));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let router = build_router(RouterState {
        echo,
        started_at: Instant::now(),
        in_flight: Arc::clone(&in_flight),
    });

    // The listener is acquired last, so a wiring failure never leaves a
    // partial listener bound.
    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            state_tx.send_replace(LifecycleState::Stopped);
            return Err(Error::Construction(format!(
                "failed to bind {}: {err}",
                config.listen
            )));
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            state_tx.send_replace(LifecycleState::Stopped);
            return Err(Error::Construction(format!(
                "failed to resolve local address: {err}"
            )));
        }
    };

    state_tx.send_replace(LifecycleState::Serving);
    info!(addr = %local_addr, "Service listening");

    let drain_deadline = config.drain_deadline;
    let task_cancel = cancel.clone();
    let serve_task = tokio::spawn(async move {
        let graceful = {
            let cancel = task_cancel.clone();
            async move { cancel.cancelled().await }
        };
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(graceful)
            .into_future();
        tokio::pin!(serve);

        let result = tokio::select! {
            res = &mut serve => res.map_err(Error::Serve),
            _ = task_cancel.cancelled() => {
                state_tx.send_replace(LifecycleState::ShuttingDown);
                info!(deadline = ?drain_deadline, "Draining in-flight requests");
                match timeout(drain_deadline, &mut serve).await {
                    Ok(res) => res.map_err(Error::Serve),
                    Err(_) => {
                        let abandoned = in_flight.load(Ordering::SeqCst);
                        warn!(abandoned, "Drain deadline elapsed; abandoning in-flight requests");
                        Err(Error::ShutdownTimeout { abandoned })
                    }
                }
            }
        };

        // Returning drops the serve future and with it the listener and
        // route table; the engine and store inside it go last. That is the
        // reverse of the wiring order.
        state_tx.send_replace(LifecycleState::Stopped);
        info!("Service stopped");
        result
    });

    Ok(ServiceHandle {
        local_addr,
        cancel,
        state: state_rx,
        serve_task,
    })
}

/// Construct the configured data-access implementation.
fn build_store(provider: &StoreProvider) -> Result<Arc<dyn Store>> {
    match provider {
        StoreProvider::Memory { capacity } => {
            let store =
                MemoryStore::new(*capacity).map_err(|e| Error::Construction(e.to_string()))?;
            Ok(Arc::new(store))
        }
        StoreProvider::Null => Ok(Arc::new(NullStore)),
        StoreProvider::External(store) => Ok(Arc::clone(store)),
    }
}
