//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Broker server shell
//!
//! The BrokerServer wires the listener, the shared task manager, the
//! per-connection tasks, and the deadline ticker together. It accepts
//! connections until shut down, either programmatically or through the
//! admin `shutdown` command.

use crate::config::BrokerConfig;
use crate::connection::{Connection, SharedManager};
use crate::error::{BrokerError, Result};
use crate::manager::TaskManager;
use crate::metrics::BrokerMetrics;
use crate::types::ConnectionId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

/// Stop signal shared by the accept loop, the ticker, and every connection.
///
/// The admin `shutdown` command triggers it from inside a connection task;
/// [`BrokerServer::shutdown`] triggers it from outside.
#[derive(Debug, Clone)]
pub(crate) struct ShutdownHandle {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    fn set_running(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolve once the broker is no longer running.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// The job-dispatch broker server.
///
/// # Example
///
/// ```no_run
/// use jobforge_broker::{BrokerConfig, BrokerServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BrokerConfig::new("127.0.0.1:4730".parse()?);
///     let server = BrokerServer::new(config).await?;
///     server.start().await?;
///     server.wait_shutdown().await;
///     Ok(())
/// }
/// ```
pub struct BrokerServer {
    config: BrokerConfig,
    manager: SharedManager,
    metrics: Arc<BrokerMetrics>,
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    bind_address: SocketAddr,
    next_connection: Arc<AtomicU64>,
    shutdown: ShutdownHandle,
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    ticker_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BrokerServer {
    /// Bind to the configured address without accepting yet.
    pub async fn new(config: BrokerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address).await?;
        let bind_address = listener.local_addr()?;
        let metrics = Arc::new(BrokerMetrics::new());
        let manager = Arc::new(tokio::sync::Mutex::new(TaskManager::new(metrics.clone())));

        tracing::info!("broker bound to {}", bind_address);

        Ok(Self {
            config,
            manager,
            metrics,
            listener: tokio::sync::Mutex::new(Some(listener)),
            bind_address,
            next_connection: Arc::new(AtomicU64::new(1)),
            shutdown: ShutdownHandle::new(),
            accept_handle: tokio::sync::Mutex::new(None),
            ticker_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start accepting connections and checking deadlines.
    pub async fn start(&self) -> Result<()> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Err(BrokerError::AlreadyRunning);
        };
        self.shutdown.set_running();

        tracing::info!("broker accepting on {}", self.bind_address);

        *self.accept_handle.lock().await = Some(self.spawn_accept_loop(listener));
        *self.ticker_handle.lock().await = Some(self.spawn_ticker());
        Ok(())
    }

    fn spawn_accept_loop(&self, listener: TcpListener) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let metrics = self.metrics.clone();
        let next_connection = self.next_connection.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                if !shutdown.is_running() {
                    break;
                }
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((socket, peer_addr)) => {
                                let id = ConnectionId::new(
                                    next_connection.fetch_add(1, Ordering::SeqCst),
                                );
                                match Connection::new(
                                    socket,
                                    id,
                                    manager.clone(),
                                    shutdown.clone(),
                                    metrics.clone(),
                                ) {
                                    Ok(connection) => {
                                        connections.spawn(connection.run());
                                    }
                                    Err(error) => {
                                        tracing::error!(%peer_addr, %error, "failed to wrap connection");
                                    }
                                }
                            }
                            Err(error) => {
                                tracing::error!(%error, "failed to accept connection");
                                // Back off to avoid a tight loop on persistent
                                // accept errors.
                                tokio::time::sleep(Duration::from_millis(100)).await;
                            }
                        }
                    }
                    _ = shutdown.wait() => break,
                    Some(_) = connections.join_next() => {}
                }
            }
            tracing::info!("accept loop terminated");
            // Dropping the JoinSet aborts whatever connections remain.
        })
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let shutdown = self.shutdown.clone();
        let tick = self.config.tick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !shutdown.is_running() {
                            break;
                        }
                        manager.lock().await.check_timeouts(Instant::now());
                    }
                    _ = shutdown.wait() => break,
                }
            }
            tracing::debug!("deadline ticker terminated");
        })
    }

    /// Stop the broker. Existing connections are dropped; nothing is
    /// persisted.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.shutdown.is_running() {
            return Err(BrokerError::NotRunning);
        }
        tracing::info!("shutting down broker");
        self.shutdown.trigger();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        if let Some(handle) = self.ticker_handle.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Resolve once the broker has stopped, whether via
    /// [`BrokerServer::shutdown`] or the admin `shutdown` command.
    pub async fn wait_shutdown(&self) {
        self.shutdown.wait().await;
    }

    /// Check if the broker is accepting connections.
    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the broker metrics.
    pub fn metrics(&self) -> Arc<BrokerMetrics> {
        self.metrics.clone()
    }

    /// Get the broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

impl std::fmt::Debug for BrokerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for BrokerServer {
    fn drop(&mut self) {
        if self.shutdown.is_running() {
            tracing::warn!("BrokerServer dropped while still running");
            self.shutdown.trigger();
        }
    }
}
