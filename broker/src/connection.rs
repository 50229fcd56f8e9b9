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

//! Per-connection protocol state machine
//!
//! One `Connection` task owns one TCP peer: the framed socket, the receive
//! half of its outbound channel, and the dispatch of every inbound command
//! onto the task manager. A connection has no fixed role; the same peer may
//! submit jobs, execute them, and issue admin commands.

use crate::admin;
use crate::error::{BrokerError, Result};
use crate::manager::TaskManager;
use crate::metrics::BrokerMetrics;
use crate::server::ShutdownHandle;
use crate::types::{ConnectionId, JobHandle};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use jobforge_protocol::{AdminCommand, BrokerCodec, Inbound, Request, Response};
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::Framed;

/// The task manager behind its single exclusive lock.
///
/// Every mutation goes through this lock; operations are short and never
/// perform socket I/O, so contention stays bounded.
pub(crate) type SharedManager = Arc<Mutex<TaskManager>>;

/// State machine for one accepted TCP peer.
pub(crate) struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    descriptor: i32,
    framed: Framed<TcpStream, BrokerCodec>,
    manager: SharedManager,
    outbound_tx: mpsc::UnboundedSender<Response>,
    outbound_rx: mpsc::UnboundedReceiver<Response>,
    shutdown: ShutdownHandle,
    metrics: Arc<BrokerMetrics>,
}

impl Connection {
    /// Wrap an accepted socket.
    pub(crate) fn new(
        socket: TcpStream,
        id: ConnectionId,
        manager: SharedManager,
        shutdown: ShutdownHandle,
        metrics: Arc<BrokerMetrics>,
    ) -> Result<Self> {
        let peer_addr = socket.peer_addr()?;
        let descriptor = socket.as_raw_fd();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id,
            peer_addr,
            descriptor,
            framed: Framed::new(socket, BrokerCodec::new()),
            manager,
            outbound_tx,
            outbound_rx,
            shutdown,
            metrics,
        })
    }

    /// Drive the connection until the peer disconnects or the stream turns
    /// out to be unparseable. Registers with the task manager on entry and
    /// deregisters on every exit path.
    pub(crate) async fn run(mut self) {
        self.manager.lock().await.register_client(
            self.id,
            self.peer_addr,
            self.descriptor,
            self.outbound_tx.clone(),
        );
        self.metrics.connection_opened();
        tracing::info!(id = %self.id, peer = %self.peer_addr, "connection established");

        let result = self.event_loop().await;
        match &result {
            Ok(()) => tracing::info!(id = %self.id, "connection closed"),
            Err(BrokerError::Protocol(error)) => {
                self.metrics.protocol_error();
                tracing::error!(id = %self.id, %error, "protocol error, closing connection");
            }
            Err(error) => {
                tracing::warn!(id = %self.id, %error, "connection error, closing");
            }
        }

        // Whatever was queued for this peer before it went away is written
        // out best-effort; replies enqueued from here on are dropped.
        if result.is_ok() {
            self.flush_pending().await;
        }
        self.manager.lock().await.deregister_client(self.id);
        self.metrics.connection_closed();
    }

    /// Read frames and drain the outbound queue until one side ends.
    async fn event_loop(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                inbound = self.framed.next() => {
                    match inbound {
                        Some(Ok(item)) => self.dispatch(item).await,
                        Some(Err(error)) => return Err(error.into()),
                        None => return Ok(()),
                    }
                }
                Some(response) = self.outbound_rx.recv() => {
                    self.framed.send(response).await?;
                }
            }
        }
    }

    /// Dispatch one decoded command onto the task manager.
    ///
    /// Replies are enqueued on this connection's own channel while the
    /// manager lock is still held, so a forwarded result pushed by another
    /// task can never overtake the direct reply it logically follows.
    async fn dispatch(&self, inbound: Inbound) {
        match inbound {
            Inbound::Packet(request) => self.dispatch_request(request).await,
            Inbound::Admin(command) => self.dispatch_admin(command).await,
        }
    }

    async fn dispatch_request(&self, request: Request) {
        match request {
            Request::EchoRequest { payload } => {
                self.enqueue(Response::EchoResponse { payload });
            }
            Request::SubmitJob {
                function,
                unique,
                payload,
            } => {
                self.submit(function, unique, payload, false, false).await;
            }
            Request::SubmitJobHigh {
                function,
                unique,
                payload,
            } => {
                self.submit(function, unique, payload, true, false).await;
            }
            Request::SubmitJobBackground {
                function,
                unique,
                payload,
            } => {
                self.submit(function, unique, payload, false, true).await;
            }
            Request::CanDo { function } => {
                self.manager.lock().await.can_do(self.id, function, None);
            }
            Request::CanDoTimeout { function, timeout } => {
                let timeout = (timeout > 0).then_some(timeout);
                self.manager.lock().await.can_do(self.id, function, timeout);
            }
            Request::CantDo { function } => {
                self.manager.lock().await.cant_do(self.id, &function);
            }
            Request::ResetAbilities => {
                self.manager.lock().await.reset_abilities(self.id);
            }
            Request::PreSleep => {
                let mut manager = self.manager.lock().await;
                if !manager.sleep(self.id) {
                    // Work is already waiting; answer with a wake-up instead
                    // of letting the worker sleep through it.
                    self.enqueue(Response::Noop);
                }
            }
            Request::GrabJob => {
                let mut manager = self.manager.lock().await;
                match manager.grab_job(self.id) {
                    Some(assignment) => self.enqueue(Response::JobAssign {
                        handle: assignment.handle.to_string(),
                        function: assignment.function,
                        payload: assignment.payload,
                    }),
                    None => self.enqueue(Response::NoJob),
                }
            }
            Request::WorkComplete { handle, result } => {
                if let Some(handle) = JobHandle::from_wire(&handle) {
                    self.manager.lock().await.work_complete(handle, result);
                }
            }
            Request::WorkFail { handle } => {
                if let Some(handle) = JobHandle::from_wire(&handle) {
                    self.manager.lock().await.work_fail(handle);
                }
            }
            Request::SetClientId { id } => {
                self.manager.lock().await.set_client_id(self.id, id);
            }
            Request::Unknown { kind } => {
                tracing::error!(id = %self.id, kind, "unhandled command, ignoring");
            }
        }
    }

    async fn dispatch_admin(&self, command: AdminCommand) {
        match command {
            AdminCommand::Status => {
                let manager = self.manager.lock().await;
                for line in admin::status_reply(&manager) {
                    self.enqueue(line);
                }
            }
            AdminCommand::Workers => {
                let manager = self.manager.lock().await;
                for line in admin::workers_reply(&manager) {
                    self.enqueue(line);
                }
            }
            AdminCommand::Version => {
                self.enqueue(admin::version_reply());
            }
            AdminCommand::Shutdown => {
                tracing::info!(id = %self.id, "shutdown requested via admin command");
                self.shutdown.trigger();
            }
            AdminCommand::Unknown(line) => {
                tracing::error!(id = %self.id, %line, "unhandled admin command, ignoring");
            }
        }
    }

    async fn submit(
        &self,
        function: String,
        unique: Bytes,
        payload: Bytes,
        high_priority: bool,
        background: bool,
    ) {
        let unique = (!unique.is_empty()).then_some(unique);
        let mut manager = self.manager.lock().await;
        let handle = manager.add_job(self.id, function, payload, unique, high_priority, background);
        // Enqueued before the lock drops: the submitter always observes
        // JOB_CREATED before any completion for this handle.
        self.enqueue(Response::JobCreated {
            handle: handle.to_string(),
        });
    }

    fn enqueue(&self, response: Response) {
        let _ = self.outbound_tx.send(response);
    }

    /// Write out responses that were queued but not yet sent when the read
    /// side ended; the peer may have half-closed after its last command.
    async fn flush_pending(&mut self) {
        while let Ok(response) = self.outbound_rx.try_recv() {
            if self.framed.send(response).await.is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
