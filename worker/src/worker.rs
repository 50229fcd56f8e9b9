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

//! Worker-side broker client
//!
//! A JobWorker holds one connection to the broker, advertises which
//! functions it can execute, and runs the grab/sleep loop: grab jobs while
//! any are queued, then PRE_SLEEP and wait for the broker's NOOP wake-up.

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::handler::{JobHandler, WorkerJob};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use jobforge_protocol::{Request, Response, WorkerCodec};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

struct Ability {
    timeout: Option<u64>,
    handler: Arc<dyn JobHandler>,
}

/// A worker connection to the broker.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use jobforge_worker::{JobWorker, WorkerConfig, handler_fn};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = WorkerConfig::new("127.0.0.1", 4730);
///     let mut worker = JobWorker::connect(config).await?;
///     worker
///         .register_function("reverse", None, handler_fn(|job| {
///             let mut reversed = job.payload.to_vec();
///             reversed.reverse();
///             Ok(Bytes::from(reversed))
///         }))
///         .await?;
///     worker.work().await?;
///     Ok(())
/// }
/// ```
pub struct JobWorker {
    framed: Framed<TcpStream, WorkerCodec>,
    abilities: HashMap<String, Ability>,
    config: WorkerConfig,
}

impl JobWorker {
    /// Connect to the broker and report the configured client ID, if any.
    pub async fn connect(config: WorkerConfig) -> Result<Self> {
        let socket = TcpStream::connect(config.address()).await?;
        let mut worker = Self {
            framed: Framed::new(socket, WorkerCodec::new()),
            abilities: HashMap::new(),
            config,
        };
        if let Some(id) = worker.config.client_id.clone() {
            worker.framed.send(Request::SetClientId { id }).await?;
        }
        tracing::info!(address = %worker.config.address(), "connected to broker");
        Ok(worker)
    }

    /// Advertise a function and install its handler.
    ///
    /// With a timeout, the broker fails any job of this function that runs
    /// longer than `timeout` seconds; the submitter cannot tell such a
    /// failure apart from one this worker reported itself.
    pub async fn register_function(
        &mut self,
        name: impl Into<String>,
        timeout: Option<u64>,
        handler: Arc<dyn JobHandler>,
    ) -> Result<()> {
        let name = name.into();
        let request = match timeout {
            Some(timeout) => Request::CanDoTimeout {
                function: name.clone(),
                timeout,
            },
            None => Request::CanDo {
                function: name.clone(),
            },
        };
        self.framed.send(request).await?;
        self.abilities.insert(name, Ability { timeout, handler });
        Ok(())
    }

    /// Withdraw one function. Jobs already grabbed still finish.
    pub async fn unregister_function(&mut self, name: &str) -> Result<()> {
        self.framed
            .send(Request::CantDo {
                function: name.to_string(),
            })
            .await?;
        self.abilities.remove(name);
        Ok(())
    }

    /// Withdraw every registered function at once.
    pub async fn reset_abilities(&mut self) -> Result<()> {
        self.framed.send(Request::ResetAbilities).await?;
        self.abilities.clear();
        Ok(())
    }

    /// The functions currently registered, with their timeouts.
    pub fn abilities(&self) -> Vec<(String, Option<u64>)> {
        let mut abilities: Vec<(String, Option<u64>)> = self
            .abilities
            .iter()
            .map(|(name, ability)| (name.clone(), ability.timeout))
            .collect();
        abilities.sort();
        abilities
    }

    /// Grab and execute one job.
    ///
    /// Returns `Ok(true)` when a job was executed and its result reported,
    /// `Ok(false)` when nothing was queued for this worker's abilities.
    pub async fn work_once(&mut self) -> Result<bool> {
        self.framed.send(Request::GrabJob).await?;
        loop {
            match self.next_response().await? {
                // A wake-up that crossed our grab on the wire; the answer to
                // the grab itself is still coming.
                Response::Noop => continue,
                Response::NoJob => return Ok(false),
                Response::JobAssign {
                    handle,
                    function,
                    payload,
                } => {
                    self.run_job(WorkerJob {
                        handle,
                        function,
                        payload,
                    })
                    .await?;
                    return Ok(true);
                }
                other => return Err(WorkerError::Unexpected(other)),
            }
        }
    }

    /// Work jobs forever: grab while the queues have work, sleep until the
    /// broker's NOOP otherwise. Returns only on connection failure.
    pub async fn work(&mut self) -> Result<()> {
        loop {
            if self.work_once().await? {
                continue;
            }
            self.sleep_until_woken().await?;
        }
    }

    /// Round-trip an echo through the broker.
    pub async fn echo(&mut self, payload: Bytes) -> Result<Bytes> {
        self.framed.send(Request::EchoRequest { payload }).await?;
        loop {
            match self.next_response().await? {
                Response::Noop => continue,
                Response::EchoResponse { payload } => return Ok(payload),
                other => return Err(WorkerError::Unexpected(other)),
            }
        }
    }

    async fn run_job(&mut self, job: WorkerJob) -> Result<()> {
        let Some(ability) = self.abilities.get(&job.function) else {
            tracing::error!(function = %job.function, "received work for unknown function");
            self.framed
                .send(Request::WorkFail { handle: job.handle })
                .await?;
            return Ok(());
        };
        let handler = ability.handler.clone();
        tracing::debug!(handle = %job.handle, function = %job.function, "executing job");
        match handler.call(&job).await {
            Ok(result) => {
                self.framed
                    .send(Request::WorkComplete {
                        handle: job.handle,
                        result,
                    })
                    .await?;
            }
            Err(error) => {
                tracing::warn!(handle = %job.handle, %error, "job handler failed");
                self.framed
                    .send(Request::WorkFail { handle: job.handle })
                    .await?;
            }
        }
        Ok(())
    }

    async fn sleep_until_woken(&mut self) -> Result<()> {
        self.framed.send(Request::PreSleep).await?;
        loop {
            match self.next_response().await? {
                Response::Noop => return Ok(()),
                // A NO_JOB left over from a grab that raced with the sleep.
                Response::NoJob => continue,
                other => return Err(WorkerError::Unexpected(other)),
            }
        }
    }

    async fn next_response(&mut self) -> Result<Response> {
        match self.framed.next().await {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => Err(WorkerError::ConnectionClosed),
        }
    }
}

impl std::fmt::Debug for JobWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWorker")
            .field("address", &self.config.address())
            .field("abilities", &self.abilities.keys().collect::<Vec<_>>())
            .finish()
    }
}
