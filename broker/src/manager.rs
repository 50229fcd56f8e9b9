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

//! Task manager: the broker's authoritative in-memory state
//!
//! The TaskManager owns every job queue, the worker registry, the running
//! set, and the per-connection protocol state. Connections call into it for
//! every inbound command; it mutates state and may push outbound responses
//! onto other connections (the owner of a finished job, sleeping workers
//! that must be woken).
//!
//! The manager is not internally concurrent. The server drives it behind a
//! single `tokio::sync::Mutex`; every operation is a short, non-blocking
//! state transition that at most enqueues responses onto per-connection
//! channels. It never performs socket I/O.

use crate::job::Job;
use crate::metrics::BrokerMetrics;
use crate::types::{ConnectionId, FunctionStatus, JobHandle, WorkerInfo};
use bytes::Bytes;
use jobforge_protocol::Response;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A job handed to a worker by [`TaskManager::grab_job`].
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Broker-assigned handle
    pub handle: JobHandle,
    /// Function name
    pub function: String,
    /// Opaque job payload
    pub payload: Bytes,
}

/// Broker-side state of one connection.
///
/// A connection exposes no role at accept time; the same state carries the
/// submitter fields (`submitted`) and the executor fields (`abilities`,
/// `running`, `sleeping`) and either or both may be in use.
#[derive(Debug)]
pub struct ClientState {
    peer_addr: SocketAddr,
    descriptor: i32,
    client_id: String,
    sleeping: bool,
    submitted: Vec<JobHandle>,
    abilities: HashMap<String, Option<u64>>,
    running: Vec<JobHandle>,
    outbound: mpsc::UnboundedSender<Response>,
}

impl ClientState {
    fn new(peer_addr: SocketAddr, descriptor: i32, outbound: mpsc::UnboundedSender<Response>) -> Self {
        Self {
            peer_addr,
            descriptor,
            client_id: "-".to_string(),
            sleeping: false,
            submitted: Vec::new(),
            abilities: HashMap::new(),
            running: Vec::new(),
            outbound,
        }
    }

    /// Enqueue a response on this connection's outbound channel.
    ///
    /// A closed channel means the connection died; the message is dropped
    /// silently, which is exactly the background-job semantics the broker
    /// wants for replies to vanished peers.
    fn push(&self, response: Response) {
        let _ = self.outbound.send(response);
    }
}

/// Authoritative in-memory state of jobs, queues, workers, and timeouts.
#[derive(Debug)]
pub struct TaskManager {
    states: HashMap<ConnectionId, ClientState>,
    job_queues: HashMap<String, VecDeque<JobHandle>>,
    jobs: HashMap<JobHandle, Job>,
    unique_index: HashMap<(String, Bytes), JobHandle>,
    workers_by_function: HashMap<String, HashSet<ConnectionId>>,
    running: HashSet<JobHandle>,
    next_handle: u64,
    metrics: Arc<BrokerMetrics>,
}

impl TaskManager {
    /// Create an empty manager.
    pub fn new(metrics: Arc<BrokerMetrics>) -> Self {
        Self {
            states: HashMap::new(),
            job_queues: HashMap::new(),
            jobs: HashMap::new(),
            unique_index: HashMap::new(),
            workers_by_function: HashMap::new(),
            running: HashSet::new(),
            next_handle: 0,
            metrics,
        }
    }

    /// Insert fresh state for a newly accepted connection.
    pub fn register_client(
        &mut self,
        conn: ConnectionId,
        peer_addr: SocketAddr,
        descriptor: i32,
        outbound: mpsc::UnboundedSender<Response>,
    ) {
        self.states
            .insert(conn, ClientState::new(peer_addr, descriptor, outbound));
    }

    /// Tear down a connection's state.
    ///
    /// Queued jobs the connection submitted are dropped. Jobs it submitted
    /// that are already running are orphaned so the worker's eventual
    /// completion still cleans them up. Jobs it was executing go back to the
    /// front of their queues, as if they had been submitted high-priority.
    pub fn deregister_client(&mut self, conn: ConnectionId) {
        let Some(state) = self.states.remove(&conn) else {
            return;
        };

        for function in state.abilities.keys() {
            self.remove_worker_registration(conn, function);
        }

        for handle in state.submitted {
            if self.running.contains(&handle) {
                // The worker is still executing this; drop the reply when it
                // comes back instead of the job itself.
                if let Some(job) = self.jobs.get_mut(&handle) {
                    job.owner = None;
                }
                continue;
            }
            if let Some(job) = self.jobs.remove(&handle) {
                if let Some(queue) = self.job_queues.get_mut(&job.function) {
                    queue.retain(|&queued| queued != handle);
                    if queue.is_empty() {
                        self.job_queues.remove(&job.function);
                    }
                }
                if let Some(unique) = job.unique {
                    self.unique_index.remove(&(job.function, unique));
                }
            }
        }

        for handle in state.running {
            let Some(job) = self.jobs.get_mut(&handle) else {
                continue;
            };
            job.assigned_worker = None;
            job.deadline = None;
            let function = job.function.clone();
            self.running.remove(&handle);
            self.job_queues
                .entry(function.clone())
                .or_default()
                .push_front(handle);
            self.metrics.job_requeued();
            tracing::info!(%handle, %function, "re-queued job after worker disconnect");
            self.wake_sleeping_workers(&function);
        }
    }

    /// Create (or dedup) a job and return its handle.
    ///
    /// When `unique` matches a live job of the same function, that job's
    /// handle is returned and nothing new is created. Every sleeping worker
    /// able to execute `function` is woken before this returns.
    pub fn add_job(
        &mut self,
        conn: ConnectionId,
        function: String,
        payload: Bytes,
        unique: Option<Bytes>,
        high_priority: bool,
        background: bool,
    ) -> JobHandle {
        if let Some(key) = &unique {
            if let Some(&existing) = self.unique_index.get(&(function.clone(), key.clone())) {
                tracing::debug!(handle = %existing, %function, "dedup hit on unique key");
                return existing;
            }
        }

        self.next_handle += 1;
        let handle = JobHandle::new(self.next_handle);

        let owner = if background { None } else { Some(conn) };
        if let Some(owner_id) = owner {
            if let Some(state) = self.states.get_mut(&owner_id) {
                state.submitted.push(handle);
            }
        }

        let job = Job {
            handle,
            function: function.clone(),
            payload,
            unique: unique.clone(),
            high_priority,
            background,
            owner,
            assigned_worker: None,
            deadline: None,
        };

        let queue = self.job_queues.entry(function.clone()).or_default();
        if high_priority {
            queue.push_front(handle);
        } else {
            queue.push_back(handle);
        }
        self.jobs.insert(handle, job);
        if let Some(key) = unique {
            self.unique_index.insert((function.clone(), key), handle);
        }
        self.metrics.job_submitted();

        self.wake_sleeping_workers(&function);
        handle
    }

    /// Record an ability for the connection, with an optional timeout in
    /// seconds applied to every job of this function it grabs.
    pub fn can_do(&mut self, conn: ConnectionId, function: String, timeout: Option<u64>) {
        let Some(state) = self.states.get_mut(&conn) else {
            return;
        };
        state.abilities.insert(function.clone(), timeout);
        self.workers_by_function
            .entry(function)
            .or_default()
            .insert(conn);
    }

    /// Withdraw one ability. Jobs the worker is already running are
    /// unaffected.
    pub fn cant_do(&mut self, conn: ConnectionId, function: &str) {
        if let Some(state) = self.states.get_mut(&conn) {
            state.abilities.remove(function);
        }
        self.remove_worker_registration(conn, function);
    }

    /// Withdraw every ability at once.
    pub fn reset_abilities(&mut self, conn: ConnectionId) {
        let Some(state) = self.states.get_mut(&conn) else {
            return;
        };
        let functions: Vec<String> = state.abilities.drain().map(|(function, _)| function).collect();
        for function in functions {
            self.remove_worker_registration(conn, &function);
        }
    }

    /// Set the self-reported label shown in the admin `workers` listing.
    pub fn set_client_id(&mut self, conn: ConnectionId, id: String) {
        if let Some(state) = self.states.get_mut(&conn) {
            state.client_id = id;
        }
    }

    /// Hand the connection a queued job matching one of its abilities.
    ///
    /// Abilities are tried in per-call shuffled order so concurrent workers
    /// with overlapping skill sets share load fairly. Assignment is decided
    /// atomically here, which makes simultaneous grabs from several woken
    /// workers race cleanly: exactly one gets the job.
    pub fn grab_job(&mut self, conn: ConnectionId) -> Option<Assignment> {
        let mut abilities: Vec<(String, Option<u64>)> = {
            let state = self.states.get_mut(&conn)?;
            state.sleeping = false;
            state
                .abilities
                .iter()
                .map(|(function, timeout)| (function.clone(), *timeout))
                .collect()
        };
        abilities.shuffle(&mut rand::rng());

        for (function, timeout) in abilities {
            let handle = {
                let Some(queue) = self.job_queues.get_mut(&function) else {
                    continue;
                };
                let Some(handle) = queue.pop_front() else {
                    continue;
                };
                let drained = queue.is_empty();
                if drained {
                    self.job_queues.remove(&function);
                }
                handle
            };

            let Some(job) = self.jobs.get_mut(&handle) else {
                continue;
            };
            job.assigned_worker = Some(conn);
            job.deadline = timeout.map(|seconds| Instant::now() + Duration::from_secs(seconds));
            let assignment = Assignment {
                handle,
                function: job.function.clone(),
                payload: job.payload.clone(),
            };
            self.running.insert(handle);
            if let Some(state) = self.states.get_mut(&conn) {
                state.running.push(handle);
            }
            return Some(assignment);
        }
        None
    }

    /// Non-mutating check for whether a grab would succeed.
    pub fn peek_job(&self, conn: ConnectionId) -> bool {
        let Some(state) = self.states.get(&conn) else {
            return false;
        };
        state
            .abilities
            .keys()
            .any(|function| self.job_queues.get(function).is_some_and(|queue| !queue.is_empty()))
    }

    /// Mark the connection sleeping, unless work is already available.
    ///
    /// Returns `false` when a job is waiting; the connection must then send
    /// a NOOP to itself instead of going to sleep.
    pub fn sleep(&mut self, conn: ConnectionId) -> bool {
        if self.peek_job(conn) {
            return false;
        }
        if let Some(state) = self.states.get_mut(&conn) {
            state.sleeping = true;
            return true;
        }
        false
    }

    /// Finish a running job successfully and forward the result to its
    /// owner. Unknown handles and stale completions for jobs that were
    /// re-queued after a worker disconnect are ignored.
    pub fn work_complete(&mut self, handle: JobHandle, result: Bytes) {
        if !self.running.contains(&handle) {
            tracing::debug!(%handle, "ignoring completion for non-running handle");
            return;
        }
        let Some(job) = self.jobs.get(&handle) else {
            return;
        };
        if let Some(owner) = job.owner {
            if let Some(state) = self.states.get(&owner) {
                state.push(Response::WorkComplete {
                    handle: handle.to_string(),
                    result,
                });
            }
        }
        self.remove_finished(handle);
        self.metrics.job_completed();
    }

    /// Finish a running job as failed and notify its owner. Same idempotence
    /// rules as [`TaskManager::work_complete`].
    pub fn work_fail(&mut self, handle: JobHandle) {
        if !self.running.contains(&handle) {
            tracing::debug!(%handle, "ignoring failure for non-running handle");
            return;
        }
        let Some(job) = self.jobs.get(&handle) else {
            return;
        };
        if let Some(owner) = job.owner {
            if let Some(state) = self.states.get(&owner) {
                state.push(Response::WorkFail {
                    handle: handle.to_string(),
                });
            }
        }
        self.remove_finished(handle);
        self.metrics.job_failed();
    }

    /// Fail every running job whose deadline has passed.
    ///
    /// Iterates over a snapshot because `work_fail` mutates the running set.
    pub fn check_timeouts(&mut self, now: Instant) {
        let expired: Vec<JobHandle> = self
            .running
            .iter()
            .filter(|handle| self.jobs.get(handle).is_some_and(|job| job.is_expired(now)))
            .copied()
            .collect();
        for handle in expired {
            tracing::info!(%handle, "failing job past its deadline");
            self.metrics.job_timed_out();
            self.work_fail(handle);
        }
    }

    /// Per-function queue depth, running count, and worker count, sorted by
    /// function name.
    pub fn get_status(&self) -> Vec<FunctionStatus> {
        let mut functions: Vec<String> = self
            .workers_by_function
            .keys()
            .chain(self.job_queues.keys())
            .cloned()
            .collect();
        functions.sort();
        functions.dedup();

        functions
            .into_iter()
            .map(|function| {
                let queued = self.job_queues.get(&function).map_or(0, VecDeque::len);
                let running = self
                    .running
                    .iter()
                    .filter(|handle| {
                        self.jobs
                            .get(handle)
                            .is_some_and(|job| job.function == function)
                    })
                    .count();
                let workers = self.workers_by_function.get(&function).map_or(0, HashSet::len);
                FunctionStatus {
                    function,
                    queued,
                    running,
                    workers,
                }
            })
            .collect()
    }

    /// One row per live connection for the admin `workers` listing, sorted
    /// by connection ID.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        let mut entries: Vec<(&ConnectionId, &ClientState)> = self.states.iter().collect();
        entries.sort_by_key(|(conn, _)| **conn);
        entries
            .into_iter()
            .map(|(_, state)| {
                let mut abilities: Vec<String> = state.abilities.keys().cloned().collect();
                abilities.sort();
                WorkerInfo {
                    descriptor: state.descriptor,
                    address: state.peer_addr.ip(),
                    client_id: state.client_id.clone(),
                    abilities,
                }
            })
            .collect()
    }

    /// Wake every sleeping worker able to execute `function`.
    ///
    /// The sleeping flag clears together with the NOOP enqueue; the first
    /// woken worker to grab wins, the rest get NO_JOB.
    fn wake_sleeping_workers(&mut self, function: &str) {
        let Some(worker_ids) = self.workers_by_function.get(function) else {
            return;
        };
        for conn in worker_ids.clone() {
            if let Some(state) = self.states.get_mut(&conn) {
                if state.sleeping {
                    state.sleeping = false;
                    state.push(Response::Noop);
                    tracing::debug!(%conn, %function, "woke sleeping worker");
                }
            }
        }
    }

    /// Drop `conn` from a function's worker set; no-op when it was never
    /// registered there.
    fn remove_worker_registration(&mut self, conn: ConnectionId, function: &str) {
        if let Some(set) = self.workers_by_function.get_mut(function) {
            set.remove(&conn);
            if set.is_empty() {
                self.workers_by_function.remove(function);
            }
        }
    }

    /// Remove a finished job from every index that references it.
    fn remove_finished(&mut self, handle: JobHandle) {
        let Some(job) = self.jobs.remove(&handle) else {
            return;
        };
        self.running.remove(&handle);
        if let Some(owner) = job.owner {
            if let Some(state) = self.states.get_mut(&owner) {
                state.submitted.retain(|&submitted| submitted != handle);
            }
        }
        if let Some(worker) = job.assigned_worker {
            if let Some(state) = self.states.get_mut(&worker) {
                state.running.retain(|&running| running != handle);
            }
        }
        if let Some(unique) = job.unique {
            self.unique_index.remove(&(job.function, unique));
        }
    }
}
