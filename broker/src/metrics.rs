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

//! Lock-free metrics for the jobforge broker

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free broker metrics
///
/// All counters are atomics and can be bumped concurrently without locks.
/// Use `snapshot()` for a point-in-time view.
#[derive(Debug)]
pub struct BrokerMetrics {
    // Connections
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,

    // Job lifecycle
    jobs_submitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_timed_out: AtomicU64,
    jobs_requeued: AtomicU64,

    // Errors
    protocol_errors: AtomicU64,

    // Broker start time
    started_at: Instant,
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            jobs_submitted: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_timed_out: AtomicU64::new(0),
            jobs_requeued: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a connection being accepted
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection being torn down
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job submission that created a new job
    pub fn job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful completion
    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failure (including timeouts)
    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deadline-driven failure; also counted by `job_failed`
    pub fn job_timed_out(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job returned to its queue after a worker disconnect
    pub fn job_requeued(&self) {
        self.jobs_requeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol decode failure
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current number of live connections
    pub fn active_connections(&self) -> u64 {
        self.connections_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_closed.load(Ordering::Relaxed))
    }

    /// Get a consistent snapshot of all counters
    pub fn snapshot(&self) -> BrokerMetricsSnapshot {
        BrokerMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            jobs_requeued: self.jobs_requeued.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// A snapshot of broker metrics at a point in time
#[derive(Debug, Clone)]
pub struct BrokerMetricsSnapshot {
    /// Connections accepted since start
    pub connections_opened: u64,
    /// Connections torn down since start
    pub connections_closed: u64,
    /// Jobs created (dedup hits excluded)
    pub jobs_submitted: u64,
    /// Jobs completed successfully
    pub jobs_completed: u64,
    /// Jobs failed, including timeouts
    pub jobs_failed: u64,
    /// Jobs failed by the deadline ticker
    pub jobs_timed_out: u64,
    /// Jobs re-queued after a worker disconnect
    pub jobs_requeued: u64,
    /// Connections closed for protocol decode failures
    pub protocol_errors: u64,
    /// Broker uptime
    pub uptime: Duration,
}

impl BrokerMetricsSnapshot {
    /// Jobs still alive inside the broker
    pub fn jobs_in_flight(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed + self.jobs_failed)
    }
}
