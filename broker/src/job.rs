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

//! Job record owned by the task manager

use crate::types::{ConnectionId, JobHandle};
use bytes::Bytes;
use tokio::time::Instant;

/// One submitted unit of work.
///
/// A job lives in exactly one of two places: its function's queue, or the
/// running set once a worker has grabbed it. Cross-references to the
/// submitting and executing connections are held as IDs rather than
/// references; cleanup is an ID-level operation.
#[derive(Debug, Clone)]
pub struct Job {
    /// Broker-assigned handle, unique for the broker lifetime
    pub handle: JobHandle,
    /// Function name the job is queued under
    pub function: String,
    /// Opaque payload handed to the executing worker
    pub payload: Bytes,
    /// Client-supplied dedup key, if any
    pub unique: Option<Bytes>,
    /// Whether the submission jumped to the front of the queue
    pub high_priority: bool,
    /// Whether the completion is discarded instead of forwarded
    pub background: bool,
    /// Submitting connection; `None` for background jobs and for jobs whose
    /// owner disconnected while they were running
    pub owner: Option<ConnectionId>,
    /// Executing connection while the job is running
    pub assigned_worker: Option<ConnectionId>,
    /// Absolute deadline set at grab time from the worker's advertised
    /// timeout; `None` when the ability carries no timeout
    pub deadline: Option<Instant>,
}

impl Job {
    /// True once a worker has grabbed the job.
    pub fn is_running(&self) -> bool {
        self.assigned_worker.is_some()
    }

    /// True when the job's deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline < now)
    }
}
