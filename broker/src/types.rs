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

//! Core types for the jobforge broker

use std::fmt;
use std::net::IpAddr;

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Broker-assigned job identifier, unique for the broker's lifetime.
///
/// Handles travel on the wire as their decimal rendering and are never
/// reused; allocation is a single monotonic counter inside the task manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

impl JobHandle {
    /// Create a handle from its numeric value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse a handle from its wire rendering.
    ///
    /// Returns `None` for anything that is not a decimal integer; callers
    /// treat that the same as a handle that was never issued.
    pub fn from_wire(text: &str) -> Option<Self> {
        text.parse::<u64>().ok().map(Self)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the admin `status` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionStatus {
    /// Function name
    pub function: String,
    /// Jobs waiting in this function's queue
    pub queued: usize,
    /// Jobs of this function currently being executed
    pub running: usize,
    /// Connections advertising the ability to execute this function
    pub workers: usize,
}

/// One row of the admin `workers` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    /// OS-level socket descriptor of the connection
    pub descriptor: i32,
    /// Peer IP address
    pub address: IpAddr,
    /// Self-reported connection label, `-` until set
    pub client_id: String,
    /// Advertised function names, sorted
    pub abilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new(1);
        let id2 = ConnectionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id1.to_string(), "conn-1");
    }

    #[test]
    fn test_job_handle_wire_round_trip() {
        let handle = JobHandle::new(42);
        assert_eq!(handle.to_string(), "42");
        assert_eq!(JobHandle::from_wire("42"), Some(handle));
    }

    #[test]
    fn test_job_handle_from_garbage() {
        assert_eq!(JobHandle::from_wire(""), None);
        assert_eq!(JobHandle::from_wire("nope"), None);
        assert_eq!(JobHandle::from_wire("-3"), None);
    }
}
