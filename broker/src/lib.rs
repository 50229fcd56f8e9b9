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

//! Jobforge Broker
//!
//! A job-dispatch broker: a long-running server that mediates between
//! clients that submit units of work and workers that execute them. Clients
//! describe a job by function name plus an opaque payload; workers advertise
//! which function names they can execute; the broker queues jobs per
//! function, matches them to idle workers, forwards completion or failure
//! results back to the owning client, and enforces per-function execution
//! timeouts declared by the workers themselves.
//!
//! # Architecture
//!
//! ```text
//! BrokerServer
//!     ↓ accepts
//! Connection (one task per peer)
//!     ↓ dispatches into
//! TaskManager (single lock, all queues / workers / running jobs)
//! ```
//!
//! Bytes enter a connection, the codec yields framed commands, and the
//! connection translates them into calls on the
//! [`TaskManager`]. The manager mutates state and may push outbound
//! commands back onto one or more connections: the caller itself, the
//! owning client of a finished job, or sleeping workers that must be woken.
//! A deadline ticker periodically fails running jobs whose worker-declared
//! timeout has passed.
//!
//! All broker state is in memory; nothing survives a restart.
//!
//! # Example
//!
//! ```no_run
//! use jobforge_broker::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig::new("127.0.0.1:4730".parse()?);
//!     let server = BrokerServer::new(config).await?;
//!     server.start().await?;
//!     server.wait_shutdown().await;
//!     Ok(())
//! }
//! ```

mod admin;
mod config;
mod connection;
mod error;
mod job;
mod manager;
mod metrics;
mod server;
mod types;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use job::Job;
pub use manager::{Assignment, ClientState, TaskManager};
pub use metrics::{BrokerMetrics, BrokerMetricsSnapshot};
pub use server::BrokerServer;
pub use types::{ConnectionId, FunctionStatus, JobHandle, WorkerInfo};
