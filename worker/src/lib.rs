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

//! Jobforge Worker Library
//!
//! The worker side of the jobforge job-dispatch protocol: connect to a
//! broker, advertise the functions this process can execute, and run the
//! grab/sleep loop. Each executed job's result (or failure) is reported
//! back to the broker, which forwards it to the submitting client.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use jobforge_worker::{JobWorker, WorkerConfig, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::new("127.0.0.1", 4730).with_client_id("demo");
//!     let mut worker = JobWorker::connect(config).await?;
//!     worker
//!         .register_function("reverse", None, handler_fn(|job| {
//!             let mut reversed = job.payload.to_vec();
//!             reversed.reverse();
//!             Ok(Bytes::from(reversed))
//!         }))
//!         .await?;
//!     worker.work().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod worker;

pub use config::WorkerConfig;
pub use error::{JobError, Result, WorkerError};
pub use handler::{JobHandler, WorkerJob, handler_fn};
pub use worker::JobWorker;
