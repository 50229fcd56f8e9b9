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

//! Job handler trait and adapters

use crate::error::JobError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A job as seen by the executing worker.
#[derive(Debug, Clone)]
pub struct WorkerJob {
    /// Broker-assigned handle
    pub handle: String,
    /// Function name the job was submitted under
    pub function: String,
    /// Opaque payload from the submitter
    pub payload: Bytes,
}

/// Executes jobs for one registered function.
///
/// A returned error becomes a WORK_FAIL toward the submitter; the error
/// message itself stays on the worker side.
///
/// # Example
///
/// ```
/// use jobforge_worker::{JobError, JobHandler, WorkerJob};
/// use async_trait::async_trait;
/// use bytes::Bytes;
///
/// struct Reverse;
///
/// #[async_trait]
/// impl JobHandler for Reverse {
///     async fn call(&self, job: &WorkerJob) -> Result<Bytes, JobError> {
///         let mut reversed = job.payload.to_vec();
///         reversed.reverse();
///         Ok(Bytes::from(reversed))
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Execute one job and produce its result.
    async fn call(&self, job: &WorkerJob) -> Result<Bytes, JobError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&WorkerJob) -> Result<Bytes, JobError> + Send + Sync + 'static,
{
    async fn call(&self, job: &WorkerJob) -> Result<Bytes, JobError> {
        (self.0)(job)
    }
}

/// Wrap a plain closure as a [`JobHandler`].
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use jobforge_worker::handler_fn;
///
/// let upper = handler_fn(|job| {
///     let text = String::from_utf8_lossy(&job.payload).to_uppercase();
///     Ok(Bytes::from(text.into_bytes()))
/// });
/// # let _ = upper;
/// ```
pub fn handler_fn<F>(handler: F) -> Arc<dyn JobHandler>
where
    F: Fn(&WorkerJob) -> Result<Bytes, JobError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(payload: &'static [u8]) -> WorkerJob {
        WorkerJob {
            handle: "1".to_string(),
            function: "f".to_string(),
            payload: Bytes::from_static(payload),
        }
    }

    #[tokio::test]
    async fn test_fn_handler_success() {
        let handler = handler_fn(|job| Ok(job.payload.clone()));
        let result = handler.call(&job(b"abc")).await.unwrap();
        assert_eq!(result, Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn test_fn_handler_failure() {
        let handler = handler_fn(|_| Err(JobError::new("nope")));
        let error = handler.call(&job(b"abc")).await.unwrap_err();
        assert_eq!(error.to_string(), "nope");
    }
}
