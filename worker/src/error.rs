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

//! Error types for the jobforge worker library

use jobforge_protocol::Response;
use thiserror::Error;

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Worker-side error types
#[derive(Debug, Error)]
pub enum WorkerError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error from the codec layer
    #[error("protocol error: {0}")]
    Protocol(#[from] jobforge_protocol::CodecError),

    /// The broker closed the connection
    #[error("connection closed by broker")]
    ConnectionClosed,

    /// The broker sent something this state did not expect
    #[error("unexpected response from broker: {0:?}")]
    Unexpected(Response),
}

/// Failure reported by a job handler.
///
/// Carries only a message; the broker forwards failures to the owning
/// client as a bare WORK_FAIL, so the message is for the worker's own logs.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct JobError(String);

impl JobError {
    /// Create a failure with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
