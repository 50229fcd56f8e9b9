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

//! Error types for the jobforge broker

use thiserror::Error;

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Broker error types
#[derive(Debug, Error)]
pub enum BrokerError {
    /// I/O error from the underlying TCP stream or listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error from the codec layer
    #[error("protocol error: {0}")]
    Protocol(#[from] jobforge_protocol::CodecError),

    /// The peer closed the connection
    #[error("connection closed")]
    ConnectionClosed,

    /// `start` was called while the broker was already running
    #[error("broker already running")]
    AlreadyRunning,

    /// `shutdown` was called while the broker was not running
    #[error("broker not running")]
    NotRunning,
}

impl BrokerError {
    /// Check whether the error only concerns a single connection.
    ///
    /// Connection-scoped errors close that connection and leave the broker
    /// running; anything else is a server-level failure.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BrokerError::Io(_) | BrokerError::Protocol(_) | BrokerError::ConnectionClosed
        )
    }
}
