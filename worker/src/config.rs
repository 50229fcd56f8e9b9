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

//! Worker connection configuration

/// Configuration for a [`JobWorker`](crate::JobWorker)
///
/// # Example
///
/// ```
/// use jobforge_worker::WorkerConfig;
///
/// let config = WorkerConfig::new("broker.internal", 4730)
///     .with_client_id("image-resizer-3");
/// ```
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Broker hostname or IP address
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Label reported to the broker for the admin `workers` listing
    pub client_id: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: jobforge_protocol::consts::DEFAULT_PORT,
            client_id: None,
        }
    }
}

impl WorkerConfig {
    /// Create a configuration for the given broker address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the label reported to the broker
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Get the broker address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
