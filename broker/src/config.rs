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

//! Broker configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Broker server configuration
///
/// # Example
///
/// ```
/// use jobforge_broker::BrokerConfig;
/// use std::time::Duration;
///
/// let config = BrokerConfig::new("127.0.0.1:4730".parse().unwrap())
///     .with_tick_interval(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address the listener binds to
    pub bind_address: SocketAddr,

    /// How often running jobs are checked against their deadlines
    pub tick_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], jobforge_protocol::consts::DEFAULT_PORT)),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl BrokerConfig {
    /// Create a configuration bound to the given address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the deadline check interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
