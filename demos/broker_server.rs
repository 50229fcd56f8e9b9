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

//! Broker launcher
//!
//! Runs a jobforge broker until Ctrl+C or an admin `shutdown` command.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example broker_server -- 127.0.0.1 4730
//! ```
//!
//! Both arguments are optional; the defaults are shown above. Poke it with
//! netcat:
//!
//! ```bash
//! echo status | nc localhost 4730
//! ```

use jobforge_broker::{BrokerConfig, BrokerServer};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = match args.next() {
        Some(port) => port.parse()?,
        None => jobforge_protocol::consts::DEFAULT_PORT,
    };
    let bind_address: SocketAddr = format!("{host}:{port}").parse()?;

    let server = BrokerServer::new(BrokerConfig::new(bind_address)).await?;
    server.start().await?;
    println!("jobforge broker listening on {}", server.local_addr());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nshutting down");
            server.shutdown().await?;
        }
        _ = server.wait_shutdown() => {
            println!("stopped by admin shutdown command");
        }
    }

    let snapshot = server.metrics().snapshot();
    println!(
        "served {} connections, {} jobs submitted, {} completed, {} failed",
        snapshot.connections_opened,
        snapshot.jobs_submitted,
        snapshot.jobs_completed,
        snapshot.jobs_failed,
    );

    Ok(())
}
