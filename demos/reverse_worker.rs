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

//! Reverse Worker Example
//!
//! Registers the classic `reverse` function against a local broker and
//! works jobs forever.
//!
//! ## Usage
//!
//! Run the broker, then:
//!
//! ```bash
//! cargo run --example reverse_worker -- 127.0.0.1 4730
//! ```

use bytes::Bytes;
use jobforge_worker::{JobWorker, WorkerConfig, handler_fn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = match args.next() {
        Some(port) => port.parse()?,
        None => 4730,
    };

    let config = WorkerConfig::new(host, port).with_client_id("reverse-worker");
    let mut worker = JobWorker::connect(config).await?;

    worker
        .register_function("reverse", None, handler_fn(|job| {
            let mut reversed = job.payload.to_vec();
            reversed.reverse();
            Ok(Bytes::from(reversed))
        }))
        .await?;

    println!("working 'reverse' jobs, Ctrl+C to stop");
    worker.work().await?;
    Ok(())
}
