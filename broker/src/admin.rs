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

//! Text-mode admin replies
//!
//! Admin commands arrive as plain ASCII lines on the same socket as the
//! binary packets. Replies are newline-delimited; multi-line replies end
//! with a line containing exactly `.`.

use crate::manager::TaskManager;
use jobforge_protocol::Response;

/// The `status` reply: one tab-delimited line per known function.
pub(crate) fn status_reply(manager: &TaskManager) -> Vec<Response> {
    let mut lines: Vec<Response> = manager
        .get_status()
        .into_iter()
        .map(|row| {
            Response::Text(format!(
                "{}\t{}\t{}\t{}\n",
                row.function, row.queued, row.running, row.workers
            ))
        })
        .collect();
    lines.push(Response::Text(".\n".to_string()));
    lines
}

/// The `workers` reply: one line per connection with its abilities.
pub(crate) fn workers_reply(manager: &TaskManager) -> Vec<Response> {
    let mut lines: Vec<Response> = manager
        .workers()
        .into_iter()
        .map(|row| {
            Response::Text(format!(
                "{} {} {} : {}\n",
                row.descriptor,
                row.address,
                row.client_id,
                row.abilities.join(" ")
            ))
        })
        .collect();
    lines.push(Response::Text(".\n".to_string()));
    lines
}

/// The `version` reply: a single line with the broker version.
pub(crate) fn version_reply() -> Response {
    Response::Text(format!("{}\n", env!("CARGO_PKG_VERSION")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::BrokerMetrics;
    use crate::types::ConnectionId;
    use bytes::Bytes;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn text(lines: &[Response]) -> String {
        lines
            .iter()
            .map(|line| match line {
                Response::Text(text) => text.clone(),
                other => panic!("admin reply must be text, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn status_reply_is_tab_delimited_and_dot_terminated() {
        let mut manager = TaskManager::new(Arc::new(BrokerMetrics::new()));
        let client = ConnectionId::new(1);
        let worker = ConnectionId::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register_client(client, "127.0.0.1:1000".parse().unwrap(), 10, tx.clone());
        manager.register_client(worker, "127.0.0.1:1001".parse().unwrap(), 11, tx);
        manager.can_do(worker, "reverse".to_string(), None);
        manager.add_job(
            client,
            "reverse".to_string(),
            Bytes::from_static(b"abc"),
            None,
            false,
            false,
        );

        assert_eq!(text(&status_reply(&manager)), "reverse\t1\t0\t1\n.\n");
    }

    #[test]
    fn workers_reply_lists_every_connection() {
        let mut manager = TaskManager::new(Arc::new(BrokerMetrics::new()));
        let worker = ConnectionId::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register_client(worker, "10.1.2.3:5555".parse().unwrap(), 7, tx);
        manager.can_do(worker, "b".to_string(), None);
        manager.can_do(worker, "a".to_string(), None);
        manager.set_client_id(worker, "w1".to_string());

        assert_eq!(text(&workers_reply(&manager)), "7 10.1.2.3 w1 : a b\n.\n");
    }

    #[test]
    fn version_reply_is_a_single_line() {
        let Response::Text(line) = version_reply() else {
            panic!("version must be text");
        };
        assert!(line.ends_with('\n'));
        assert_eq!(line.trim_end(), env!("CARGO_PKG_VERSION"));
    }
}
