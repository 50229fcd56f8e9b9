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

//! End-to-end broker tests over real TCP connections

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use jobforge_broker::{BrokerConfig, BrokerServer};
use jobforge_protocol::{Request, Response, WorkerCodec};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

type Peer = Framed<TcpStream, WorkerCodec>;

async fn start_broker() -> BrokerServer {
    start_broker_with_tick(Duration::from_secs(1)).await
}

async fn start_broker_with_tick(tick: Duration) -> BrokerServer {
    let config = BrokerConfig::new("127.0.0.1:0".parse().unwrap()).with_tick_interval(tick);
    let server = BrokerServer::new(config).await.unwrap();
    server.start().await.unwrap();
    server
}

async fn connect(server: &BrokerServer) -> Peer {
    let socket = TcpStream::connect(server.local_addr()).await.unwrap();
    Framed::new(socket, WorkerCodec::new())
}

async fn send(peer: &mut Peer, request: Request) {
    peer.send(request).await.unwrap();
}

async fn recv(peer: &mut Peer) -> Response {
    tokio::time::timeout(Duration::from_secs(5), peer.next())
        .await
        .expect("timed out waiting for a response")
        .expect("connection closed unexpectedly")
        .expect("decode failure")
}

/// Round-trip an echo so every previously sent command has been processed.
async fn fence(peer: &mut Peer) {
    send(peer, Request::EchoRequest {
        payload: Bytes::from_static(b"fence"),
    })
    .await;
    assert_eq!(
        recv(peer).await,
        Response::EchoResponse {
            payload: Bytes::from_static(b"fence"),
        }
    );
}

fn submit(function: &str, unique: &[u8], payload: &[u8]) -> Request {
    Request::SubmitJob {
        function: function.to_string(),
        unique: Bytes::copy_from_slice(unique),
        payload: Bytes::copy_from_slice(payload),
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn submit_grab_complete() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut client, submit("reverse", b"", b"abc")).await;
    assert_eq!(
        recv(&mut client).await,
        Response::JobCreated {
            handle: "1".to_string(),
        }
    );

    send(&mut worker, Request::CanDo { function: "reverse".to_string() }).await;
    send(&mut worker, Request::GrabJob).await;
    assert_eq!(
        recv(&mut worker).await,
        Response::JobAssign {
            handle: "1".to_string(),
            function: "reverse".to_string(),
            payload: Bytes::from_static(b"abc"),
        }
    );

    send(&mut worker, Request::WorkComplete {
        handle: "1".to_string(),
        result: Bytes::from_static(b"cba"),
    })
    .await;
    assert_eq!(
        recv(&mut client).await,
        Response::WorkComplete {
            handle: "1".to_string(),
            result: Bytes::from_static(b"cba"),
        }
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn sleeping_worker_is_woken_by_noop() {
    let server = start_broker().await;
    let mut worker = connect(&server).await;
    let mut client = connect(&server).await;

    send(&mut worker, Request::CanDo { function: "f".to_string() }).await;
    send(&mut worker, Request::GrabJob).await;
    assert_eq!(recv(&mut worker).await, Response::NoJob);

    send(&mut worker, Request::PreSleep).await;
    // PRE_SLEEP has no reply; fence so the broker definitely processed it
    // before the submission races in.
    fence(&mut worker).await;

    send(&mut client, submit("f", b"", b"x")).await;
    assert_eq!(
        recv(&mut client).await,
        Response::JobCreated {
            handle: "1".to_string(),
        }
    );

    assert_eq!(recv(&mut worker).await, Response::Noop);
    send(&mut worker, Request::GrabJob).await;
    assert_eq!(
        recv(&mut worker).await,
        Response::JobAssign {
            handle: "1".to_string(),
            function: "f".to_string(),
            payload: Bytes::from_static(b"x"),
        }
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn high_priority_jobs_are_grabbed_first() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut client, submit("f", b"", b"A")).await;
    send(&mut client, submit("f", b"", b"B")).await;
    send(&mut client, Request::SubmitJobHigh {
        function: "f".to_string(),
        unique: Bytes::new(),
        payload: Bytes::from_static(b"C"),
    })
    .await;
    for _ in 0..3 {
        assert!(matches!(recv(&mut client).await, Response::JobCreated { .. }));
    }

    send(&mut worker, Request::CanDo { function: "f".to_string() }).await;
    let mut order = Vec::new();
    for _ in 0..3 {
        send(&mut worker, Request::GrabJob).await;
        match recv(&mut worker).await {
            Response::JobAssign { payload, .. } => order.push(payload),
            other => panic!("expected assignment, got {:?}", other),
        }
    }
    assert_eq!(
        order,
        vec![
            Bytes::from_static(b"C"),
            Bytes::from_static(b"A"),
            Bytes::from_static(b"B"),
        ]
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn declared_timeout_fails_the_job() {
    let server = start_broker_with_tick(Duration::from_millis(100)).await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut worker, Request::CanDoTimeout {
        function: "slow".to_string(),
        timeout: 1,
    })
    .await;
    send(&mut client, submit("slow", b"", b"x")).await;
    let Response::JobCreated { handle } = recv(&mut client).await else {
        panic!("expected JobCreated");
    };

    send(&mut worker, Request::GrabJob).await;
    assert!(matches!(recv(&mut worker).await, Response::JobAssign { .. }));

    // The ticker fires the deadline; the owner sees an ordinary failure.
    assert_eq!(recv(&mut client).await, Response::WorkFail { handle: handle.clone() });

    // A straggling completion for the dead handle is silently ignored.
    send(&mut worker, Request::WorkComplete {
        handle,
        result: Bytes::from_static(b"late"),
    })
    .await;
    fence(&mut client).await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn worker_disconnect_requeues_at_front() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut doomed = connect(&server).await;

    send(&mut doomed, Request::CanDo { function: "f".to_string() }).await;
    send(&mut client, submit("f", b"", b"x")).await;
    let Response::JobCreated { handle } = recv(&mut client).await else {
        panic!("expected JobCreated");
    };

    send(&mut doomed, Request::GrabJob).await;
    assert!(matches!(recv(&mut doomed).await, Response::JobAssign { .. }));

    drop(doomed);

    // The broker notices the disconnect asynchronously; poll until the job
    // is grabbable again.
    let mut rescuer = connect(&server).await;
    send(&mut rescuer, Request::CanDo { function: "f".to_string() }).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        send(&mut rescuer, Request::GrabJob).await;
        match recv(&mut rescuer).await {
            Response::JobAssign { handle: regrabbed, .. } => {
                assert_eq!(regrabbed, handle);
                break;
            }
            Response::NoJob => {
                assert!(tokio::time::Instant::now() < deadline, "job never re-queued");
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn duplicate_unique_key_returns_same_handle() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut client, submit("f", b"k", b"1")).await;
    assert_eq!(
        recv(&mut client).await,
        Response::JobCreated { handle: "1".to_string() }
    );
    send(&mut client, submit("f", b"k", b"2")).await;
    assert_eq!(
        recv(&mut client).await,
        Response::JobCreated { handle: "1".to_string() }
    );

    // Only the first payload was queued.
    send(&mut worker, Request::CanDo { function: "f".to_string() }).await;
    send(&mut worker, Request::GrabJob).await;
    assert_eq!(
        recv(&mut worker).await,
        Response::JobAssign {
            handle: "1".to_string(),
            function: "f".to_string(),
            payload: Bytes::from_static(b"1"),
        }
    );
    send(&mut worker, Request::GrabJob).await;
    assert_eq!(recv(&mut worker).await, Response::NoJob);

    server.shutdown().await.unwrap();
}

// ============================================================================
// Roles and edge cases
// ============================================================================

#[tokio::test]
async fn one_connection_can_be_client_and_worker() {
    let server = start_broker().await;
    let mut peer = connect(&server).await;

    send(&mut peer, Request::CanDo { function: "f".to_string() }).await;
    send(&mut peer, submit("f", b"", b"self")).await;
    assert_eq!(
        recv(&mut peer).await,
        Response::JobCreated { handle: "1".to_string() }
    );

    send(&mut peer, Request::GrabJob).await;
    assert!(matches!(recv(&mut peer).await, Response::JobAssign { .. }));

    send(&mut peer, Request::WorkComplete {
        handle: "1".to_string(),
        result: Bytes::from_static(b"done"),
    })
    .await;
    assert_eq!(
        recv(&mut peer).await,
        Response::WorkComplete {
            handle: "1".to_string(),
            result: Bytes::from_static(b"done"),
        }
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn background_job_completion_is_not_forwarded() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut client, Request::SubmitJobBackground {
        function: "f".to_string(),
        unique: Bytes::new(),
        payload: Bytes::from_static(b"x"),
    })
    .await;
    assert!(matches!(recv(&mut client).await, Response::JobCreated { .. }));

    send(&mut worker, Request::CanDo { function: "f".to_string() }).await;
    send(&mut worker, Request::GrabJob).await;
    assert!(matches!(recv(&mut worker).await, Response::JobAssign { .. }));
    send(&mut worker, Request::WorkComplete {
        handle: "1".to_string(),
        result: Bytes::from_static(b"out"),
    })
    .await;

    // The next thing the client hears must be the fence, not a completion.
    fence(&mut client).await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_binary_command_is_ignored() {
    let server = start_broker().await;
    let mut socket = TcpStream::connect(server.local_addr()).await.unwrap();

    // A well-framed packet with an unassigned command code.
    let mut raw = Vec::new();
    raw.extend_from_slice(b"\0REQ");
    raw.extend_from_slice(&9999u32.to_be_bytes());
    raw.extend_from_slice(&4u32.to_be_bytes());
    raw.extend_from_slice(b"junk");
    socket.write_all(&raw).await.unwrap();

    // The connection survives and still answers echo.
    let mut peer = Framed::new(socket, WorkerCodec::new());
    fence(&mut peer).await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_magic_closes_the_connection() {
    let server = start_broker().await;
    let mut socket = TcpStream::connect(server.local_addr()).await.unwrap();

    socket.write_all(b"\0BAD\x00\x00\x00\x01\x00\x00\x00\x00").await.unwrap();

    let mut buffer = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buffer))
        .await
        .expect("timed out waiting for close")
        .unwrap();
    assert_eq!(read, 0, "broker should close on protocol error");

    // Other connections are unaffected.
    let mut peer = connect(&server).await;
    fence(&mut peer).await;

    server.shutdown().await.unwrap();
}

// ============================================================================
// Admin text mode
// ============================================================================

async fn admin_request(server: &BrokerServer, command: &str) -> String {
    let mut socket = TcpStream::connect(server.local_addr()).await.unwrap();
    socket.write_all(command.as_bytes()).await.unwrap();
    socket.write_all(b"\n").await.unwrap();

    let mut reply = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
        let read = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buffer))
            .await
            .expect("timed out waiting for admin reply")
            .unwrap();
        assert_ne!(read, 0, "connection closed before the reply finished");
        reply.extend_from_slice(&buffer[..read]);
        let text = String::from_utf8_lossy(&reply);
        if command == "version" {
            if text.ends_with('\n') {
                return text.into_owned();
            }
        } else if text.ends_with(".\n") {
            return text.into_owned();
        }
    }
}

#[tokio::test]
async fn admin_status_reports_per_function_counts() {
    let server = start_broker().await;
    let mut client = connect(&server).await;
    let mut worker = connect(&server).await;

    send(&mut worker, Request::CanDo { function: "reverse".to_string() }).await;
    fence(&mut worker).await;
    send(&mut client, submit("reverse", b"", b"abc")).await;
    assert!(matches!(recv(&mut client).await, Response::JobCreated { .. }));

    let reply = admin_request(&server, "status").await;
    assert_eq!(reply, "reverse\t1\t0\t1\n.\n");

    // Grab it and the line shifts from queued to running.
    send(&mut worker, Request::GrabJob).await;
    assert!(matches!(recv(&mut worker).await, Response::JobAssign { .. }));

    let reply = admin_request(&server, "status").await;
    assert_eq!(reply, "reverse\t0\t1\t1\n.\n");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn admin_workers_lists_abilities_and_labels() {
    let server = start_broker().await;
    let mut worker = connect(&server).await;

    send(&mut worker, Request::SetClientId { id: "crusher".to_string() }).await;
    send(&mut worker, Request::CanDo { function: "b".to_string() }).await;
    send(&mut worker, Request::CanDo { function: "a".to_string() }).await;
    fence(&mut worker).await;

    let reply = admin_request(&server, "workers").await;
    // The admin connection itself is listed too; find the labeled line.
    let line = reply
        .lines()
        .find(|line| line.contains("crusher"))
        .expect("worker line missing");
    assert!(line.ends_with(": a b"), "unexpected line: {line}");
    assert!(reply.ends_with(".\n"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn admin_version_reports_crate_version() {
    let server = start_broker().await;
    let reply = admin_request(&server, "version").await;
    assert_eq!(reply.trim_end(), env!("CARGO_PKG_VERSION"));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn admin_shutdown_stops_the_broker() {
    let server = start_broker().await;
    let mut socket = TcpStream::connect(server.local_addr()).await.unwrap();
    socket.write_all(b"shutdown\n").await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.is_running() {
        assert!(tokio::time::Instant::now() < deadline, "broker never stopped");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
