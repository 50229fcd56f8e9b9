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

//! Typed packet representations for both directions of the protocol.
//!
//! A packet on the wire is a 12-byte header (magic, command code, payload
//! length, all big-endian) followed by a payload of `\0`-separated arguments.
//! The final argument is raw and may itself contain `\0` bytes, so payloads
//! are split at most `argc - 1` times.

use crate::consts::{self, command};
use crate::result::{CodecError, CodecResult};
use bytes::{BufMut, Bytes, BytesMut};

/// A command travelling toward the broker.
///
/// Submitters and executors share one connection type, so this enum covers
/// both roles; the broker infers the role from the commands it sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Advertise the ability to execute `function`.
    CanDo {
        /// Function name
        function: String,
    },
    /// Advertise an ability with an execution timeout in seconds.
    CanDoTimeout {
        /// Function name
        function: String,
        /// Timeout in seconds; `0` means no deadline
        timeout: u64,
    },
    /// Withdraw a previously advertised ability.
    CantDo {
        /// Function name
        function: String,
    },
    /// Withdraw every advertised ability.
    ResetAbilities,
    /// Announce that the connection is about to sleep until woken.
    PreSleep,
    /// Ask for a queued job matching any advertised ability.
    GrabJob,
    /// Submit a normal-priority job.
    SubmitJob {
        /// Function name
        function: String,
        /// Optional dedup key; empty means none
        unique: Bytes,
        /// Opaque job payload
        payload: Bytes,
    },
    /// Submit a high-priority job (front of its function queue).
    SubmitJobHigh {
        /// Function name
        function: String,
        /// Optional dedup key; empty means none
        unique: Bytes,
        /// Opaque job payload
        payload: Bytes,
    },
    /// Submit a background job; its completion is discarded.
    SubmitJobBackground {
        /// Function name
        function: String,
        /// Optional dedup key; empty means none
        unique: Bytes,
        /// Opaque job payload
        payload: Bytes,
    },
    /// Report a successful result for a running job.
    WorkComplete {
        /// Job handle as issued by the broker
        handle: String,
        /// Opaque result bytes
        result: Bytes,
    },
    /// Report failure of a running job.
    WorkFail {
        /// Job handle as issued by the broker
        handle: String,
    },
    /// Ask the broker to echo the payload back.
    EchoRequest {
        /// Bytes to echo
        payload: Bytes,
    },
    /// Label this connection for the admin `workers` listing.
    SetClientId {
        /// Self-reported label
        id: String,
    },
    /// A well-framed packet with a command code this side does not know.
    ///
    /// Kept as a value rather than an error so the receiver can log and
    /// ignore it without tearing the connection down.
    Unknown {
        /// The unrecognized command code
        kind: u32,
    },
}

impl Request {
    /// Decode a request payload for the given command code.
    pub fn decode(kind: u32, payload: Bytes) -> CodecResult<Request> {
        match kind {
            command::CAN_DO => {
                let [function] = fixed_args(kind, payload)?;
                Ok(Request::CanDo {
                    function: utf8_arg(function, "function")?,
                })
            }
            command::CAN_DO_TIMEOUT => {
                let [function, timeout] = fixed_args(kind, payload)?;
                Ok(Request::CanDoTimeout {
                    function: utf8_arg(function, "function")?,
                    timeout: decimal_arg(kind, timeout, "timeout")?,
                })
            }
            command::CANT_DO => {
                let [function] = fixed_args(kind, payload)?;
                Ok(Request::CantDo {
                    function: utf8_arg(function, "function")?,
                })
            }
            command::RESET_ABILITIES => {
                no_args(kind, &payload)?;
                Ok(Request::ResetAbilities)
            }
            command::PRE_SLEEP => {
                no_args(kind, &payload)?;
                Ok(Request::PreSleep)
            }
            command::GRAB_JOB => {
                no_args(kind, &payload)?;
                Ok(Request::GrabJob)
            }
            command::SUBMIT_JOB => {
                let [function, unique, payload] = fixed_args(kind, payload)?;
                Ok(Request::SubmitJob {
                    function: utf8_arg(function, "function")?,
                    unique,
                    payload,
                })
            }
            command::SUBMIT_JOB_HIGH => {
                let [function, unique, payload] = fixed_args(kind, payload)?;
                Ok(Request::SubmitJobHigh {
                    function: utf8_arg(function, "function")?,
                    unique,
                    payload,
                })
            }
            command::SUBMIT_JOB_BG => {
                let [function, unique, payload] = fixed_args(kind, payload)?;
                Ok(Request::SubmitJobBackground {
                    function: utf8_arg(function, "function")?,
                    unique,
                    payload,
                })
            }
            command::WORK_COMPLETE => {
                let [handle, result] = fixed_args(kind, payload)?;
                Ok(Request::WorkComplete {
                    handle: utf8_arg(handle, "handle")?,
                    result,
                })
            }
            command::WORK_FAIL => {
                let [handle] = fixed_args(kind, payload)?;
                Ok(Request::WorkFail {
                    handle: utf8_arg(handle, "handle")?,
                })
            }
            command::ECHO_REQ => Ok(Request::EchoRequest { payload }),
            command::SET_CLIENT_ID => {
                let [id] = fixed_args(kind, payload)?;
                Ok(Request::SetClientId {
                    id: utf8_arg(id, "client_id")?,
                })
            }
            other => Ok(Request::Unknown { kind: other }),
        }
    }

    /// Encode this request into `dst`, header included.
    pub fn encode(&self, dst: &mut BytesMut) -> CodecResult<()> {
        match self {
            Request::CanDo { function } => {
                write_packet(dst, consts::REQ_MAGIC, command::CAN_DO, &[function.as_bytes()])
            }
            Request::CanDoTimeout { function, timeout } => {
                let timeout = timeout.to_string();
                write_packet(
                    dst,
                    consts::REQ_MAGIC,
                    command::CAN_DO_TIMEOUT,
                    &[function.as_bytes(), timeout.as_bytes()],
                )
            }
            Request::CantDo { function } => {
                write_packet(dst, consts::REQ_MAGIC, command::CANT_DO, &[function.as_bytes()])
            }
            Request::ResetAbilities => {
                write_packet(dst, consts::REQ_MAGIC, command::RESET_ABILITIES, &[])
            }
            Request::PreSleep => write_packet(dst, consts::REQ_MAGIC, command::PRE_SLEEP, &[]),
            Request::GrabJob => write_packet(dst, consts::REQ_MAGIC, command::GRAB_JOB, &[]),
            Request::SubmitJob {
                function,
                unique,
                payload,
            } => write_packet(
                dst,
                consts::REQ_MAGIC,
                command::SUBMIT_JOB,
                &[function.as_bytes(), unique, payload],
            ),
            Request::SubmitJobHigh {
                function,
                unique,
                payload,
            } => write_packet(
                dst,
                consts::REQ_MAGIC,
                command::SUBMIT_JOB_HIGH,
                &[function.as_bytes(), unique, payload],
            ),
            Request::SubmitJobBackground {
                function,
                unique,
                payload,
            } => write_packet(
                dst,
                consts::REQ_MAGIC,
                command::SUBMIT_JOB_BG,
                &[function.as_bytes(), unique, payload],
            ),
            Request::WorkComplete { handle, result } => write_packet(
                dst,
                consts::REQ_MAGIC,
                command::WORK_COMPLETE,
                &[handle.as_bytes(), result],
            ),
            Request::WorkFail { handle } => write_packet(
                dst,
                consts::REQ_MAGIC,
                command::WORK_FAIL,
                &[handle.as_bytes()],
            ),
            Request::EchoRequest { payload } => {
                write_packet(dst, consts::REQ_MAGIC, command::ECHO_REQ, &[payload])
            }
            Request::SetClientId { id } => {
                write_packet(dst, consts::REQ_MAGIC, command::SET_CLIENT_ID, &[id.as_bytes()])
            }
            Request::Unknown { kind } => Err(CodecError::UnknownCommand(*kind)),
        }
    }
}

/// A command travelling from the broker to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A submission was accepted; carries the new job handle.
    JobCreated {
        /// Broker-assigned job handle
        handle: String,
    },
    /// A job is handed to the requesting worker.
    JobAssign {
        /// Broker-assigned job handle
        handle: String,
        /// Function name
        function: String,
        /// Opaque job payload
        payload: Bytes,
    },
    /// Nothing is queued for the worker's abilities.
    NoJob,
    /// Wake-up for a sleeping worker.
    Noop,
    /// A job the connection submitted finished successfully.
    WorkComplete {
        /// Job handle
        handle: String,
        /// Opaque result bytes
        result: Bytes,
    },
    /// A job the connection submitted failed (or timed out).
    WorkFail {
        /// Job handle
        handle: String,
    },
    /// Echo of an [`Request::EchoRequest`] payload.
    EchoResponse {
        /// Echoed bytes
        payload: Bytes,
    },
    /// A raw admin text reply; written to the stream verbatim.
    ///
    /// Admin replies are newline-delimited ASCII on the same socket as the
    /// binary packets, so they share the outbound path.
    Text(String),
}

impl Response {
    /// Decode a response payload for the given command code.
    pub fn decode(kind: u32, payload: Bytes) -> CodecResult<Response> {
        match kind {
            command::JOB_CREATED => {
                let [handle] = fixed_args(kind, payload)?;
                Ok(Response::JobCreated {
                    handle: utf8_arg(handle, "handle")?,
                })
            }
            command::JOB_ASSIGN => {
                let [handle, function, payload] = fixed_args(kind, payload)?;
                Ok(Response::JobAssign {
                    handle: utf8_arg(handle, "handle")?,
                    function: utf8_arg(function, "function")?,
                    payload,
                })
            }
            command::NO_JOB => {
                no_args(kind, &payload)?;
                Ok(Response::NoJob)
            }
            command::NOOP => {
                no_args(kind, &payload)?;
                Ok(Response::Noop)
            }
            command::WORK_COMPLETE => {
                let [handle, result] = fixed_args(kind, payload)?;
                Ok(Response::WorkComplete {
                    handle: utf8_arg(handle, "handle")?,
                    result,
                })
            }
            command::WORK_FAIL => {
                let [handle] = fixed_args(kind, payload)?;
                Ok(Response::WorkFail {
                    handle: utf8_arg(handle, "handle")?,
                })
            }
            command::ECHO_RES => Ok(Response::EchoResponse { payload }),
            other => Err(CodecError::UnknownCommand(other)),
        }
    }

    /// Encode this response into `dst`, header included.
    ///
    /// [`Response::Text`] is written raw with no header; the caller is
    /// responsible for including the trailing newline in the string.
    pub fn encode(&self, dst: &mut BytesMut) -> CodecResult<()> {
        match self {
            Response::JobCreated { handle } => write_packet(
                dst,
                consts::RES_MAGIC,
                command::JOB_CREATED,
                &[handle.as_bytes()],
            ),
            Response::JobAssign {
                handle,
                function,
                payload,
            } => write_packet(
                dst,
                consts::RES_MAGIC,
                command::JOB_ASSIGN,
                &[handle.as_bytes(), function.as_bytes(), payload],
            ),
            Response::NoJob => write_packet(dst, consts::RES_MAGIC, command::NO_JOB, &[]),
            Response::Noop => write_packet(dst, consts::RES_MAGIC, command::NOOP, &[]),
            Response::WorkComplete { handle, result } => write_packet(
                dst,
                consts::RES_MAGIC,
                command::WORK_COMPLETE,
                &[handle.as_bytes(), result],
            ),
            Response::WorkFail { handle } => write_packet(
                dst,
                consts::RES_MAGIC,
                command::WORK_FAIL,
                &[handle.as_bytes()],
            ),
            Response::EchoResponse { payload } => {
                write_packet(dst, consts::RES_MAGIC, command::ECHO_RES, &[payload])
            }
            Response::Text(line) => {
                dst.extend_from_slice(line.as_bytes());
                Ok(())
            }
        }
    }
}

/// A text-mode admin command, parsed from one newline-delimited line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Per-function queue depth, running count, and worker count.
    Status,
    /// One line per connection with its abilities.
    Workers,
    /// The broker version string.
    Version,
    /// Stop the broker process.
    Shutdown,
    /// Anything else; logged and ignored upstream.
    Unknown(String),
}

impl AdminCommand {
    /// Parse one admin line (newline already stripped).
    ///
    /// Only the first whitespace-separated token is significant; trailing
    /// arguments are accepted and ignored.
    pub fn parse(line: &str) -> AdminCommand {
        match line.split_whitespace().next().unwrap_or("") {
            "status" => AdminCommand::Status,
            "workers" => AdminCommand::Workers,
            "version" => AdminCommand::Version,
            "shutdown" => AdminCommand::Shutdown,
            _ => AdminCommand::Unknown(line.to_string()),
        }
    }
}

/// One decoded unit of input on a broker-side connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A framed binary request.
    Packet(Request),
    /// A newline-delimited admin text command.
    Admin(AdminCommand),
}

/// Write one framed packet: header, then `\0`-joined arguments.
fn write_packet(dst: &mut BytesMut, magic: u32, kind: u32, args: &[&[u8]]) -> CodecResult<()> {
    let body_len = args.iter().map(|a| a.len()).sum::<usize>() + args.len().saturating_sub(1);
    dst.reserve(consts::HEADER_LEN + body_len);
    dst.put_u32(magic);
    dst.put_u32(kind);
    dst.put_u32(body_len as u32);
    for (index, arg) in args.iter().enumerate() {
        if index != 0 {
            dst.put_u8(consts::ARG_SEPARATOR);
        }
        dst.extend_from_slice(arg);
    }
    Ok(())
}

/// Split a payload into exactly `N` arguments.
///
/// The payload is split on the first `N - 1` separators; the final argument
/// keeps any separators it contains.
fn fixed_args<const N: usize>(kind: u32, mut payload: Bytes) -> CodecResult<[Bytes; N]> {
    let mut args = [const { Bytes::new() }; N];
    for slot in args.iter_mut().take(N - 1) {
        match payload.iter().position(|&b| b == consts::ARG_SEPARATOR) {
            Some(at) => {
                *slot = payload.split_to(at);
                // Drop the separator itself.
                let _ = payload.split_to(1);
            }
            None => {
                return Err(CodecError::MalformedPacket {
                    kind,
                    reason: format!("expected {} arguments", N),
                });
            }
        }
    }
    args[N - 1] = payload;
    Ok(args)
}

/// Require an empty payload for zero-argument commands.
fn no_args(kind: u32, payload: &Bytes) -> CodecResult<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(CodecError::MalformedPacket {
            kind,
            reason: format!("expected no arguments, got {} bytes", payload.len()),
        })
    }
}

/// Decode a textual argument as UTF-8.
fn utf8_arg(bytes: Bytes, field: &'static str) -> CodecResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
}

/// Decode a decimal integer argument.
fn decimal_arg(kind: u32, bytes: Bytes, field: &'static str) -> CodecResult<u64> {
    let text = std::str::from_utf8(&bytes).map_err(|_| CodecError::InvalidUtf8 { field })?;
    text.parse::<u64>().map_err(|_| CodecError::MalformedPacket {
        kind,
        reason: format!("argument {:?} is not a decimal integer", field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_decode_submit() {
        let payload = Bytes::from_static(b"reverse\0key\0abc");
        let request = Request::decode(command::SUBMIT_JOB, payload).unwrap();
        assert_eq!(
            request,
            Request::SubmitJob {
                function: "reverse".to_string(),
                unique: Bytes::from_static(b"key"),
                payload: Bytes::from_static(b"abc"),
            }
        );
    }

    #[test]
    fn request_decode_payload_keeps_separators() {
        let payload = Bytes::from_static(b"f\0\0a\0b");
        let request = Request::decode(command::SUBMIT_JOB, payload).unwrap();
        assert_eq!(
            request,
            Request::SubmitJob {
                function: "f".to_string(),
                unique: Bytes::new(),
                payload: Bytes::from_static(b"a\0b"),
            }
        );
    }

    #[test]
    fn request_decode_missing_argument() {
        let payload = Bytes::from_static(b"just-a-function");
        let err = Request::decode(command::SUBMIT_JOB, payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPacket { .. }));
    }

    #[test]
    fn request_decode_unknown_command_is_a_value() {
        let request = Request::decode(9999, Bytes::from_static(b"whatever")).unwrap();
        assert_eq!(request, Request::Unknown { kind: 9999 });
    }

    #[test]
    fn request_decode_timeout() {
        let payload = Bytes::from_static(b"slow\x0042");
        let request = Request::decode(command::CAN_DO_TIMEOUT, payload).unwrap();
        assert_eq!(
            request,
            Request::CanDoTimeout {
                function: "slow".to_string(),
                timeout: 42,
            }
        );
    }

    #[test]
    fn request_decode_zero_arg_command_rejects_payload() {
        let err = Request::decode(command::GRAB_JOB, Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPacket { .. }));
    }

    #[test]
    fn response_decode_unknown_command_is_an_error() {
        let err = Response::decode(9999, Bytes::new()).unwrap_err();
        assert_eq!(err, CodecError::UnknownCommand(9999));
    }

    #[test]
    fn admin_parse() {
        assert_eq!(AdminCommand::parse("status"), AdminCommand::Status);
        assert_eq!(AdminCommand::parse("workers"), AdminCommand::Workers);
        assert_eq!(AdminCommand::parse("version"), AdminCommand::Version);
        assert_eq!(AdminCommand::parse("shutdown graceful"), AdminCommand::Shutdown);
        assert_eq!(
            AdminCommand::parse("maxqueue f 10"),
            AdminCommand::Unknown("maxqueue f 10".to_string())
        );
    }
}
