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

//! # Jobforge Wire Protocol Codec
//!
//! This crate implements the framed binary protocol spoken between the
//! jobforge broker and its peers (job submitters and job executors), plus
//! the newline-delimited admin text mode that shares the same socket.
//!
//! ## Packet layout
//!
//! Every binary packet starts with a 12-byte header:
//!
//! ```text
//! +----------+----------+----------------+
//! |  magic   | command  | payload length |
//! | 4 bytes  | 4 bytes  |    4 bytes     |
//! +----------+----------+----------------+
//! ```
//!
//! All header fields are big-endian. The magic is `\0REQ` for packets
//! travelling toward the broker and `\0RES` for packets travelling from it.
//! The payload is a sequence of `\0`-separated arguments; the final argument
//! is raw and may contain `\0` bytes of its own.
//!
//! ## Admin text mode
//!
//! A connection whose next byte is not `\0` is speaking the admin text
//! protocol: one ASCII command per line (`status`, `workers`, `version`,
//! `shutdown`), with multi-line replies terminated by a line containing
//! exactly `.`.
//!
//! ## Core components
//!
//! - [`BrokerCodec`] — server side: decodes [`Inbound`] (a [`Request`]
//!   packet or an [`AdminCommand`] line), encodes [`Response`].
//! - [`WorkerCodec`] — peer side: encodes [`Request`], decodes
//!   [`Response`].
//!
//! Both implement the `tokio_util::codec` traits and are intended to be
//! wrapped in a `Framed` transport. Partial frames across reads are
//! retained until complete; a malformed stream yields a [`CodecError`] and
//! cannot be resynchronized.
//!
//! ## Usage example
//!
//! ```rust
//! use jobforge_protocol::{Request, WorkerCodec};
//! use bytes::BytesMut;
//! use tokio_util::codec::Encoder;
//!
//! let mut buffer = BytesMut::new();
//! WorkerCodec::new()
//!     .encode(Request::GrabJob, &mut buffer)
//!     .unwrap();
//! assert_eq!(&buffer[..4], b"\0REQ");
//! ```

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod codec;
pub mod consts;
mod packet;
mod result;

pub use self::codec::{BrokerCodec, WorkerCodec};
pub use self::packet::{AdminCommand, Inbound, Request, Response};
pub use self::result::{CodecError, CodecResult};
