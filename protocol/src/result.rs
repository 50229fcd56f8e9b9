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

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Represents possible errors that can occur while framing or unframing
/// protocol packets.
///
/// Every variant except [`CodecError::IOError`] indicates a malformed byte
/// stream; the connection that produced it cannot be resynchronized and must
/// be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An I/O error occurred while reading from or writing to the underlying
    /// stream.
    IOError {
        /// The kind of I/O error that occurred
        kind: std::io::ErrorKind,
        /// Description of the operation that failed
        operation: String,
    },

    /// A packet header carried an unexpected magic prefix.
    BadMagic(u32),

    /// A packet declared a payload larger than the configured cap.
    PayloadTooLarge {
        /// Declared payload length
        len: usize,
        /// Maximum accepted payload length
        limit: usize,
    },

    /// An admin text line exceeded the line-length cap without a newline.
    AdminLineTooLong {
        /// Bytes buffered so far
        len: usize,
        /// Maximum accepted line length
        limit: usize,
    },

    /// A packet payload did not match the argument tuple its command
    /// code requires.
    MalformedPacket {
        /// The command code of the offending packet
        kind: u32,
        /// What was wrong with the payload
        reason: String,
    },

    /// A command code this side of the protocol never accepts.
    UnknownCommand(u32),

    /// A textual argument was not valid UTF-8.
    InvalidUtf8 {
        /// Which argument failed to decode
        field: &'static str,
    },
}

impl std::error::Error for CodecError {}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::IOError { kind, operation } => {
                write!(f, "I/O error during {}: {:?}", operation, kind)
            }
            CodecError::BadMagic(magic) => {
                write!(f, "bad packet magic: 0x{:08X}", magic)
            }
            CodecError::PayloadTooLarge { len, limit } => {
                write!(f, "packet payload of {} bytes exceeds cap of {}", len, limit)
            }
            CodecError::AdminLineTooLong { len, limit } => {
                write!(f, "admin line of {} bytes exceeds cap of {}", len, limit)
            }
            CodecError::MalformedPacket { kind, reason } => {
                write!(f, "malformed packet (command {}): {}", kind, reason)
            }
            CodecError::UnknownCommand(kind) => {
                write!(f, "unknown command code: {}", kind)
            }
            CodecError::InvalidUtf8 { field } => {
                write!(f, "argument {:?} is not valid UTF-8", field)
            }
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::IOError {
            kind: err.kind(),
            operation: err.to_string(),
        }
    }
}
