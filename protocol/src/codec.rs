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

use crate::consts;
use crate::packet::{AdminCommand, Inbound, Request, Response};
use crate::result::CodecError;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Broker-side codec: decodes [`Inbound`] commands, encodes [`Response`]s.
///
/// The same socket carries two syntaxes. A byte stream beginning with `\0`
/// is a framed binary packet; anything else is a newline-delimited admin
/// text line. The codec keeps no state of its own; partial frames stay in
/// the `BytesMut` owned by the transport until they are complete.
#[derive(Debug, Default)]
pub struct BrokerCodec;

impl BrokerCodec {
    /// Creates a new instance of `BrokerCodec`.
    pub fn new() -> BrokerCodec {
        BrokerCodec
    }
}

impl Decoder for BrokerCodec {
    type Item = Inbound;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>, Self::Error> {
        let Some(&first) = src.first() else {
            return Ok(None);
        };
        if first == 0x00 {
            match decode_packet(src, consts::REQ_MAGIC)? {
                Some((kind, payload)) => Ok(Some(Inbound::Packet(Request::decode(kind, payload)?))),
                None => Ok(None),
            }
        } else {
            match decode_admin_line(src)? {
                Some(line) => Ok(Some(Inbound::Admin(AdminCommand::parse(&line)))),
                None => Ok(None),
            }
        }
    }
}

impl Encoder<Response> for BrokerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

/// Worker- and client-side codec: encodes [`Request`]s, decodes
/// [`Response`]s.
///
/// Peers never receive admin text, so everything inbound must be a framed
/// `\0RES` packet.
#[derive(Debug, Default)]
pub struct WorkerCodec;

impl WorkerCodec {
    /// Creates a new instance of `WorkerCodec`.
    pub fn new() -> WorkerCodec {
        WorkerCodec
    }
}

impl Decoder for WorkerCodec {
    type Item = Response;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, Self::Error> {
        match decode_packet(src, consts::RES_MAGIC)? {
            Some((kind, payload)) => Ok(Some(Response::decode(kind, payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Request> for WorkerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

/// Pull one complete framed packet out of `src`, if buffered.
///
/// Returns the command code and payload; `Ok(None)` means more bytes are
/// needed and nothing was consumed.
fn decode_packet(
    src: &mut BytesMut,
    expected_magic: u32,
) -> Result<Option<(u32, bytes::Bytes)>, CodecError> {
    if src.len() < consts::HEADER_LEN {
        return Ok(None);
    }
    let magic = BigEndian::read_u32(&src[0..4]);
    if magic != expected_magic {
        return Err(CodecError::BadMagic(magic));
    }
    let kind = BigEndian::read_u32(&src[4..8]);
    let len = BigEndian::read_u32(&src[8..12]) as usize;
    if len > consts::MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len,
            limit: consts::MAX_PAYLOAD_LEN,
        });
    }
    if src.len() < consts::HEADER_LEN + len {
        src.reserve(consts::HEADER_LEN + len - src.len());
        return Ok(None);
    }
    src.advance(consts::HEADER_LEN);
    let payload = src.split_to(len).freeze();
    Ok(Some((kind, payload)))
}

/// Pull one newline-delimited admin line out of `src`, if buffered.
fn decode_admin_line(src: &mut BytesMut) -> Result<Option<String>, CodecError> {
    match src.iter().position(|&b| b == b'\n') {
        Some(at) => {
            let line = src.split_to(at + 1);
            let text = String::from_utf8_lossy(&line[..at]);
            Ok(Some(text.trim_end_matches('\r').to_string()))
        }
        None if src.len() > consts::MAX_ADMIN_LINE_LEN => Err(CodecError::AdminLineTooLong {
            len: src.len(),
            limit: consts::MAX_ADMIN_LINE_LEN,
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(codec: &mut BrokerCodec, buffer: &mut BytesMut) -> Vec<Inbound> {
        let mut out = Vec::new();
        while let Some(item) = codec.decode(buffer).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn broker_decodes_submit_then_admin_line() {
        let mut codec = BrokerCodec::new();
        let mut buffer = BytesMut::new();
        WorkerCodec::new()
            .encode(
                Request::SubmitJob {
                    function: "reverse".to_string(),
                    unique: Bytes::new(),
                    payload: Bytes::from_static(b"abc"),
                },
                &mut buffer,
            )
            .unwrap();
        buffer.extend_from_slice(b"status\r\n");

        let decoded = decode_all(&mut codec, &mut buffer);
        assert_eq!(decoded.len(), 2);
        assert!(matches!(decoded[0], Inbound::Packet(Request::SubmitJob { .. })));
        assert_eq!(decoded[1], Inbound::Admin(AdminCommand::Status));
        assert!(buffer.is_empty());
    }

    #[test]
    fn broker_tolerates_partial_frames() {
        let mut codec = BrokerCodec::new();
        let mut full = BytesMut::new();
        WorkerCodec::new()
            .encode(
                Request::CanDoTimeout {
                    function: "slow".to_string(),
                    timeout: 7,
                },
                &mut full,
            )
            .unwrap();

        let mut buffer = BytesMut::new();
        for (index, byte) in full.iter().enumerate() {
            buffer.extend_from_slice(&[*byte]);
            let decoded = codec.decode(&mut buffer).unwrap();
            if index + 1 < full.len() {
                assert!(decoded.is_none(), "decoded early at byte {}", index);
            } else {
                assert_eq!(
                    decoded,
                    Some(Inbound::Packet(Request::CanDoTimeout {
                        function: "slow".to_string(),
                        timeout: 7,
                    }))
                );
            }
        }
    }

    #[test]
    fn broker_rejects_response_magic() {
        let mut codec = BrokerCodec::new();
        let mut buffer = BytesMut::new();
        BrokerCodec::new()
            .encode(Response::NoJob, &mut buffer)
            .unwrap();
        let err = codec.decode(&mut buffer).unwrap_err();
        assert_eq!(err, CodecError::BadMagic(consts::RES_MAGIC));
    }

    #[test]
    fn broker_rejects_oversized_payload() {
        let mut codec = BrokerCodec::new();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&consts::REQ_MAGIC.to_be_bytes());
        buffer.extend_from_slice(&consts::command::ECHO_REQ.to_be_bytes());
        buffer.extend_from_slice(&(u32::MAX).to_be_bytes());
        let err = codec.decode(&mut buffer).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }

    #[test]
    fn worker_round_trips_job_assign() {
        let mut buffer = BytesMut::new();
        let assign = Response::JobAssign {
            handle: "1".to_string(),
            function: "reverse".to_string(),
            payload: Bytes::from_static(b"abc"),
        };
        BrokerCodec::new().encode(assign.clone(), &mut buffer).unwrap();
        let decoded = WorkerCodec::new().decode(&mut buffer).unwrap();
        assert_eq!(decoded, Some(assign));
    }

    #[test]
    fn admin_text_response_is_raw() {
        let mut buffer = BytesMut::new();
        BrokerCodec::new()
            .encode(Response::Text("reverse\t1\t0\t2\n".to_string()), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..], b"reverse\t1\t0\t2\n");
    }
}
