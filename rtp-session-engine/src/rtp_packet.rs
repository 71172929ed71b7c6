//! RTP (Real-time Transport Protocol) packet handling
//!
//! Implements RFC 3550 RTP packet parsing and construction.
//! This is the foundation for all media transport in the engine.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{RtpEngineError, RtpEngineResult};
use bytes::{BufMut, Bytes, BytesMut};

/// RTP protocol version; the only one this engine speaks.
pub const RTP_VERSION: u8 = 2;
/// Size of the fixed RTP header (12 bytes).
pub const RTP_FIXED_HEADER_LEN: usize = 12;
/// Maximum 7-bit payload type value.
pub const MAX_PAYLOAD_TYPE: u8 = 0x7F;
/// Maximum number of CSRC entries (4-bit CC field).
pub const MAX_CSRC_COUNT: usize = 15;

/// RTP header extension: 16-bit profile, payload in whole 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHeader {
    /// Profile-defined identifier
    pub profile: u16,
    /// Extension payload; length must be a multiple of 4
    pub data: Bytes,
}

impl ExtensionHeader {
    pub fn new(profile: u16, data: Bytes) -> RtpEngineResult<Self> {
        if data.len() % 4 != 0 {
            return Err(RtpEngineError::InvalidConfiguration(format!(
                "extension payload must be 32-bit aligned, got {} bytes",
                data.len()
            )));
        }
        if data.len() / 4 > u16::MAX as usize {
            return Err(RtpEngineError::Oversized(
                "extension payload exceeds the 16-bit word-count field".to_string(),
            ));
        }
        Ok(ExtensionHeader { profile, data })
    }

    /// Length of the extension payload in 32-bit words.
    pub fn length_words(&self) -> u16 {
        (self.data.len() / 4) as u16
    }
}

/// RTP header as defined in RFC 3550
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Marker bit
    pub marker: bool,
    /// Payload type (7 bits)
    pub payload_type: u8,
    /// Sequence number (16 bits)
    pub sequence_number: u16,
    /// Timestamp (32 bits)
    pub timestamp: u32,
    /// SSRC (Synchronization Source) identifier (32 bits)
    pub ssrc: u32,
    /// CSRC (Contributing Source) identifiers, at most 15
    pub csrcs: Vec<u32>,
    /// Extension header (optional)
    pub extension: Option<ExtensionHeader>,
}

/// Complete RTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// RTP header
    pub header: RtpHeader,
    /// Payload data (padding excluded)
    pub payload: Bytes,
    /// Trailing padding size; 0 means the padding bit is clear
    pub pad_size: u8,
}

impl RtpHeader {
    /// Size of this header on the wire in bytes.
    pub fn size(&self) -> usize {
        let mut size = RTP_FIXED_HEADER_LEN + self.csrcs.len() * 4;
        if let Some(ref ext) = self.extension {
            size += 4 + ext.data.len();
        }
        size
    }
}

impl RtpPacket {
    /// Build a packet, validating the header field bounds.
    pub fn new(header: RtpHeader, payload: Bytes, pad_size: u8) -> RtpEngineResult<Self> {
        if header.payload_type > MAX_PAYLOAD_TYPE {
            return Err(RtpEngineError::InvalidConfiguration(format!(
                "payload type {} exceeds 7 bits",
                header.payload_type
            )));
        }
        if header.csrcs.len() > MAX_CSRC_COUNT {
            return Err(RtpEngineError::Oversized(format!(
                "{} CSRC entries exceed the 4-bit CC field",
                header.csrcs.len()
            )));
        }
        Ok(RtpPacket {
            header,
            payload,
            pad_size,
        })
    }

    /// Parse an RTP packet from wire bytes.
    pub fn parse(data: &[u8]) -> RtpEngineResult<Self> {
        if data.len() < RTP_FIXED_HEADER_LEN {
            return Err(RtpEngineError::MalformedPacket(format!(
                "RTP packet too short: {} bytes",
                data.len()
            )));
        }

        // First byte: V(2) P(1) X(1) CC(4)
        let first_byte = data[0];
        let version = first_byte >> 6;
        if version != RTP_VERSION {
            return Err(RtpEngineError::MalformedPacket(format!(
                "invalid RTP version: {}",
                version
            )));
        }
        let has_padding = (first_byte & 0x20) != 0;
        let has_extension = (first_byte & 0x10) != 0;
        let csrc_count = (first_byte & 0x0F) as usize;

        // Second byte: M(1) PT(7)
        let marker = (data[1] & 0x80) != 0;
        let payload_type = data[1] & 0x7F;

        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = RTP_FIXED_HEADER_LEN;
        if data.len() < offset + 4 * csrc_count {
            return Err(RtpEngineError::MalformedPacket(
                "incomplete CSRC list".to_string(),
            ));
        }
        let mut csrcs = Vec::with_capacity(csrc_count);
        for _ in 0..csrc_count {
            csrcs.push(u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]));
            offset += 4;
        }

        let extension = if has_extension {
            if data.len() < offset + 4 {
                return Err(RtpEngineError::MalformedPacket(
                    "incomplete extension header".to_string(),
                ));
            }
            let profile = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let length_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            let ext_len = length_words * 4;
            if data.len() < offset + 4 + ext_len {
                return Err(RtpEngineError::MalformedPacket(
                    "incomplete extension data".to_string(),
                ));
            }
            let ext_data = Bytes::copy_from_slice(&data[offset + 4..offset + 4 + ext_len]);
            offset += 4 + ext_len;
            Some(ExtensionHeader {
                profile,
                data: ext_data,
            })
        } else {
            None
        };

        let mut pad_size = 0u8;
        if has_padding {
            if data.len() < offset + 1 {
                return Err(RtpEngineError::MalformedPacket(
                    "padding bit set on a packet with no room for padding".to_string(),
                ));
            }
            pad_size = data[data.len() - 1];
            if pad_size == 0 {
                return Err(RtpEngineError::MalformedPacket(
                    "padding bit set but padding size is 0".to_string(),
                ));
            }
            if offset + pad_size as usize > data.len() {
                return Err(RtpEngineError::MalformedPacket(format!(
                    "padding size {} overruns the packet",
                    pad_size
                )));
            }
        }

        let payload = Bytes::copy_from_slice(&data[offset..data.len() - pad_size as usize]);

        Ok(RtpPacket {
            header: RtpHeader {
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrcs,
                extension,
            },
            payload,
            pad_size,
        })
    }

    /// Serialize to wire bytes.
    ///
    /// Total length is always `12 + 4*cc + (4 + ext_len if extension)
    /// + payload_len + pad_size`.
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        let mut first_byte = RTP_VERSION << 6;
        if self.pad_size > 0 {
            first_byte |= 0x20;
        }
        if self.header.extension.is_some() {
            first_byte |= 0x10;
        }
        first_byte |= self.header.csrcs.len() as u8 & 0x0F;
        buf.put_u8(first_byte);

        let mut second_byte = self.header.payload_type & 0x7F;
        if self.header.marker {
            second_byte |= 0x80;
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.header.sequence_number);
        buf.put_u32(self.header.timestamp);
        buf.put_u32(self.header.ssrc);
        for &csrc in &self.header.csrcs {
            buf.put_u32(csrc);
        }
        if let Some(ref ext) = self.header.extension {
            buf.put_u16(ext.profile);
            buf.put_u16(ext.length_words());
            buf.put_slice(&ext.data);
        }
        buf.put_slice(&self.payload);
        if self.pad_size > 0 {
            for _ in 0..self.pad_size - 1 {
                buf.put_u8(0);
            }
            buf.put_u8(self.pad_size);
        }

        buf
    }

    /// Total wire size in bytes.
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len() + self.pad_size as usize
    }

    pub fn set_sequence_number(&mut self, seq: u16) {
        self.header.sequence_number = seq;
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.header.timestamp = timestamp;
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.header.payload_type
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }
}
