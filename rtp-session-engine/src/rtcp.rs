//! RTCP (RTP Control Protocol) implementation
//!
//! Implements RFC 3550 RTCP packet types (SR, RR, SDES, BYE, APP) plus the
//! RFC 4585 generic NACK, and the compound-packet framing that carries them.
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


use crate::clock::NtpTime;
use crate::error::{RtpEngineError, RtpEngineResult};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

/// Size of the RTCP common header.
pub const RTCP_HEADER_LEN: usize = 4;
/// At most 31 report blocks fit the 5-bit count field.
pub const MAX_REPORT_BLOCKS: usize = 31;

pub const PT_SENDER_REPORT: u8 = 200;
pub const PT_RECEIVER_REPORT: u8 = 201;
pub const PT_SDES: u8 = 202;
pub const PT_BYE: u8 = 203;
pub const PT_APP: u8 = 204;
pub const PT_RTPFB: u8 = 205;
/// RTPFB feedback message type for the generic NACK.
pub const FMT_GENERIC_NACK: u8 = 1;

const SENDER_BASE_LEN: usize = 24;
const REPORT_BLOCK_LEN: usize = 24;
const FEEDBACK_COMMON_LEN: usize = 8;
const NACK_ITEM_LEN: usize = 4;
const APP_BASE_LEN: usize = 8;
const SDES_CNAME_TAG: u8 = 1;

/// One sub-packet's common header plus its payload slice.
///
/// The payload excludes the 4-byte header and any trailing padding.
#[derive(Debug)]
pub struct RtcpCommonHeader<'a> {
    pub packet_type: u8,
    pub count_or_format: u8,
    pub payload: &'a [u8],
}

impl<'a> RtcpCommonHeader<'a> {
    /// Parse one common header; returns the header and the rest of the
    /// compound buffer after this sub-packet.
    pub fn parse(buffer: &'a [u8]) -> RtpEngineResult<(Self, &'a [u8])> {
        if buffer.len() < RTCP_HEADER_LEN {
            return Err(RtpEngineError::MalformedPacket(
                "RTCP header truncated".to_string(),
            ));
        }
        let version = buffer[0] >> 6;
        if version != 2 {
            return Err(RtpEngineError::MalformedPacket(format!(
                "invalid RTCP version: {}",
                version
            )));
        }
        let has_padding = (buffer[0] & 0x20) != 0;
        let count_or_format = buffer[0] & 0x1F;
        let packet_type = buffer[1];
        let mut payload_size =
            u16::from_be_bytes([buffer[2], buffer[3]]) as usize * 4;
        if buffer.len() < RTCP_HEADER_LEN + payload_size {
            return Err(RtpEngineError::MalformedPacket(
                "RTCP length field overruns the buffer".to_string(),
            ));
        }
        let rest = &buffer[RTCP_HEADER_LEN + payload_size..];
        if has_padding {
            if payload_size == 0 {
                return Err(RtpEngineError::MalformedPacket(
                    "padding bit set with zero payload".to_string(),
                ));
            }
            let pad = buffer[RTCP_HEADER_LEN + payload_size - 1] as usize;
            if pad == 0 || pad > payload_size {
                return Err(RtpEngineError::MalformedPacket(format!(
                    "invalid RTCP padding size {}",
                    pad
                )));
            }
            payload_size -= pad;
        }
        Ok((
            RtcpCommonHeader {
                packet_type,
                count_or_format,
                payload: &buffer[RTCP_HEADER_LEN..RTCP_HEADER_LEN + payload_size],
            },
            rest,
        ))
    }
}

fn put_header(buf: &mut BytesMut, count_or_format: u8, packet_type: u8, payload_words: usize) {
    buf.put_u8((2 << 6) | (count_or_format & 0x1F));
    buf.put_u8(packet_type);
    buf.put_u16(payload_words as u16);
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Reception report block (RFC 3550 section 6.4.1)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportBlock {
    /// SSRC of the reported source
    pub source_ssrc: u32,
    /// Fraction lost since the last report, fixed point 0..1 in 1/256 units
    pub fraction_lost: u8,
    /// Cumulative packets lost (24-bit signed on the wire)
    pub cumulative_lost: i32,
    /// Extended highest sequence number received
    pub extended_highest_seq: u32,
    /// Interarrival jitter
    pub jitter: u32,
    /// Last SR timestamp (middle 32 bits of the SR NTP)
    pub last_sr: u32,
    /// Delay since last SR, in 1/65536 seconds
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    /// Cumulative lost has only 3 signed bytes on the wire.
    pub fn set_cumulative_lost(&mut self, lost: i32) -> RtpEngineResult<()> {
        if lost >= (1 << 23) || lost < -(1 << 23) {
            return Err(RtpEngineError::Oversized(format!(
                "cumulative lost {} does not fit 24 bits",
                lost
            )));
        }
        self.cumulative_lost = lost;
        Ok(())
    }

    fn parse(buf: &[u8]) -> Self {
        let raw = ((buf[5] as u32) << 16) | ((buf[6] as u32) << 8) | buf[7] as u32;
        // Sign-extend the 24-bit value.
        let cumulative_lost = ((raw << 8) as i32) >> 8;
        ReportBlock {
            source_ssrc: read_u32(buf, 0),
            fraction_lost: buf[4],
            cumulative_lost,
            extended_highest_seq: read_u32(buf, 8),
            jitter: read_u32(buf, 12),
            last_sr: read_u32(buf, 16),
            delay_since_last_sr: read_u32(buf, 20),
        }
    }

    fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u32(self.source_ssrc);
        buf.put_u8(self.fraction_lost);
        let lost = self.cumulative_lost.to_be_bytes();
        buf.put_u8(lost[1]);
        buf.put_u8(lost[2]);
        buf.put_u8(lost[3]);
        buf.put_u32(self.extended_highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
    }
}

/// RTCP Sender Report (RFC 3550 section 6.4.1)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SenderReport {
    pub sender_ssrc: u32,
    pub ntp: NtpTime,
    pub rtp_timestamp: u32,
    pub sender_packet_count: u32,
    pub sender_octet_count: u32,
    pub report_blocks: Vec<ReportBlock>,
}

impl SenderReport {
    pub fn block_length(&self) -> usize {
        RTCP_HEADER_LEN + SENDER_BASE_LEN + self.report_blocks.len() * REPORT_BLOCK_LEN
    }

    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let count = header.count_or_format as usize;
        let payload = header.payload;
        if payload.len() < SENDER_BASE_LEN + count * REPORT_BLOCK_LEN {
            return Err(RtpEngineError::MalformedPacket(
                "sender report too small for its report blocks".to_string(),
            ));
        }
        let mut report_blocks = Vec::with_capacity(count);
        for i in 0..count {
            report_blocks.push(ReportBlock::parse(
                &payload[SENDER_BASE_LEN + i * REPORT_BLOCK_LEN..],
            ));
        }
        Ok(SenderReport {
            sender_ssrc: read_u32(payload, 0),
            ntp: NtpTime::from_parts(read_u32(payload, 4), read_u32(payload, 8)),
            rtp_timestamp: read_u32(payload, 12),
            sender_packet_count: read_u32(payload, 16),
            sender_octet_count: read_u32(payload, 20),
            report_blocks,
        })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        if self.report_blocks.len() > MAX_REPORT_BLOCKS {
            return Err(RtpEngineError::Oversized(
                "more than 31 report blocks".to_string(),
            ));
        }
        put_header(
            buf,
            self.report_blocks.len() as u8,
            PT_SENDER_REPORT,
            (self.block_length() - RTCP_HEADER_LEN) / 4,
        );
        buf.put_u32(self.sender_ssrc);
        buf.put_u64(self.ntp.as_u64());
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.sender_packet_count);
        buf.put_u32(self.sender_octet_count);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
        Ok(())
    }
}

/// RTCP Receiver Report (RFC 3550 section 6.4.2)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverReport {
    pub sender_ssrc: u32,
    pub report_blocks: Vec<ReportBlock>,
}

impl ReceiverReport {
    pub fn block_length(&self) -> usize {
        RTCP_HEADER_LEN + 4 + self.report_blocks.len() * REPORT_BLOCK_LEN
    }

    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let count = header.count_or_format as usize;
        let payload = header.payload;
        if payload.len() < 4 + count * REPORT_BLOCK_LEN {
            return Err(RtpEngineError::MalformedPacket(
                "receiver report too small for its report blocks".to_string(),
            ));
        }
        let mut report_blocks = Vec::with_capacity(count);
        for i in 0..count {
            report_blocks.push(ReportBlock::parse(&payload[4 + i * REPORT_BLOCK_LEN..]));
        }
        Ok(ReceiverReport {
            sender_ssrc: read_u32(payload, 0),
            report_blocks,
        })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        if self.report_blocks.len() > MAX_REPORT_BLOCKS {
            return Err(RtpEngineError::Oversized(
                "more than 31 report blocks".to_string(),
            ));
        }
        put_header(
            buf,
            self.report_blocks.len() as u8,
            PT_RECEIVER_REPORT,
            (self.block_length() - RTCP_HEADER_LEN) / 4,
        );
        buf.put_u32(self.sender_ssrc);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
        Ok(())
    }
}

/// One SDES chunk; only the CNAME item is modeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub cname: String,
}

/// RTCP Source Description (RFC 3550 section 6.5)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sdes {
    pub chunks: Vec<SdesChunk>,
}

impl Sdes {
    pub fn add_cname(&mut self, ssrc: u32, cname: String) -> RtpEngineResult<()> {
        if self.chunks.len() >= 0x1F {
            return Err(RtpEngineError::Oversized(
                "more than 31 SDES chunks".to_string(),
            ));
        }
        if cname.len() > 0xFF {
            return Err(RtpEngineError::Oversized(
                "CNAME longer than 255 bytes".to_string(),
            ));
        }
        self.chunks.push(SdesChunk { ssrc, cname });
        Ok(())
    }

    fn chunk_size(chunk: &SdesChunk) -> usize {
        // ssrc + item header + cname + terminator, padded to 32 bits.
        let unpadded = 4 + 2 + chunk.cname.len() + 1;
        (unpadded + 3) & !3
    }

    pub fn block_length(&self) -> usize {
        RTCP_HEADER_LEN + self.chunks.iter().map(Self::chunk_size).sum::<usize>()
    }

    /// Chunk iteration stops at the payload boundary; the count field is
    /// not trusted beyond it.
    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let payload = header.payload;
        let count = header.count_or_format as usize;
        let mut chunks = Vec::new();
        let mut offset = 0usize;
        while chunks.len() < count && offset + 4 <= payload.len() {
            let ssrc = read_u32(payload, offset);
            offset += 4;
            let mut cname = String::new();
            loop {
                if offset >= payload.len() {
                    return Err(RtpEngineError::MalformedPacket(
                        "SDES chunk missing terminator".to_string(),
                    ));
                }
                let item_type = payload[offset];
                offset += 1;
                if item_type == 0 {
                    // Skip the null padding up to the next 32-bit boundary.
                    offset = (offset + 3) & !3;
                    break;
                }
                if offset >= payload.len() {
                    return Err(RtpEngineError::MalformedPacket(
                        "SDES item truncated".to_string(),
                    ));
                }
                let item_len = payload[offset] as usize;
                offset += 1;
                if offset + item_len > payload.len() {
                    return Err(RtpEngineError::MalformedPacket(
                        "SDES item overruns the chunk".to_string(),
                    ));
                }
                if item_type == SDES_CNAME_TAG {
                    cname = String::from_utf8_lossy(&payload[offset..offset + item_len])
                        .into_owned();
                }
                offset += item_len;
            }
            chunks.push(SdesChunk { ssrc, cname });
        }
        Ok(Sdes { chunks })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        if self.chunks.len() > 0x1F {
            return Err(RtpEngineError::Oversized(
                "more than 31 SDES chunks".to_string(),
            ));
        }
        put_header(
            buf,
            self.chunks.len() as u8,
            PT_SDES,
            (self.block_length() - RTCP_HEADER_LEN) / 4,
        );
        for chunk in &self.chunks {
            buf.put_u32(chunk.ssrc);
            buf.put_u8(SDES_CNAME_TAG);
            buf.put_u8(chunk.cname.len() as u8);
            buf.put_slice(chunk.cname.as_bytes());
            let written = 4 + 2 + chunk.cname.len();
            for _ in 0..Self::chunk_size(chunk) - written {
                buf.put_u8(0);
            }
        }
        Ok(())
    }
}

/// RTCP Goodbye (RFC 3550 section 6.6)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bye {
    pub sender_ssrc: u32,
    pub csrcs: Vec<u32>,
    pub reason: Option<String>,
}

impl Bye {
    pub fn block_length(&self) -> usize {
        let reason_words = match &self.reason {
            Some(r) => r.len() / 4 + 1,
            None => 0,
        };
        RTCP_HEADER_LEN + 4 * (1 + self.csrcs.len() + reason_words)
    }

    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let payload = header.payload;
        let src_count = header.count_or_format as usize;
        if payload.len() < 4 * src_count {
            return Err(RtpEngineError::MalformedPacket(
                "BYE too small for its source count".to_string(),
            ));
        }
        let mut sender_ssrc = 0;
        let mut csrcs = Vec::new();
        if src_count > 0 {
            sender_ssrc = read_u32(payload, 0);
            for i in 1..src_count {
                csrcs.push(read_u32(payload, 4 * i));
            }
        }
        let mut reason = None;
        if payload.len() > 4 * src_count {
            let reason_len = payload[4 * src_count] as usize;
            if payload.len() - 4 * src_count < 1 + reason_len {
                return Err(RtpEngineError::MalformedPacket(
                    "BYE reason overruns the packet".to_string(),
                ));
            }
            reason = Some(
                String::from_utf8_lossy(
                    &payload[4 * src_count + 1..4 * src_count + 1 + reason_len],
                )
                .into_owned(),
            );
        }
        Ok(Bye {
            sender_ssrc,
            csrcs,
            reason,
        })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        if self.csrcs.len() > 0x1F - 1 {
            return Err(RtpEngineError::Oversized(
                "too many CSRCs for a BYE packet".to_string(),
            ));
        }
        if let Some(reason) = &self.reason {
            if reason.len() > 0xFF {
                return Err(RtpEngineError::Oversized(
                    "BYE reason longer than 255 bytes".to_string(),
                ));
            }
        }
        let length = self.block_length();
        put_header(
            buf,
            (1 + self.csrcs.len()) as u8,
            PT_BYE,
            (length - RTCP_HEADER_LEN) / 4,
        );
        buf.put_u32(self.sender_ssrc);
        for &csrc in &self.csrcs {
            buf.put_u32(csrc);
        }
        if let Some(reason) = &self.reason {
            buf.put_u8(reason.len() as u8);
            buf.put_slice(reason.as_bytes());
            let written = RTCP_HEADER_LEN + 4 * (1 + self.csrcs.len()) + 1 + reason.len();
            for _ in 0..length - written {
                buf.put_u8(0);
            }
        }
        Ok(())
    }
}

/// RTCP application-defined packet (RFC 3550 section 6.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    /// 5-bit subtype, carried in the count/format field
    pub sub_type: u8,
    pub sender_ssrc: u32,
    /// Four ASCII characters naming the application
    pub name: [u8; 4],
    /// Application data, 32-bit aligned
    pub data: Bytes,
}

impl App {
    pub fn new(sub_type: u8, sender_ssrc: u32, name: [u8; 4], data: Bytes) -> RtpEngineResult<Self> {
        if sub_type > 0x1F {
            return Err(RtpEngineError::InvalidConfiguration(
                "APP subtype exceeds 5 bits".to_string(),
            ));
        }
        if data.len() % 4 != 0 {
            return Err(RtpEngineError::MalformedPacket(
                "APP data must be 32-bit aligned".to_string(),
            ));
        }
        Ok(App {
            sub_type,
            sender_ssrc,
            name,
            data,
        })
    }

    pub fn block_length(&self) -> usize {
        RTCP_HEADER_LEN + APP_BASE_LEN + self.data.len()
    }

    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let payload = header.payload;
        if payload.len() < APP_BASE_LEN {
            return Err(RtpEngineError::MalformedPacket(
                "APP packet too small".to_string(),
            ));
        }
        if payload.len() % 4 != 0 {
            return Err(RtpEngineError::MalformedPacket(
                "APP payload must be 32-bit aligned".to_string(),
            ));
        }
        // Copy the data region only when it is actually present.
        let data = if payload.len() > APP_BASE_LEN {
            Bytes::copy_from_slice(&payload[APP_BASE_LEN..])
        } else {
            Bytes::new()
        };
        Ok(App {
            sub_type: header.count_or_format,
            sender_ssrc: read_u32(payload, 0),
            name: [payload[4], payload[5], payload[6], payload[7]],
            data,
        })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        if self.data.len() % 4 != 0 {
            return Err(RtpEngineError::MalformedPacket(
                "APP data must be 32-bit aligned".to_string(),
            ));
        }
        put_header(
            buf,
            self.sub_type,
            PT_APP,
            (self.block_length() - RTCP_HEADER_LEN) / 4,
        );
        buf.put_u32(self.sender_ssrc);
        buf.put_slice(&self.name);
        buf.put_slice(&self.data);
        Ok(())
    }
}

/// RFC 4585 generic NACK (transport-layer feedback, FMT = 1)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Nack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    /// The requested sequence numbers, in the order they were set
    pub packet_ids: Vec<u16>,
}

impl Nack {
    pub fn block_length(&self) -> usize {
        RTCP_HEADER_LEN + FEEDBACK_COMMON_LEN + self.packed_items().len() * NACK_ITEM_LEN
    }

    /// Greedy PID/BLP packing: each item anchors a PID and covers the 16
    /// following sequence numbers through its bitmask.
    fn packed_items(&self) -> Vec<(u16, u16)> {
        let mut items = Vec::new();
        let mut iter = self.packet_ids.iter().peekable();
        while let Some(&first_pid) = iter.next() {
            let mut bitmask = 0u16;
            while let Some(&&next) = iter.peek() {
                if next < first_pid {
                    break;
                }
                let shift = next.wrapping_sub(first_pid).wrapping_sub(1);
                if shift <= 15 {
                    bitmask |= 1 << shift;
                    iter.next();
                } else {
                    break;
                }
            }
            items.push((first_pid, bitmask));
        }
        items
    }

    fn parse(header: &RtcpCommonHeader<'_>) -> RtpEngineResult<Self> {
        let payload = header.payload;
        if payload.len() < FEEDBACK_COMMON_LEN + NACK_ITEM_LEN {
            return Err(RtpEngineError::MalformedPacket(
                "NACK carries no FCI items".to_string(),
            ));
        }
        let item_count = (payload.len() - FEEDBACK_COMMON_LEN) / NACK_ITEM_LEN;
        let mut packet_ids = Vec::new();
        for i in 0..item_count {
            let at = FEEDBACK_COMMON_LEN + i * NACK_ITEM_LEN;
            let pid = u16::from_be_bytes([payload[at], payload[at + 1]]);
            let bitmask = u16::from_be_bytes([payload[at + 2], payload[at + 3]]);
            packet_ids.push(pid);
            let mut mask = bitmask;
            let mut next = pid.wrapping_add(1);
            while mask != 0 {
                if mask & 1 != 0 {
                    packet_ids.push(next);
                }
                mask >>= 1;
                next = next.wrapping_add(1);
            }
        }
        Ok(Nack {
            sender_ssrc: read_u32(payload, 0),
            media_ssrc: read_u32(payload, 4),
            packet_ids,
        })
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        let items = self.packed_items();
        if items.is_empty() {
            return Err(RtpEngineError::MalformedPacket(
                "a NACK needs at least one sequence number".to_string(),
            ));
        }
        put_header(
            buf,
            FMT_GENERIC_NACK,
            PT_RTPFB,
            (FEEDBACK_COMMON_LEN + items.len() * NACK_ITEM_LEN) / 4,
        );
        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        for (pid, bitmask) in items {
            buf.put_u16(pid);
            buf.put_u16(bitmask);
        }
        Ok(())
    }
}

/// Any RTCP packet this engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    Sdes(Sdes),
    Bye(Bye),
    App(App),
    Nack(Nack),
}

impl RtcpPacket {
    pub fn block_length(&self) -> usize {
        match self {
            RtcpPacket::SenderReport(p) => p.block_length(),
            RtcpPacket::ReceiverReport(p) => p.block_length(),
            RtcpPacket::Sdes(p) => p.block_length(),
            RtcpPacket::Bye(p) => p.block_length(),
            RtcpPacket::App(p) => p.block_length(),
            RtcpPacket::Nack(p) => p.block_length(),
        }
    }

    fn serialize(&self, buf: &mut BytesMut) -> RtpEngineResult<()> {
        match self {
            RtcpPacket::SenderReport(p) => p.serialize(buf),
            RtcpPacket::ReceiverReport(p) => p.serialize(buf),
            RtcpPacket::Sdes(p) => p.serialize(buf),
            RtcpPacket::Bye(p) => p.serialize(buf),
            RtcpPacket::App(p) => p.serialize(buf),
            RtcpPacket::Nack(p) => p.serialize(buf),
        }
    }
}

/// Parse a compound RTCP buffer into its sub-packets.
///
/// Unknown packet types are skipped; a sub-packet whose body fails to parse
/// is logged and skipped, but a broken common header fails the whole
/// compound since the framing is lost.
pub fn parse_compound(buffer: &[u8]) -> RtpEngineResult<Vec<RtcpPacket>> {
    let mut packets = Vec::new();
    let mut rest = buffer;
    while !rest.is_empty() {
        let (header, next) = RtcpCommonHeader::parse(rest)?;
        let parsed = match header.packet_type {
            PT_SENDER_REPORT => SenderReport::parse(&header).map(RtcpPacket::SenderReport),
            PT_RECEIVER_REPORT => {
                ReceiverReport::parse(&header).map(RtcpPacket::ReceiverReport)
            }
            PT_SDES => Sdes::parse(&header).map(RtcpPacket::Sdes),
            PT_BYE => Bye::parse(&header).map(RtcpPacket::Bye),
            PT_APP => App::parse(&header).map(RtcpPacket::App),
            PT_RTPFB if header.count_or_format == FMT_GENERIC_NACK => {
                Nack::parse(&header).map(RtcpPacket::Nack)
            }
            _ => {
                rest = next;
                continue;
            }
        };
        match parsed {
            Ok(packet) => packets.push(packet),
            Err(err) => {
                warn!(packet_type = header.packet_type, %err, "dropping unparseable RTCP sub-packet");
            }
        }
        rest = next;
    }
    Ok(packets)
}

/// Serialize a compound packet: sub-packet serializations back to back,
/// no overall padding.
pub fn serialize_compound(packets: &[RtcpPacket]) -> RtpEngineResult<BytesMut> {
    let total: usize = packets.iter().map(|p| p.block_length()).sum();
    let mut buf = BytesMut::with_capacity(total);
    for packet in packets {
        packet.serialize(&mut buf)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report_block() -> ReportBlock {
        ReportBlock {
            source_ssrc: 0x0000_000A,
            fraction_lost: 7,
            cumulative_lost: 42,
            extended_highest_seq: 500,
            jitter: 1234,
            last_sr: 0xABCD_0000,
            delay_since_last_sr: 65536,
        }
    }

    #[test]
    fn test_sender_report_round_trip() {
        let sr = SenderReport {
            sender_ssrc: 0xB,
            ntp: NtpTime::new(0x0123_4567_89AB_CDEF),
            rtp_timestamp: 0x1111_2222,
            sender_packet_count: 10,
            sender_octet_count: 1000,
            report_blocks: vec![sample_report_block()],
        };
        let wire = serialize_compound(&[RtcpPacket::SenderReport(sr.clone())]).unwrap();
        assert_eq!(wire.len(), 28 + 24);
        let parsed = parse_compound(&wire).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::SenderReport(sr)]);
    }

    #[test]
    fn test_receiver_report_round_trip() {
        let rr = ReceiverReport {
            sender_ssrc: 0xA,
            report_blocks: vec![sample_report_block()],
        };
        let wire = serialize_compound(&[RtcpPacket::ReceiverReport(rr.clone())]).unwrap();
        let parsed = parse_compound(&wire).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::ReceiverReport(rr)]);
    }

    #[test]
    fn test_negative_cumulative_lost_survives() {
        let mut block = sample_report_block();
        block.cumulative_lost = -5;
        let rr = ReceiverReport {
            sender_ssrc: 1,
            report_blocks: vec![block],
        };
        let wire = serialize_compound(&[RtcpPacket::ReceiverReport(rr.clone())]).unwrap();
        match &parse_compound(&wire).unwrap()[0] {
            RtcpPacket::ReceiverReport(parsed) => {
                assert_eq!(parsed.report_blocks[0].cumulative_lost, -5)
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_sdes_round_trip_and_alignment() {
        let mut sdes = Sdes::default();
        sdes.add_cname(77, "endpoint@example".to_string()).unwrap();
        let wire = serialize_compound(&[RtcpPacket::Sdes(sdes.clone())]).unwrap();
        assert_eq!(wire.len() % 4, 0);
        let parsed = parse_compound(&wire).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::Sdes(sdes)]);
    }

    #[test]
    fn test_sdes_skips_unknown_items() {
        // Chunk with a NOTE item (7) before the CNAME, terminator, padding.
        let mut buf = BytesMut::new();
        let items = [
            7u8, 2, b'h', b'i', // NOTE
            1, 4, b'n', b'a', b'm', b'e', // CNAME
            0,
        ];
        let chunk_len = 4 + items.len();
        let padded = (chunk_len + 3) & !3;
        put_header(&mut buf, 1, PT_SDES, padded / 4);
        buf.put_u32(99);
        buf.put_slice(&items);
        for _ in 0..padded - chunk_len {
            buf.put_u8(0);
        }
        let parsed = parse_compound(&buf).unwrap();
        match &parsed[0] {
            RtcpPacket::Sdes(sdes) => {
                assert_eq!(sdes.chunks.len(), 1);
                assert_eq!(sdes.chunks[0].ssrc, 99);
                assert_eq!(sdes.chunks[0].cname, "name");
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_bye_round_trip_with_reason() {
        let bye = Bye {
            sender_ssrc: 0xB,
            csrcs: vec![0xC],
            reason: Some("shutting down".to_string()),
        };
        let wire = serialize_compound(&[RtcpPacket::Bye(bye.clone())]).unwrap();
        assert_eq!(wire.len() % 4, 0);
        let parsed = parse_compound(&wire).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::Bye(bye)]);
    }

    #[test]
    fn test_app_round_trip() {
        let app = App::new(3, 5, *b"qos0", Bytes::from_static(&[1, 2, 3, 4])).unwrap();
        let wire = serialize_compound(&[RtcpPacket::App(app.clone())]).unwrap();
        let parsed = parse_compound(&wire).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::App(app)]);
    }

    #[test]
    fn test_app_rejects_unaligned_data() {
        assert!(App::new(0, 1, *b"name", Bytes::from_static(&[1, 2, 3])).is_err());
    }

    #[test]
    fn test_nack_packs_consecutive_ids_into_one_item() {
        let nack = Nack {
            sender_ssrc: 0xA,
            media_ssrc: 0xB,
            packet_ids: vec![100, 101, 103, 116],
        };
        let items = nack.packed_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, 100);
        // 101 -> bit 0, 103 -> bit 2, 116 -> bit 15
        assert_eq!(items[0].1, 0b1000_0000_0000_0101);
    }

    #[test]
    fn test_nack_round_trip_unpacks_ascending() {
        let nack = Nack {
            sender_ssrc: 0xA,
            media_ssrc: 0xB,
            packet_ids: vec![100, 101, 103, 130],
        };
        let wire = serialize_compound(&[RtcpPacket::Nack(nack)]).unwrap();
        match &parse_compound(&wire).unwrap()[0] {
            RtcpPacket::Nack(parsed) => {
                assert_eq!(parsed.packet_ids, vec![100, 101, 103, 130]);
                assert_eq!(parsed.sender_ssrc, 0xA);
                assert_eq!(parsed.media_ssrc, 0xB);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_compound_of_three_round_trips() {
        let sr = RtcpPacket::SenderReport(SenderReport {
            sender_ssrc: 1,
            ntp: NtpTime::new(99),
            rtp_timestamp: 2,
            sender_packet_count: 3,
            sender_octet_count: 4,
            report_blocks: vec![],
        });
        let mut sdes = Sdes::default();
        sdes.add_cname(1, "cname".to_string()).unwrap();
        let bye = RtcpPacket::Bye(Bye {
            sender_ssrc: 1,
            csrcs: vec![],
            reason: None,
        });
        let compound = vec![sr, RtcpPacket::Sdes(sdes), bye];
        let wire = serialize_compound(&compound).unwrap();
        assert_eq!(parse_compound(&wire).unwrap(), compound);
    }

    #[test]
    fn test_unknown_packet_type_skipped() {
        let mut buf = BytesMut::new();
        put_header(&mut buf, 0, 207, 1); // XR, not handled
        buf.put_u32(0xAABB_CCDD);
        let rr = ReceiverReport {
            sender_ssrc: 9,
            report_blocks: vec![],
        };
        let mut tail = BytesMut::new();
        rr.serialize(&mut tail).unwrap();
        buf.extend_from_slice(&tail);
        let parsed = parse_compound(&buf).unwrap();
        assert_eq!(parsed, vec![RtcpPacket::ReceiverReport(rr)]);
    }

    #[test]
    fn test_truncated_compound_fails() {
        let mut buf = BytesMut::new();
        put_header(&mut buf, 0, PT_RECEIVER_REPORT, 10);
        buf.put_u32(1);
        assert!(parse_compound(&buf).is_err());
    }

    #[test]
    fn test_report_block_count_limit() {
        let rr = ReceiverReport {
            sender_ssrc: 1,
            report_blocks: vec![ReportBlock::default(); 32],
        };
        assert!(matches!(
            serialize_compound(&[RtcpPacket::ReceiverReport(rr)]),
            Err(RtpEngineError::Oversized(_))
        ));
    }
}
