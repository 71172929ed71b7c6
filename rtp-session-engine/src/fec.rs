//! ULP-FEC (RFC 5109) encoder and decoder
//!
//! XOR-based forward error correction over bit-masked groups of RTP
//! packets. The encoder builds FEC packets from a run of contiguous media
//! packets; the decoder keeps a sequence-number window of received packets
//! and rebuilds a missing packet whenever a FEC row has exactly one
//! protected packet unaccounted for.
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
use crate::fec_tables::{
    BURSTY_TABLE_MAX_MEDIA, PACKET_MASKS_BURSTY, PACKET_MASKS_RANDOM, TABLE_MAX_MEDIA,
};
use crate::rtp_packet::{RtpHeader, RtpPacket, MAX_PAYLOAD_TYPE, RTP_FIXED_HEADER_LEN};
use crate::seq::{is_next_seq, is_seq_after, is_seq_before, is_seq_before_in_range, seq_diff};
use bytes::Bytes;
use tracing::{debug, error};

/// Maximum number of media packets one FEC group may protect.
pub const ULPFEC_MAX_MEDIA_PACKETS: usize = 48;
/// FEC level-0 header size.
pub const ULPFEC_HEADER_LEN: usize = 10;
/// Packet mask size with the L bit clear / set.
const MASK_SIZE_SMALL: usize = 2;
const MASK_SIZE_LARGE: usize = 6;

/// Which pre-tabulated mask profile to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecMaskType {
    Random,
    Bursty,
}

/// How FEC packets beyond the importance allocation protect the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportantProtectionMode {
    /// No preference; treated as `Overlap`
    None,
    /// Remaining FEC rows cover only the non-important packets
    NoOverlap,
    /// Remaining FEC rows cover the whole group
    Overlap,
    /// Like `Overlap`, with every remaining row also covering packet 0
    BiasFirstPacket,
}

/// Mask width in bytes for a group of `num_packets`.
fn packet_mask_size(num_packets: usize) -> usize {
    if num_packets > MASK_SIZE_SMALL * 8 {
        MASK_SIZE_LARGE
    } else {
        MASK_SIZE_SMALL
    }
}

/// `round(num_media * protection_factor / 256)`, at least 1 while any
/// protection is requested.
pub fn num_fec_packets(num_media: usize, protection_factor: u8) -> usize {
    let num_fec = (num_media * protection_factor as usize + (1 << 7)) >> 8;
    if protection_factor > 0 && num_fec == 0 {
        return 1;
    }
    num_fec
}

fn mask_get(mask: &[u8], row_size: usize, row: usize, col: usize) -> bool {
    (mask[row * row_size + col / 8] & (0x80 >> (col % 8))) != 0
}

fn mask_set(mask: &mut [u8], row_size: usize, row: usize, col: usize) {
    mask[row * row_size + col / 8] |= 0x80 >> (col % 8);
}

/// A mask for `num_fec` rows over `num_media` columns at `row_size` bytes
/// per row: table lookup for small groups, interleaved otherwise.
fn mask_for(
    num_media: usize,
    num_fec: usize,
    mask_type: FecMaskType,
    row_size: usize,
) -> Vec<u8> {
    let mut mask = vec![0u8; num_fec * row_size];
    if num_media <= TABLE_MAX_MEDIA {
        let table = match mask_type {
            FecMaskType::Bursty if num_media <= BURSTY_TABLE_MAX_MEDIA => &PACKET_MASKS_BURSTY,
            _ => &PACKET_MASKS_RANDOM,
        };
        let rows = table[num_media - 1][num_fec - 1];
        for row in 0..num_fec {
            for byte in 0..MASK_SIZE_SMALL.min(row_size) {
                mask[row * row_size + byte] = rows[row * MASK_SIZE_SMALL + byte];
            }
        }
        return mask;
    }
    // Interleaved: media packet i is protected by FEC row i % num_fec.
    for row in 0..num_fec {
        for col in 0..num_media {
            if col % num_fec == row {
                mask_set(&mut mask, row_size, row, col);
            }
        }
    }
    mask
}

/// How many FEC rows to reserve for the important prefix of the group.
fn protection_allocation(num_media: usize, num_fec: usize, num_important: usize) -> usize {
    let max_for_important = num_fec / 2;
    let mut allocated = num_important.min(max_for_important);
    // Fall back to equal protection for a single FEC packet over a group
    // dominated by unimportant packets.
    if num_fec == 1 && num_media > 2 * num_important {
        allocated = 0;
    }
    allocated
}

/// Generate the full `num_fec x row_size` packet mask.
fn generate_packet_masks(
    num_media: usize,
    num_fec: usize,
    num_important: usize,
    mode: ImportantProtectionMode,
    mask_type: FecMaskType,
    row_size: usize,
) -> Vec<u8> {
    if num_important == 0 {
        return mask_for(num_media, num_fec, mask_type, row_size);
    }
    let mode = if mode == ImportantProtectionMode::None {
        ImportantProtectionMode::Overlap
    } else {
        mode
    };
    let mut mask = vec![0u8; num_fec * row_size];
    let num_fec_important = if mode == ImportantProtectionMode::BiasFirstPacket {
        0
    } else {
        protection_allocation(num_media, num_fec, num_important)
    };
    let num_fec_remaining = num_fec - num_fec_important;

    if num_fec_important > 0 {
        let sub_row_size = packet_mask_size(num_important);
        let sub = mask_for(num_important, num_fec_important, mask_type, sub_row_size);
        for row in 0..num_fec_important {
            for byte in 0..sub_row_size.min(row_size) {
                mask[row * row_size + byte] = sub[row * sub_row_size + byte];
            }
        }
    }

    if num_fec_remaining > 0 {
        match mode {
            ImportantProtectionMode::NoOverlap => {
                let sub_media = num_media - num_fec_important;
                let sub_row_size = packet_mask_size(sub_media);
                let sub = mask_for(sub_media, num_fec_remaining, mask_type, sub_row_size);
                for row in 0..num_fec_remaining {
                    for col in 0..sub_media {
                        if mask_get(&sub, sub_row_size, row, col) {
                            mask_set(
                                &mut mask,
                                row_size,
                                num_fec_important + row,
                                col + num_fec_important,
                            );
                        }
                    }
                }
            }
            ImportantProtectionMode::Overlap | ImportantProtectionMode::BiasFirstPacket => {
                let sub = mask_for(num_media, num_fec_remaining, mask_type, row_size);
                for row in 0..num_fec_remaining {
                    let dst = (num_fec_important + row) * row_size;
                    mask[dst..dst + row_size]
                        .copy_from_slice(&sub[row * row_size..(row + 1) * row_size]);
                }
                if mode == ImportantProtectionMode::BiasFirstPacket {
                    for row in 0..num_fec_remaining {
                        mask[(num_fec_important + row) * row_size] |= 0x80;
                    }
                }
            }
            ImportantProtectionMode::None => unreachable!(),
        }
    }
    mask
}

/// FEC encoder configuration: where FEC packets come from on the wire.
#[derive(Debug, Clone)]
pub struct FecEncoderConfig {
    /// SSRC the protected media uses (and the FEC packets are stamped with)
    pub ssrc: u32,
    /// Payload type marking a packet as FEC
    pub payload_type: u8,
}

/// ULP-FEC encoder
pub struct UlpFecEncoder {
    config: FecEncoderConfig,
}

impl UlpFecEncoder {
    pub fn new(config: FecEncoderConfig) -> RtpEngineResult<Self> {
        if config.payload_type > MAX_PAYLOAD_TYPE {
            return Err(RtpEngineError::InvalidConfiguration(format!(
                "FEC payload type {} exceeds 7 bits",
                config.payload_type
            )));
        }
        Ok(UlpFecEncoder { config })
    }

    /// Generate FEC packets for a run of media packets.
    ///
    /// The media packets must share the configured SSRC and carry
    /// continuously increasing sequence numbers. The returned FEC packets
    /// have sequence number and timestamp zero; the caller assigns real
    /// values before sending.
    pub fn encode(
        &self,
        media_packets: &[RtpPacket],
        num_important: usize,
        mode: ImportantProtectionMode,
        protection_factor: u8,
        mask_type: FecMaskType,
    ) -> RtpEngineResult<Vec<RtpPacket>> {
        if media_packets.is_empty() {
            return Err(RtpEngineError::InvalidConfiguration(
                "no media packets to protect".to_string(),
            ));
        }
        if media_packets.len() > ULPFEC_MAX_MEDIA_PACKETS {
            return Err(RtpEngineError::Oversized(format!(
                "{} media packets exceed the {}-packet FEC group limit",
                media_packets.len(),
                ULPFEC_MAX_MEDIA_PACKETS
            )));
        }
        if num_important > media_packets.len() {
            return Err(RtpEngineError::InvalidConfiguration(
                "num_important exceeds the group size".to_string(),
            ));
        }
        let mut last_seq = 0u16;
        for (i, packet) in media_packets.iter().enumerate() {
            if packet.ssrc() != self.config.ssrc {
                return Err(RtpEngineError::UnexpectedSsrc(packet.ssrc()));
            }
            if i > 0 && !is_next_seq(last_seq, packet.sequence_number()) {
                return Err(RtpEngineError::InvalidConfiguration(
                    "media sequence numbers must be continuously increasing".to_string(),
                ));
            }
            last_seq = packet.sequence_number();
        }

        let buffers: Vec<Vec<u8>> =
            media_packets.iter().map(|p| p.serialize().to_vec()).collect();
        let num_media = media_packets.len();
        let num_fec = num_fec_packets(num_media, protection_factor);
        if num_fec == 0 {
            return Ok(Vec::new());
        }
        let row_size = packet_mask_size(num_media);
        let mask = generate_packet_masks(
            num_media,
            num_fec,
            num_important,
            mode,
            mask_type,
            row_size,
        );

        let mut fec_packets = Vec::with_capacity(num_fec);
        for row in 0..num_fec {
            let mut group = Vec::new();
            let mut max_payload_len = 0usize;
            for col in 0..row_size * 8 {
                if col < num_media && mask_get(&mask, row_size, row, col) {
                    max_payload_len =
                        max_payload_len.max(buffers[col].len() - RTP_FIXED_HEADER_LEN);
                    group.push(col);
                }
            }
            if group.is_empty() {
                continue;
            }
            fec_packets.push(self.build_fec_packet(media_packets, &buffers, &group, max_payload_len)?);
        }
        Ok(fec_packets)
    }

    fn build_fec_packet(
        &self,
        media_packets: &[RtpPacket],
        buffers: &[Vec<u8>],
        group: &[usize],
        max_payload_len: usize,
    ) -> RtpEngineResult<RtpPacket> {
        let seq_base = media_packets[group[0]].sequence_number();
        let seq_end = media_packets[*group.last().unwrap()].sequence_number();
        let span = seq_diff(seq_base, seq_end) as usize;
        let long_mask = MASK_SIZE_SMALL * 8 < span + 1;
        let mask_size = if long_mask {
            MASK_SIZE_LARGE
        } else {
            MASK_SIZE_SMALL
        };

        let mut payload = vec![0u8; ULPFEC_HEADER_LEN + 2 + mask_size + max_payload_len];
        let (level0, level1) = payload.split_at_mut(ULPFEC_HEADER_LEN);
        level1[..2].copy_from_slice(&(max_payload_len as u16).to_be_bytes());
        let (level1_header, fec_payload) = level1.split_at_mut(2 + mask_size);
        let mask = &mut level1_header[2..];

        for &index in group {
            let buffer = &buffers[index];
            let media_payload = &buffer[RTP_FIXED_HEADER_LEN..];
            // Flags, marker and payload type.
            level0[0] ^= buffer[0];
            level0[1] ^= buffer[1];
            // Timestamp.
            for i in 4..8 {
                level0[i] ^= buffer[i];
            }
            // Length recovery.
            let len_bytes = (media_payload.len() as u16).to_be_bytes();
            level0[8] ^= len_bytes[0];
            level0[9] ^= len_bytes[1];
            for (dst, src) in fec_payload.iter_mut().zip(media_payload.iter()) {
                *dst ^= src;
            }
            let offset =
                seq_diff(seq_base, media_packets[index].sequence_number()) as usize;
            mask[offset / 8] |= 0x80 >> (offset % 8);
        }

        let base_bytes = seq_base.to_be_bytes();
        level0[2] ^= base_bytes[0];
        level0[3] ^= base_bytes[1];
        // Version bits are synthesized on recovery; the L bit marks the
        // 6-byte mask.
        level0[0] &= 0x3F;
        if long_mask {
            level0[0] |= 0x40;
        }

        RtpPacket::new(
            RtpHeader {
                marker: false,
                payload_type: self.config.payload_type,
                sequence_number: 0,
                timestamp: 0,
                ssrc: self.config.ssrc,
                csrcs: vec![],
                extension: None,
            },
            Bytes::from(payload),
            0,
        )
    }
}

/// FEC decoder configuration.
#[derive(Debug, Clone)]
pub struct FecDecoderConfig {
    /// Cache window: packets older than `newest - max_cache_seq_difference`
    /// are released
    pub max_cache_seq_difference: u16,
    /// SSRC of the protected stream; recovered packets are stamped with it
    pub ssrc: u32,
    /// Payload type marking a packet as FEC
    pub payload_type: u8,
}

struct FecInfo {
    invalid: bool,
    /// Protected sequence numbers, ascending from the SN base
    protected: Vec<u16>,
}

struct CachedPacket {
    packet: RtpPacket,
    buffer: Vec<u8>,
    fec: Option<FecInfo>,
}

impl CachedPacket {
    fn new(packet: RtpPacket, fec_payload_type: u8) -> Option<Self> {
        let buffer = packet.serialize().to_vec();
        let fec = if packet.payload_type() == fec_payload_type {
            Some(Self::decode_fec_info(&buffer)?)
        } else {
            None
        };
        Some(CachedPacket {
            packet,
            buffer,
            fec,
        })
    }

    fn decode_fec_info(buffer: &[u8]) -> Option<FecInfo> {
        let payload = &buffer[RTP_FIXED_HEADER_LEN..];
        if payload.len() < ULPFEC_HEADER_LEN + 2 + MASK_SIZE_SMALL {
            return None;
        }
        let long_mask = payload[0] & 0x40 != 0;
        let mask_size = if long_mask {
            MASK_SIZE_LARGE
        } else {
            MASK_SIZE_SMALL
        };
        if payload.len() < ULPFEC_HEADER_LEN + 2 + mask_size {
            return None;
        }
        let seq_base = u16::from_be_bytes([payload[2], payload[3]]);
        let mask = &payload[ULPFEC_HEADER_LEN + 2..ULPFEC_HEADER_LEN + 2 + mask_size];
        let mut protected = Vec::new();
        for (byte_index, &byte) in mask.iter().enumerate() {
            for bit_index in 0..8 {
                if byte & (0x80 >> bit_index) != 0 {
                    protected.push(seq_base.wrapping_add((8 * byte_index + bit_index) as u16));
                }
            }
        }
        Some(FecInfo {
            invalid: false,
            protected,
        })
    }

    fn seq(&self) -> u16 {
        self.packet.sequence_number()
    }
}

/// ULP-FEC decoder with an ordered, seq-windowed packet cache.
pub struct UlpFecDecoder {
    config: FecDecoderConfig,
    cached: Vec<CachedPacket>,
    has_output: bool,
    seq_last_output: u16,
}

impl UlpFecDecoder {
    pub fn new(config: FecDecoderConfig) -> RtpEngineResult<Self> {
        if config.payload_type > MAX_PAYLOAD_TYPE {
            return Err(RtpEngineError::InvalidConfiguration(format!(
                "FEC payload type {} exceeds 7 bits",
                config.payload_type
            )));
        }
        if config.max_cache_seq_difference == 0
            || config.max_cache_seq_difference > crate::seq::SEQ_HALF_RANGE
        {
            return Err(RtpEngineError::InvalidConfiguration(
                "fec cache window must be within half the sequence space".to_string(),
            ));
        }
        Ok(UlpFecDecoder {
            config,
            cached: Vec::new(),
            has_output: false,
            seq_last_output: 0,
        })
    }

    /// Feed received packets (media and FEC alike); returns everything that
    /// is ready to leave the reordering window, in ascending order, with
    /// recovered packets spliced in.
    pub fn decode(&mut self, received: Vec<RtpPacket>) -> Vec<RtpPacket> {
        self.cache_packets(received);
        if self.cached.is_empty() {
            return Vec::new();
        }
        self.recover_packets();

        let mut output: Vec<RtpPacket> = Vec::new();
        let latest_seq = self.cached.last().map(|c| c.seq()).unwrap_or_default();
        let window = self.config.max_cache_seq_difference;

        // Release everything that has fallen out of the window.
        while let Some(front) = self.cached.first() {
            if front.seq() == latest_seq
                || is_seq_before_in_range(front.seq(), latest_seq, window)
            {
                break;
            }
            let entry = self.cached.remove(0);
            if !self.has_output || is_seq_after(self.seq_last_output, entry.seq()) {
                output.push(entry.packet);
            }
        }

        // Then the head-ready run: the cursor's successor, chained while
        // contiguous.
        loop {
            let ready = match self.cached.first() {
                None => false,
                Some(front) => match output.last() {
                    Some(last) => is_next_seq(last.sequence_number(), front.seq()),
                    None => {
                        self.has_output && is_next_seq(self.seq_last_output, front.seq())
                    }
                },
            };
            if !ready {
                break;
            }
            output.push(self.cached.remove(0).packet);
        }

        if let Some(last) = output.last() {
            self.has_output = true;
            self.seq_last_output = last.sequence_number();
        }
        output
    }

    /// Drain the whole cache in ascending order.
    pub fn flush(&mut self) -> Vec<RtpPacket> {
        let packets: Vec<RtpPacket> =
            self.cached.drain(..).map(|entry| entry.packet).collect();
        if let Some(last) = packets.last() {
            self.has_output = true;
            self.seq_last_output = last.sequence_number();
        }
        packets
    }

    fn cache_packets(&mut self, received: Vec<RtpPacket>) {
        for packet in received {
            if packet.ssrc() != self.config.ssrc {
                continue;
            }
            if self.has_output && is_seq_after(packet.sequence_number(), self.seq_last_output) {
                // Arrived behind the output cursor.
                continue;
            }
            let seq = packet.sequence_number();
            let mut insert_at = self.cached.len();
            let mut duplicate = false;
            for (i, entry) in self.cached.iter().enumerate() {
                if entry.seq() == seq {
                    duplicate = true;
                    break;
                }
                if is_seq_before(seq, entry.seq()) {
                    insert_at = i;
                    break;
                }
            }
            if duplicate {
                continue;
            }
            match CachedPacket::new(packet, self.config.payload_type) {
                Some(entry) => self.cached.insert(insert_at, entry),
                None => debug!("dropping malformed FEC packet"),
            }
        }
    }

    fn recover_packets(&mut self) {
        let latest_seq = match self.cached.last() {
            Some(entry) => entry.seq(),
            None => return,
        };
        // Inserting a recovered packet shifts positions, so FEC rows are
        // remembered by seq and looked up again each round.
        let fec_seqs: Vec<u16> = self
            .cached
            .iter()
            .filter(|c| c.fec.is_some())
            .map(|c| c.seq())
            .collect();

        for fec_seq in fec_seqs {
            let Some(fec_pos) = self.cached.iter().position(|c| c.seq() == fec_seq) else {
                continue;
            };
            let info = match &self.cached[fec_pos].fec {
                Some(info) if !info.invalid => info,
                _ => continue,
            };

            let mut valid = true;
            let mut mark_invalid = false;
            let mut missing = Vec::new();
            let mut sources = Vec::new();
            for &seq in &info.protected {
                if self.has_output && !is_seq_after(self.seq_last_output, seq) {
                    // Already at or behind the cursor; this row can never
                    // recover anything again.
                    valid = false;
                    mark_invalid = true;
                    break;
                }
                if is_seq_after(latest_seq, seq) {
                    // Not all protected packets can have arrived yet.
                    valid = false;
                    break;
                }
                match self.cached.iter().position(|c| c.seq() == seq) {
                    Some(at) => sources.push(at),
                    None => missing.push(seq),
                }
            }
            if mark_invalid {
                if let Some(info) = &mut self.cached[fec_pos].fec {
                    info.invalid = true;
                }
            }
            if !valid || missing.len() != 1 {
                continue;
            }
            let seq_to_recover = missing[0];
            if (self.has_output && is_seq_before(seq_to_recover, self.seq_last_output))
                || is_seq_after(latest_seq, seq_to_recover)
            {
                continue;
            }

            let Some(recovered) = self.recover_packet(fec_pos, seq_to_recover, &sources) else {
                continue;
            };
            debug!(seq = seq_to_recover, fec_seq, "recovered packet from FEC");
            let mut insert_at = self.cached.len();
            let mut duplicate = false;
            for (i, entry) in self.cached.iter().enumerate() {
                if entry.seq() == seq_to_recover {
                    duplicate = true;
                    break;
                }
                if is_seq_before(seq_to_recover, entry.seq()) {
                    insert_at = i;
                    break;
                }
            }
            if !duplicate {
                self.cached.insert(insert_at, recovered);
                let fec_pos = fec_pos + usize::from(insert_at <= fec_pos);
                if let Some(info) = &mut self.cached[fec_pos].fec {
                    info.invalid = true;
                }
            }
        }
    }

    fn recover_packet(
        &self,
        fec_pos: usize,
        seq_to_recover: u16,
        sources: &[usize],
    ) -> Option<CachedPacket> {
        let fec_entry = &self.cached[fec_pos];
        let fec_payload = &fec_entry.buffer[RTP_FIXED_HEADER_LEN..];
        let long_mask = fec_payload[0] & 0x40 != 0;
        let mask_size = if long_mask {
            MASK_SIZE_LARGE
        } else {
            MASK_SIZE_SMALL
        };
        let level1_payload_at = ULPFEC_HEADER_LEN + 2 + mask_size;
        if fec_payload.len() <= level1_payload_at {
            return None;
        }
        let protection_length =
            u16::from_be_bytes([fec_payload[ULPFEC_HEADER_LEN], fec_payload[ULPFEC_HEADER_LEN + 1]])
                as usize;
        if protection_length < fec_payload.len() - level1_payload_at {
            return None;
        }

        let mut buffer = vec![0u8; RTP_FIXED_HEADER_LEN + protection_length];
        buffer[..8].copy_from_slice(&fec_payload[..8]);
        let carried = (fec_payload.len() - level1_payload_at).min(protection_length);
        buffer[RTP_FIXED_HEADER_LEN..RTP_FIXED_HEADER_LEN + carried]
            .copy_from_slice(&fec_payload[level1_payload_at..level1_payload_at + carried]);
        let mut length_recovery = [fec_payload[8], fec_payload[9]];

        for &source in sources {
            let media = &self.cached[source].buffer;
            buffer[0] ^= media[0];
            buffer[1] ^= media[1];
            for i in 4..8 {
                buffer[i] ^= media[i];
            }
            let media_payload = &media[RTP_FIXED_HEADER_LEN..];
            if media_payload.is_empty() {
                continue;
            }
            let len_bytes = (media_payload.len() as u16).to_be_bytes();
            length_recovery[0] ^= len_bytes[0];
            length_recovery[1] ^= len_bytes[1];
            let xor_len = media_payload.len().min(protection_length);
            for i in 0..xor_len {
                buffer[RTP_FIXED_HEADER_LEN + i] ^= media_payload[i];
            }
        }

        buffer[8..12].copy_from_slice(&self.config.ssrc.to_be_bytes());
        buffer[2..4].copy_from_slice(&seq_to_recover.to_be_bytes());
        // Synthesize version 2 and clear the padding bit.
        buffer[0] = (buffer[0] & 0x1F) | 0x80;

        let recovered_len = u16::from_be_bytes(length_recovery) as usize;
        if recovered_len > protection_length {
            return None;
        }
        buffer.truncate(RTP_FIXED_HEADER_LEN + recovered_len);

        let packet = match RtpPacket::parse(&buffer) {
            Ok(packet) => packet,
            Err(err) => {
                error!(%err, "failed to rebuild an RTP packet from FEC");
                return None;
            }
        };
        if packet.payload.is_empty() {
            error!("FEC recovery produced an empty RTP payload");
            return None;
        }
        CachedPacket::new(packet, self.config.payload_type)
    }
}
