//! RTP receive path: reordering cache, loss bookkeeping, NACK candidates
//!
//! Received packets wait in a wrap-aware ordered cache until they are
//! contiguous with the output cursor or their deadline passes. Gaps become
//! loss records that feed the generic-NACK machinery; retransmissions are
//! unwrapped back into media packets before entering the cache.
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


use crate::config::RtxConfig;
use crate::error::{RtpEngineError, RtpEngineResult};
use crate::rtp_packet::RtpPacket;
use crate::seq::{is_next_seq, is_seq_after};
use bytes::Bytes;
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Renotification interval for already-NACKed sequence numbers.
const NACK_RENOTIFY_INTERVAL_MS: u64 = 50;

/// RTP receiver configuration.
#[derive(Debug, Clone)]
pub struct RtpReceiverConfig {
    pub remote_ssrc: u32,
    pub clock_rate_hz: u32,
    pub payload_types: Vec<u8>,
    /// How long a packet may wait for its predecessors before release
    pub max_cache_duration_ms: u64,
    pub rtx: Option<RtxConfig>,
}

/// Receiver statistics snapshot for RTCP report blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtpReceiverStats {
    pub remote_ssrc: u32,
    pub first_extended_seq: u32,
    pub extended_highest_seq: u32,
    pub cumulative_loss: u32,
    pub interarrival_jitter: u32,
}

/// What one received packet produced: in-order releases and fresh NACK
/// candidates.
#[derive(Debug, Default)]
pub struct ReceiverOutput {
    pub released: Vec<RtpPacket>,
    pub nack_seqs: Vec<u16>,
}

struct CachedRtpPacket {
    packet: RtpPacket,
    deadline_ms: u64,
}

struct LossRecord {
    seq: u16,
    notified: bool,
    last_notify_ms: u64,
}

/// Ordered receive cache with loss tracking and timed release.
pub(crate) struct RtpReceiverPacketCache {
    max_cache_duration_ms: u64,
    cached: VecDeque<CachedRtpPacket>,
    /// Missing sequence numbers between cached packets, ascending
    loss_records: Vec<LossRecord>,
    has_released: bool,
    cursor: u16,
    has_cached: bool,
    extended_first_seq: u32,
    extended_highest_seq: u32,
}

impl RtpReceiverPacketCache {
    pub(crate) fn new(max_cache_duration_ms: u64) -> Self {
        RtpReceiverPacketCache {
            max_cache_duration_ms,
            cached: VecDeque::new(),
            loss_records: Vec::new(),
            has_released: false,
            cursor: 0,
            has_cached: false,
            extended_first_seq: 0,
            extended_highest_seq: 0,
        }
    }

    pub(crate) fn extended_first_seq(&self) -> u32 {
        self.extended_first_seq
    }

    pub(crate) fn extended_highest_seq(&self) -> u32 {
        self.extended_highest_seq
    }

    /// Insert a packet in wrap-aware order. Duplicates and packets at or
    /// behind the output cursor are dropped silently.
    pub(crate) fn insert(&mut self, packet: RtpPacket, now_ms: u64) {
        let seq = packet.sequence_number();
        if self.has_released && !is_seq_after(self.cursor, seq) {
            trace!(seq, "dropping late packet behind the output cursor");
            return;
        }
        if self.has_cached {
            let mut wraps = self.extended_highest_seq >> 16;
            let highest = (self.extended_highest_seq & 0xFFFF) as u16;
            if is_seq_after(highest, seq) {
                if seq < highest {
                    wraps += 1;
                }
                self.extended_highest_seq = (wraps << 16) | seq as u32;
            }
            if wraps == 0 && (seq as u32) < self.extended_first_seq {
                self.extended_first_seq = seq as u32;
            }
        } else {
            self.extended_highest_seq = seq as u32;
            self.extended_first_seq = seq as u32;
        }

        let deadline_ms = now_ms + self.max_cache_duration_ms;
        let entry = CachedRtpPacket {
            packet,
            deadline_ms,
        };
        let mut insert_at = self.cached.len();
        let mut duplicate = false;
        for (i, cached) in self.cached.iter().enumerate() {
            if cached.packet.sequence_number() == seq {
                duplicate = true;
                break;
            }
            if is_seq_after(cached.packet.sequence_number(), seq) {
                // seq still sorts after this entry.
                continue;
            }
            insert_at = i;
            break;
        }
        if duplicate {
            trace!(seq, "dropping duplicate packet");
            return;
        }
        self.cached.insert(insert_at, entry);
        self.has_cached = true;
        if let Some(at) = self.loss_records.iter().position(|r| r.seq == seq) {
            self.loss_records.remove(at);
            debug!(seq, "previously lost packet arrived");
        }
        self.rebuild_loss_records();
    }

    /// Recompute the loss records from the gaps between cached packets,
    /// bounded below by the output cursor. Notification state of existing
    /// records is preserved.
    fn rebuild_loss_records(&mut self) {
        let old: HashMap<u16, (bool, u64)> = self
            .loss_records
            .iter()
            .map(|r| (r.seq, (r.notified, r.last_notify_ms)))
            .collect();
        let mut records = Vec::new();
        let mut prev: Option<u16> = if self.has_released {
            Some(self.cursor)
        } else {
            None
        };
        for entry in &self.cached {
            let seq = entry.packet.sequence_number();
            if let Some(prev_seq) = prev {
                if !is_next_seq(prev_seq, seq) {
                    let mut missing = prev_seq.wrapping_add(1);
                    while missing != seq {
                        match old.get(&missing) {
                            Some(&(notified, last_notify_ms)) => records.push(LossRecord {
                                seq: missing,
                                notified,
                                last_notify_ms,
                            }),
                            None => records.push(LossRecord {
                                seq: missing,
                                notified: false,
                                last_notify_ms: 0,
                            }),
                        }
                        missing = missing.wrapping_add(1);
                    }
                }
            }
            prev = Some(seq);
        }
        self.loss_records = records;
    }

    /// Sequence numbers to NACK now: every record not yet notified, plus
    /// records whose renotify interval has elapsed. Newest first.
    pub(crate) fn poll_nack(&mut self, now_ms: u64) -> Vec<u16> {
        let mut seqs = Vec::new();
        for record in self.loss_records.iter_mut().rev() {
            if !record.notified {
                record.notified = true;
                record.last_notify_ms = now_ms;
                seqs.push(record.seq);
            } else if record.last_notify_ms + NACK_RENOTIFY_INTERVAL_MS <= now_ms {
                record.last_notify_ms = now_ms;
                seqs.push(record.seq);
            }
        }
        seqs
    }

    /// Release the head of the cache while it is either past its deadline
    /// or the direct successor of the output cursor. Output is ascending;
    /// the cursor advances to the largest released seq.
    pub(crate) fn release(&mut self, now_ms: u64) -> Vec<RtpPacket> {
        let mut released = Vec::new();
        while let Some(front) = self.cached.front() {
            let ready = front.deadline_ms <= now_ms
                || (self.has_released
                    && is_next_seq(self.cursor, front.packet.sequence_number()));
            if !ready {
                break;
            }
            let entry = self.cached.pop_front().expect("front exists");
            self.cursor = entry.packet.sequence_number();
            self.has_released = true;
            released.push(entry.packet);
        }
        if !released.is_empty() {
            // Gaps jumped over by a deadline release are lost for good.
            let cursor = self.cursor;
            self.loss_records
                .retain(|record| is_seq_after(cursor, record.seq));
        }
        released
    }
}

/// RTP receiver for one media session.
pub struct RtpReceiver {
    config: RtpReceiverConfig,
    cache: RtpReceiverPacketCache,
    stats: RtpReceiverStats,
    has_received: bool,
    jitter: i32,
    last_rtp_timestamp: u32,
    last_arrival_ms: u64,
    received_count: u64,
}

impl RtpReceiver {
    pub fn new(config: RtpReceiverConfig) -> RtpEngineResult<Self> {
        if let Some(rtx) = &config.rtx {
            rtx.validate()?;
        }
        let cache = RtpReceiverPacketCache::new(config.max_cache_duration_ms);
        let stats = RtpReceiverStats {
            remote_ssrc: config.remote_ssrc,
            ..Default::default()
        };
        Ok(RtpReceiver {
            config,
            cache,
            stats,
            has_received: false,
            jitter: 0,
            last_rtp_timestamp: 0,
            last_arrival_ms: 0,
            received_count: 0,
        })
    }

    /// Whether a datagram carrying this SSRC belongs to this receiver.
    pub fn is_expected_remote_ssrc(&self, ssrc: u32) -> bool {
        if ssrc == self.config.remote_ssrc {
            return true;
        }
        matches!(&self.config.rtx, Some(rtx) if rtx.ssrc == ssrc)
    }

    /// Process one received packet: unwrap RTX, update statistics, cache,
    /// and collect NACK candidates plus in-order releases.
    pub fn on_rtp_packet(
        &mut self,
        packet: RtpPacket,
        now_ms: u64,
    ) -> RtpEngineResult<ReceiverOutput> {
        let packet = match &self.config.rtx {
            Some(rtx) if packet.ssrc() == rtx.ssrc => self.reconstruct_from_rtx(packet)?,
            _ => packet,
        };
        if packet.ssrc() != self.config.remote_ssrc {
            return Err(RtpEngineError::UnexpectedSsrc(packet.ssrc()));
        }
        if !self.config.payload_types.contains(&packet.payload_type()) {
            return Err(RtpEngineError::UnexpectedPayloadType(packet.payload_type()));
        }

        // RFC 3550 interarrival jitter, in RTP timestamp units.
        if self.has_received {
            let duration_ms = now_ms.wrapping_sub(self.last_arrival_ms) as i64;
            let duration_ts =
                packet.timestamp() as i64 - self.last_rtp_timestamp as i64;
            let expected_ts = duration_ms as f64 * self.config.clock_rate_hz as f64 / 1000.0;
            let d = (duration_ts as f64 - expected_ts).abs() as i32;
            self.jitter += (d - self.jitter) / 16;
        } else {
            self.jitter = 0;
        }
        self.last_arrival_ms = now_ms;
        self.last_rtp_timestamp = packet.timestamp();

        self.cache.insert(packet, now_ms);
        self.received_count += 1;
        self.has_received = true;
        self.stats.first_extended_seq = self.cache.extended_first_seq();
        self.stats.extended_highest_seq = self.cache.extended_highest_seq();
        let expected =
            (self.stats.extended_highest_seq - self.stats.first_extended_seq + 1) as i64;
        let loss = expected - self.received_count as i64;
        self.stats.cumulative_loss = loss.max(0) as u32;
        self.stats.interarrival_jitter = self.jitter.max(0) as u32;

        Ok(ReceiverOutput {
            nack_seqs: self.cache.poll_nack(now_ms),
            released: self.cache.release(now_ms),
        })
    }

    /// Timer-driven sweep: renotify stale loss records and release packets
    /// whose deadline passed while no traffic was arriving.
    pub fn poll(&mut self, now_ms: u64) -> ReceiverOutput {
        ReceiverOutput {
            nack_seqs: self.cache.poll_nack(now_ms),
            released: self.cache.release(now_ms),
        }
    }

    fn reconstruct_from_rtx(&self, packet: RtpPacket) -> RtpEngineResult<RtpPacket> {
        let rtx = self.config.rtx.as_ref().expect("caller checked rtx");
        let Some(associated_pt) = rtx.associated_for(packet.payload_type()) else {
            return Err(RtpEngineError::UnexpectedPayloadType(packet.payload_type()));
        };
        if packet.payload.len() <= 2 {
            return Err(RtpEngineError::MalformedPacket(
                "rtx payload must be larger than the seq prefix".to_string(),
            ));
        }
        let seq = u16::from_be_bytes([packet.payload[0], packet.payload[1]]);
        let payload = Bytes::copy_from_slice(&packet.payload[2..]);
        let mut header = packet.header.clone();
        header.payload_type = associated_pt;
        header.sequence_number = seq;
        header.ssrc = self.config.remote_ssrc;
        let rebuilt = RtpPacket::new(header, payload, 0)?;
        debug!(
            seq,
            rtx_seq = packet.sequence_number(),
            "reconstructed media packet from rtx"
        );
        Ok(rebuilt)
    }

    pub fn statistics(&self) -> Option<RtpReceiverStats> {
        self.has_received.then_some(self.stats)
    }

    pub fn has_received_rtp(&self) -> bool {
        self.has_received
    }
}
