//! RTP send path: outbound bookkeeping and RFC 4588 retransmission
//!
//! Sent packets whose payload type has an RTX mapping are kept in a sliding
//! window keyed by sequence number; a received NACK turns cache hits into
//! retransmission packets on a separate SSRC/payload type.
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


use crate::clock::{ntp_time_now, unix_time_millis, NtpTime};
use crate::config::RtxConfig;
use crate::error::{RtpEngineError, RtpEngineResult};
use crate::rtp_packet::RtpPacket;
use crate::seq::is_seq_before_in_range;
use bytes::{BufMut, BytesMut};
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// RTP sender configuration.
#[derive(Debug, Clone)]
pub struct RtpSenderConfig {
    pub local_ssrc: u32,
    pub clock_rate_hz: u32,
    pub payload_types: Vec<u8>,
    pub rtx: Option<RtxConfig>,
}

/// Snapshot of the local sender state for SR assembly.
#[derive(Debug, Clone, Copy)]
pub struct LocalSenderInfo {
    pub ntp_now: NtpTime,
    /// RTP timestamp extrapolated to "now" from the first sent packet
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

/// Sliding retransmission cache, ordered by send time (ascending seq).
pub(crate) struct RtpSenderPacketCache {
    max_cache_seq_difference: u16,
    cached: VecDeque<RtpPacket>,
}

impl RtpSenderPacketCache {
    pub(crate) fn new(max_cache_seq_difference: u16) -> Self {
        RtpSenderPacketCache {
            max_cache_seq_difference,
            cached: VecDeque::new(),
        }
    }

    /// Insert a packet, dropping everything no longer within the window
    /// behind it.
    pub(crate) fn insert(&mut self, packet: RtpPacket) {
        while let Some(front) = self.cached.front() {
            if is_seq_before_in_range(
                front.sequence_number(),
                packet.sequence_number(),
                self.max_cache_seq_difference,
            ) {
                break;
            }
            self.cached.pop_front();
        }
        self.cached.push_back(packet);
    }

    pub(crate) fn get(&self, seq: u16) -> Option<&RtpPacket> {
        self.cached.iter().find(|p| p.sequence_number() == seq)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cached.len()
    }
}

/// RTP sender for one media session.
pub struct RtpSender {
    config: RtpSenderConfig,
    cache: Option<RtpSenderPacketCache>,
    has_sent: bool,
    last_seq: u16,
    first_send_unix_ms: u64,
    first_rtp_timestamp: u32,
    packet_count: u32,
    octet_count: u32,
    rtx_has_sent: bool,
    rtx_last_seq: u16,
}

impl RtpSender {
    pub fn new(config: RtpSenderConfig) -> RtpEngineResult<Self> {
        if let Some(rtx) = &config.rtx {
            rtx.validate()?;
        }
        let cache = config
            .rtx
            .as_ref()
            .map(|rtx| RtpSenderPacketCache::new(rtx.max_cache_seq_difference));
        Ok(RtpSender {
            config,
            cache,
            has_sent: false,
            last_seq: 0,
            first_send_unix_ms: 0,
            first_rtp_timestamp: 0,
            packet_count: 0,
            octet_count: 0,
            rtx_has_sent: false,
            rtx_last_seq: 0,
        })
    }

    /// Account for an outgoing packet and hand it back for transmission.
    ///
    /// The packet must carry the configured SSRC, a configured payload type
    /// and the sequence number following the previous send.
    pub fn send_rtp(&mut self, packet: RtpPacket) -> RtpEngineResult<RtpPacket> {
        if packet.ssrc() != self.config.local_ssrc {
            return Err(RtpEngineError::UnexpectedSsrc(packet.ssrc()));
        }
        if !self.config.payload_types.contains(&packet.payload_type()) {
            return Err(RtpEngineError::UnexpectedPayloadType(packet.payload_type()));
        }
        let seq = packet.sequence_number();
        if self.has_sent && seq != self.last_seq.wrapping_add(1) {
            return Err(RtpEngineError::MalformedPacket(format!(
                "sequence number {} does not follow {}",
                seq, self.last_seq
            )));
        }

        if let (Some(rtx), Some(cache)) = (&self.config.rtx, &mut self.cache) {
            if rtx.rtx_for(packet.payload_type()).is_some() {
                cache.insert(packet.clone());
            }
        }

        if !self.has_sent {
            self.first_send_unix_ms = unix_time_millis();
            self.first_rtp_timestamp = packet.timestamp();
        }
        self.packet_count = self.packet_count.wrapping_add(1);
        self.octet_count = self.octet_count.wrapping_add(packet.payload.len() as u32);
        self.last_seq = seq;
        self.has_sent = true;
        Ok(packet)
    }

    /// Build retransmission packets for the requested sequence numbers.
    /// Sequence numbers no longer cached are skipped.
    pub fn build_rtx(&mut self, seqs: &[u16]) -> Vec<RtpPacket> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };
        debug!(?seqs, "building rtx for nacked sequence numbers");
        let cached: Vec<RtpPacket> = seqs
            .iter()
            .filter_map(|&seq| cache.get(seq).cloned())
            .collect();
        cached
            .into_iter()
            .filter_map(|packet| self.construct_rtx(&packet))
            .collect()
    }

    fn construct_rtx(&mut self, packet: &RtpPacket) -> Option<RtpPacket> {
        let (rtx_ssrc, rtx_pt) = {
            let rtx = self.config.rtx.as_ref()?;
            match rtx.rtx_for(packet.payload_type()) {
                Some(rtx_pt) => (rtx.ssrc, rtx_pt),
                None => {
                    warn!(
                        payload_type = packet.payload_type(),
                        "no rtx payload type for cached packet"
                    );
                    return None;
                }
            }
        };

        // RFC 4588: the retransmission payload is the original sequence
        // number followed by the original payload.
        let mut payload = BytesMut::with_capacity(2 + packet.payload.len());
        payload.put_u16(packet.sequence_number());
        payload.put_slice(&packet.payload);

        if !self.rtx_has_sent {
            self.rtx_last_seq = rand::thread_rng().gen();
        }
        let rtx_seq = self.rtx_last_seq.wrapping_add(u16::from(self.rtx_has_sent));

        let mut header = packet.header.clone();
        header.payload_type = rtx_pt;
        header.sequence_number = rtx_seq;
        header.ssrc = rtx_ssrc;
        let rtx_packet = match RtpPacket::new(header, payload.freeze(), packet.pad_size) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "failed to construct rtx packet");
                return None;
            }
        };
        self.rtx_has_sent = true;
        self.rtx_last_seq = rtx_seq;
        Some(rtx_packet)
    }

    /// Sender statistics for SR assembly; `None` before the first send.
    pub fn sender_info(&self) -> Option<LocalSenderInfo> {
        if !self.has_sent {
            return None;
        }
        let elapsed_ms = unix_time_millis().saturating_sub(self.first_send_unix_ms);
        let advance =
            (elapsed_ms as f64 * self.config.clock_rate_hz as f64 / 1000.0) as u32;
        Some(LocalSenderInfo {
            ntp_now: ntp_time_now(),
            rtp_timestamp: self.first_rtp_timestamp.wrapping_add(advance),
            packet_count: self.packet_count,
            octet_count: self.octet_count,
        })
    }

    pub fn has_sent_rtp(&self) -> bool {
        self.has_sent
    }
}
