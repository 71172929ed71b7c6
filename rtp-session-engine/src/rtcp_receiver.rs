//! RTCP receive side of a media session
//!
//! Parses incoming compound packets, filters them against the configured
//! remote SSRC, tracks the last sender report for LSR/DLSR and latches the
//! peer's BYE.
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
use crate::rtcp::{parse_compound, RtcpPacket};
use std::sync::Mutex;
use tracing::{debug, warn};

/// RTCP receiver configuration.
#[derive(Debug, Clone)]
pub struct RtcpReceiverConfig {
    pub local_ssrc: u32,
    pub remote_ssrc: u32,
}

/// What one compound packet triggered.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RtcpReceiverOutput {
    /// The peer said goodbye; all of its later RTCP is ignored
    pub bye_received: bool,
    /// Sequence numbers the peer asked us to retransmit
    pub nack_seqs: Option<Vec<u16>>,
}

#[derive(Default)]
struct ReceiverState {
    has_received_bye: bool,
    has_received_sender_report: bool,
    last_sr_ntp: NtpTime,
    last_sr_arrival_ms: u64,
}

/// RTCP receiver for one media session.
pub struct RtcpReceiver {
    config: RtcpReceiverConfig,
    state: Mutex<ReceiverState>,
}

impl RtcpReceiver {
    pub fn new(config: RtcpReceiverConfig) -> Self {
        RtcpReceiver {
            config,
            state: Mutex::new(ReceiverState::default()),
        }
    }

    /// Parse one compound buffer. Sub-packets from any SSRC other than the
    /// configured remote are logged and skipped.
    pub fn on_rtcp_packet(&self, buffer: &[u8], now_ms: u64) -> RtcpReceiverOutput {
        let mut output = RtcpReceiverOutput::default();
        let mut state = self.state.lock().expect("rtcp receiver state poisoned");
        if state.has_received_bye {
            return output;
        }
        let packets = match parse_compound(buffer) {
            Ok(packets) => packets,
            Err(err) => {
                warn!(%err, "failed to parse rtcp compound");
                return output;
            }
        };
        for packet in packets {
            match packet {
                RtcpPacket::SenderReport(sr) => {
                    if sr.sender_ssrc != self.config.remote_ssrc {
                        warn!(ssrc = sr.sender_ssrc, "sender report from unexpected ssrc");
                        continue;
                    }
                    state.has_received_sender_report = true;
                    state.last_sr_ntp = sr.ntp;
                    state.last_sr_arrival_ms = now_ms;
                }
                RtcpPacket::ReceiverReport(rr) => {
                    if rr.sender_ssrc != self.config.remote_ssrc {
                        warn!(ssrc = rr.sender_ssrc, "receiver report from unexpected ssrc");
                        continue;
                    }
                    debug!(
                        blocks = rr.report_blocks.len(),
                        "receiver report from peer"
                    );
                }
                RtcpPacket::Sdes(sdes) => {
                    if !sdes
                        .chunks
                        .iter()
                        .any(|chunk| chunk.ssrc == self.config.remote_ssrc)
                    {
                        warn!("sdes without a chunk for the remote ssrc");
                    }
                }
                RtcpPacket::Bye(bye) => {
                    if bye.sender_ssrc != self.config.remote_ssrc {
                        warn!(ssrc = bye.sender_ssrc, "bye from unexpected ssrc");
                        continue;
                    }
                    state.has_received_bye = true;
                    output.bye_received = true;
                }
                RtcpPacket::Nack(nack) => {
                    if nack.sender_ssrc != self.config.remote_ssrc {
                        warn!(ssrc = nack.sender_ssrc, "nack from unexpected ssrc");
                        continue;
                    }
                    output.nack_seqs = Some(nack.packet_ids);
                }
                RtcpPacket::App(app) => {
                    if app.sender_ssrc != self.config.remote_ssrc {
                        warn!(ssrc = app.sender_ssrc, "app packet from unexpected ssrc");
                        continue;
                    }
                    debug!(name = ?app.name, "application-defined rtcp packet");
                }
            }
        }
        output
    }

    /// LSR (middle 32 bits of the last SR's NTP) and DLSR (elapsed time in
    /// 1/65536 s) for report-block assembly. Zeroes before the first SR.
    pub fn sr_info(&self, now_ms: u64) -> (u32, u32) {
        let state = self.state.lock().expect("rtcp receiver state poisoned");
        if !state.has_received_sender_report {
            return (0, 0);
        }
        let lsr = state.last_sr_ntp.middle_32();
        let dlsr = ((now_ms.saturating_sub(state.last_sr_arrival_ms)) << 16) / 1000;
        (lsr, dlsr as u32)
    }

    pub fn has_received_bye(&self) -> bool {
        self.state
            .lock()
            .expect("rtcp receiver state poisoned")
            .has_received_bye
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtcp::{serialize_compound, Bye, Nack, SenderReport};

    const LOCAL: u32 = 0xA;
    const REMOTE: u32 = 0xB;

    fn receiver() -> RtcpReceiver {
        RtcpReceiver::new(RtcpReceiverConfig {
            local_ssrc: LOCAL,
            remote_ssrc: REMOTE,
        })
    }

    fn sr_from(ssrc: u32, ntp: u64) -> Vec<u8> {
        serialize_compound(&[RtcpPacket::SenderReport(SenderReport {
            sender_ssrc: ssrc,
            ntp: NtpTime::new(ntp),
            rtp_timestamp: 0,
            sender_packet_count: 0,
            sender_octet_count: 0,
            report_blocks: vec![],
        })])
        .unwrap()
        .to_vec()
    }

    #[test]
    fn test_sr_updates_lsr_dlsr() {
        let rx = receiver();
        let ntp = NtpTime::from_parts(0x1122_3344, 0x5566_7788);
        let out = rx.on_rtcp_packet(&sr_from(REMOTE, ntp.as_u64()), 10_000);
        assert_eq!(out, RtcpReceiverOutput::default());

        let (lsr, dlsr) = rx.sr_info(10_500);
        assert_eq!(lsr, ntp.middle_32());
        // 500 ms expressed in 1/65536 seconds.
        assert_eq!(dlsr, ((500u64 << 16) / 1000) as u32);
    }

    #[test]
    fn test_sr_from_wrong_ssrc_ignored() {
        let rx = receiver();
        rx.on_rtcp_packet(&sr_from(0xDEAD, 42), 0);
        assert_eq!(rx.sr_info(100), (0, 0));
    }

    #[test]
    fn test_bye_latches_and_mutes() {
        let rx = receiver();
        let bye = serialize_compound(&[RtcpPacket::Bye(Bye {
            sender_ssrc: REMOTE,
            csrcs: vec![],
            reason: None,
        })])
        .unwrap();
        let out = rx.on_rtcp_packet(&bye, 0);
        assert!(out.bye_received);
        assert!(rx.has_received_bye());

        // Subsequent RTCP from the peer is ignored entirely.
        let out = rx.on_rtcp_packet(&sr_from(REMOTE, 42), 1);
        assert_eq!(out, RtcpReceiverOutput::default());
        assert_eq!(rx.sr_info(100), (0, 0));
    }

    #[test]
    fn test_nack_delivers_seq_list() {
        let rx = receiver();
        let nack = serialize_compound(&[RtcpPacket::Nack(Nack {
            sender_ssrc: REMOTE,
            media_ssrc: LOCAL,
            packet_ids: vec![104, 105, 110],
        })])
        .unwrap();
        let out = rx.on_rtcp_packet(&nack, 0);
        assert_eq!(out.nack_seqs, Some(vec![104, 105, 110]));
    }

    #[test]
    fn test_garbage_is_dropped() {
        let rx = receiver();
        let out = rx.on_rtcp_packet(&[0xFF, 0xFF, 0xFF], 0);
        assert_eq!(out, RtcpReceiverOutput::default());
    }
}
