//! RTCP send side of a media session
//!
//! Assembles the periodic SR/RR + SDES compound (with an optional BYE or
//! generic-NACK tail) and paces it on the protocol worker's delayed queue:
//! the first tick fires at half the report interval, every later one a full
//! interval apart.
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


use crate::clock::unix_time_millis;
use crate::config::MediaDirection;
use crate::error::RtpEngineResult;
use crate::rtcp::{
    Bye, Nack, RtcpPacket, ReceiverReport, ReportBlock, Sdes, SenderReport,
};
use crate::rtp_sender::LocalSenderInfo;
use crate::transceiver::RtpRtcpTransceiver;
use crate::worker::Worker;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// RTCP sender configuration.
#[derive(Debug, Clone)]
pub struct RtcpSenderConfig {
    pub local_ssrc: u32,
    pub remote_ssrc: u32,
    pub cname: String,
    pub rtcp_report_interval_ms: u64,
    pub direction: MediaDirection,
}

/// Receiver-side view of the remote sender, used to fill a report block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteSenderInfo {
    pub remote_ssrc: u32,
    pub cumulative_loss: u32,
    pub extended_highest_seq: u32,
    pub first_extended_seq: u32,
    pub interarrival_jitter: u32,
    pub lsr: u32,
    pub dlsr: u32,
}

/// State the RTCP sender pulls from its media session on every emission.
pub trait RtcpContext: Send + Sync {
    fn has_sent_rtp(&self) -> bool;
    fn has_received_rtp(&self) -> bool;
    fn has_received_bye(&self) -> bool;
    fn local_sender_info(&self) -> Option<LocalSenderInfo>;
    fn remote_sender_info(&self) -> Option<RemoteSenderInfo>;
}

struct SenderState {
    next_send_ms: u64,
    has_sent_rtp: bool,
    has_received_rtp: bool,
    has_sent_rtcp: bool,
    has_sent_bye: bool,
    last_report: RemoteSenderInfo,
}

enum CompoundTail {
    Bye,
    Nack(Vec<u16>),
}

/// RTCP sender for one media session.
pub struct RtcpSender {
    config: RtcpSenderConfig,
    worker: Worker,
    transceiver: RtpRtcpTransceiver,
    context: Weak<dyn RtcpContext>,
    state: Mutex<SenderState>,
}

impl RtcpSender {
    pub fn new(
        config: RtcpSenderConfig,
        worker: Worker,
        transceiver: RtpRtcpTransceiver,
        context: Weak<dyn RtcpContext>,
    ) -> Self {
        RtcpSender {
            config,
            worker,
            transceiver,
            context,
            state: Mutex::new(SenderState {
                next_send_ms: 0,
                has_sent_rtp: false,
                has_received_rtp: false,
                has_sent_rtcp: false,
                has_sent_bye: false,
                last_report: RemoteSenderInfo::default(),
            }),
        }
    }

    /// Schedule the first report at half the configured interval.
    pub fn start(self: &Arc<Self>) {
        let first_delay = self.config.rtcp_report_interval_ms / 2;
        {
            let mut state = self.state.lock().expect("rtcp sender state poisoned");
            state.next_send_ms = unix_time_millis() + first_delay;
        }
        self.schedule(first_delay);
    }

    fn schedule(self: &Arc<Self>, delay_ms: u64) {
        let weak = Arc::downgrade(self);
        self.worker.push_delayed(delay_ms, move || {
            if let Some(sender) = weak.upgrade() {
                sender.on_tick();
            }
        });
    }

    fn on_tick(self: &Arc<Self>) {
        let now_ms = unix_time_millis();
        {
            let mut state = self.state.lock().expect("rtcp sender state poisoned");
            if state.has_sent_bye || self.peer_said_bye() {
                debug!(ssrc = self.config.local_ssrc, "rtcp scheduling stops after bye");
                return;
            }
            if now_ms < state.next_send_ms {
                let remaining = state.next_send_ms - now_ms;
                drop(state);
                self.schedule(remaining);
                return;
            }
            self.build_and_send(&mut state, None);
            state.next_send_ms = now_ms + self.config.rtcp_report_interval_ms;
        }
        self.schedule(self.config.rtcp_report_interval_ms);
    }

    /// Emit a compound with a generic-NACK tail; pushes the next scheduled
    /// report a full interval out. Suppressed once either side said BYE.
    pub fn send_nack(&self, seqs: &[u16]) {
        if seqs.is_empty() {
            return;
        }
        let mut state = self.state.lock().expect("rtcp sender state poisoned");
        if state.has_sent_bye || self.peer_said_bye() {
            return;
        }
        debug!(?seqs, "sending nack");
        let mut sorted = seqs.to_vec();
        sorted.sort_unstable();
        self.build_and_send(&mut state, Some(CompoundTail::Nack(sorted)));
        state.next_send_ms = unix_time_millis() + self.config.rtcp_report_interval_ms;
    }

    /// Emit a compound with a BYE tail and stop all further scheduling.
    pub fn send_bye(&self) {
        let mut state = self.state.lock().expect("rtcp sender state poisoned");
        self.build_and_send(&mut state, Some(CompoundTail::Bye));
        state.has_sent_bye = true;
    }

    pub fn has_sent_bye(&self) -> bool {
        self.state
            .lock()
            .expect("rtcp sender state poisoned")
            .has_sent_bye
    }

    fn peer_said_bye(&self) -> bool {
        self.context
            .upgrade()
            .map(|ctx| ctx.has_received_bye())
            .unwrap_or(true)
    }

    fn build_and_send(&self, state: &mut SenderState, tail: Option<CompoundTail>) {
        let Some(context) = self.context.upgrade() else {
            return;
        };
        if self.config.direction != MediaDirection::RecvOnly && !state.has_sent_rtp {
            state.has_sent_rtp = context.has_sent_rtp();
        }
        if self.config.direction != MediaDirection::SendOnly && !state.has_received_rtp {
            state.has_received_rtp = context.has_received_rtp();
        }

        let mut report_blocks = Vec::new();
        if state.has_received_rtp {
            if let Some(remote) = context.remote_sender_info() {
                report_blocks.push(self.build_report_block(state, &remote));
                state.last_report = remote;
            }
        }

        let mut packets = Vec::new();
        match state.has_sent_rtp.then(|| context.local_sender_info()).flatten() {
            Some(local) => packets.push(RtcpPacket::SenderReport(SenderReport {
                sender_ssrc: self.config.local_ssrc,
                ntp: local.ntp_now,
                rtp_timestamp: local.rtp_timestamp,
                sender_packet_count: local.packet_count,
                sender_octet_count: local.octet_count,
                report_blocks,
            })),
            None => packets.push(RtcpPacket::ReceiverReport(ReceiverReport {
                sender_ssrc: self.config.local_ssrc,
                report_blocks,
            })),
        }

        let mut sdes = Sdes::default();
        if let Err(err) = sdes.add_cname(self.config.local_ssrc, self.config.cname.clone()) {
            warn!(%err, "dropping cname from rtcp compound");
        }
        packets.push(RtcpPacket::Sdes(sdes));

        let mut is_bye = false;
        match tail {
            Some(CompoundTail::Bye) => {
                is_bye = true;
                packets.push(RtcpPacket::Bye(Bye {
                    sender_ssrc: self.config.local_ssrc,
                    csrcs: vec![],
                    reason: None,
                }));
            }
            Some(CompoundTail::Nack(seqs)) => {
                packets.push(RtcpPacket::Nack(Nack {
                    sender_ssrc: self.config.local_ssrc,
                    media_ssrc: self.config.remote_ssrc,
                    packet_ids: seqs,
                }));
            }
            None => {}
        }

        state.has_sent_rtcp = true;
        self.transceiver.send_rtcp(&packets, is_bye);
    }

    fn build_report_block(
        &self,
        state: &SenderState,
        remote: &RemoteSenderInfo,
    ) -> ReportBlock {
        let mut block = ReportBlock {
            source_ssrc: remote.remote_ssrc,
            extended_highest_seq: remote.extended_highest_seq,
            jitter: remote.interarrival_jitter,
            last_sr: remote.lsr,
            delay_since_last_sr: remote.dlsr,
            ..Default::default()
        };
        if let Err(err) = block.set_cumulative_lost(remote.cumulative_loss as i32) {
            warn!(%err, "cumulative loss does not fit the report block");
        }

        let (expected_since, lost_since) = if state.has_sent_rtcp {
            (
                remote
                    .extended_highest_seq
                    .wrapping_sub(state.last_report.extended_highest_seq) as i64,
                remote.cumulative_loss as i64 - state.last_report.cumulative_loss as i64,
            )
        } else {
            (
                remote
                    .extended_highest_seq
                    .wrapping_sub(remote.first_extended_seq) as i64,
                remote.cumulative_loss as i64,
            )
        };
        block.fraction_lost = if expected_since == 0 || lost_since <= 0 {
            0
        } else {
            ((lost_since << 8) / expected_since) as u8
        };
        block
    }

    /// Exercise one emission without waiting on the scheduler; used by the
    /// session teardown path and tests.
    pub(crate) fn emit_now(&self) -> RtpEngineResult<()> {
        let mut state = self.state.lock().expect("rtcp sender state poisoned");
        self.build_and_send(&mut state, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transceiver::TransceiverCommand;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeContext {
        sent: AtomicBool,
        received: AtomicBool,
        bye: AtomicBool,
        remote: Mutex<RemoteSenderInfo>,
    }

    impl FakeContext {
        fn new() -> Arc<Self> {
            Arc::new(FakeContext {
                sent: AtomicBool::new(false),
                received: AtomicBool::new(false),
                bye: AtomicBool::new(false),
                remote: Mutex::new(RemoteSenderInfo::default()),
            })
        }
    }

    impl RtcpContext for FakeContext {
        fn has_sent_rtp(&self) -> bool {
            self.sent.load(Ordering::SeqCst)
        }
        fn has_received_rtp(&self) -> bool {
            self.received.load(Ordering::SeqCst)
        }
        fn has_received_bye(&self) -> bool {
            self.bye.load(Ordering::SeqCst)
        }
        fn local_sender_info(&self) -> Option<LocalSenderInfo> {
            Some(LocalSenderInfo {
                ntp_now: crate::clock::ntp_time_now(),
                rtp_timestamp: 1234,
                packet_count: 10,
                octet_count: 999,
            })
        }
        fn remote_sender_info(&self) -> Option<RemoteSenderInfo> {
            Some(*self.remote.lock().unwrap())
        }
    }

    fn sender_with(
        context: &Arc<FakeContext>,
        worker: &Worker,
    ) -> (Arc<RtcpSender>, tokio::sync::mpsc::UnboundedReceiver<TransceiverCommand>) {
        let (transceiver, rx) = RtpRtcpTransceiver::detached();
        let ctx: Weak<FakeContext> = Arc::downgrade(context);
        let sender = Arc::new(RtcpSender::new(
            RtcpSenderConfig {
                local_ssrc: 0xA,
                remote_ssrc: 0xB,
                cname: "unit@test".to_string(),
                rtcp_report_interval_ms: 40,
                direction: MediaDirection::SendRecv,
            },
            worker.clone(),
            transceiver,
            ctx as Weak<dyn RtcpContext>,
        ));
        (sender, rx)
    }

    fn compound_of(command: TransceiverCommand) -> (Vec<RtcpPacket>, bool) {
        match command {
            TransceiverCommand::Send(datagram) => (
                crate::rtcp::parse_compound(&datagram.buffer).unwrap(),
                datagram.is_bye,
            ),
            TransceiverCommand::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[tokio::test]
    async fn test_first_report_is_rr_with_sdes() {
        let context = FakeContext::new();
        let worker = Worker::spawn("rtcp-rr");
        let (sender, mut rx) = sender_with(&context, &worker);
        sender.emit_now().unwrap();
        let (packets, is_bye) = compound_of(rx.recv().await.unwrap());
        assert!(!is_bye);
        assert!(matches!(packets[0], RtcpPacket::ReceiverReport(_)));
        match &packets[1] {
            RtcpPacket::Sdes(sdes) => assert_eq!(sdes.chunks[0].cname, "unit@test"),
            other => panic!("expected sdes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sr_with_report_block_after_traffic() {
        let context = FakeContext::new();
        context.sent.store(true, Ordering::SeqCst);
        context.received.store(true, Ordering::SeqCst);
        *context.remote.lock().unwrap() = RemoteSenderInfo {
            remote_ssrc: 0xB,
            cumulative_loss: 4,
            extended_highest_seq: 200,
            first_extended_seq: 100,
            interarrival_jitter: 7,
            lsr: 0x1111_2222,
            dlsr: 333,
        };
        let worker = Worker::spawn("rtcp-sr");
        let (sender, mut rx) = sender_with(&context, &worker);
        sender.emit_now().unwrap();
        let (packets, _) = compound_of(rx.recv().await.unwrap());
        match &packets[0] {
            RtcpPacket::SenderReport(sr) => {
                assert_eq!(sr.sender_ssrc, 0xA);
                assert_eq!(sr.rtp_timestamp, 1234);
                assert_eq!(sr.sender_packet_count, 10);
                let block = &sr.report_blocks[0];
                assert_eq!(block.source_ssrc, 0xB);
                assert_eq!(block.cumulative_lost, 4);
                assert_eq!(block.extended_highest_seq, 200);
                assert_eq!(block.jitter, 7);
                assert_eq!(block.last_sr, 0x1111_2222);
                assert_eq!(block.delay_since_last_sr, 333);
                // First report: 4 lost out of 100 expected.
                assert_eq!(block.fraction_lost, ((4i64 << 8) / 100) as u8);
            }
            other => panic!("expected sender report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fraction_lost_uses_deltas_between_reports() {
        let context = FakeContext::new();
        context.received.store(true, Ordering::SeqCst);
        *context.remote.lock().unwrap() = RemoteSenderInfo {
            remote_ssrc: 0xB,
            cumulative_loss: 10,
            extended_highest_seq: 100,
            first_extended_seq: 0,
            ..Default::default()
        };
        let worker = Worker::spawn("rtcp-frac");
        let (sender, mut rx) = sender_with(&context, &worker);
        sender.emit_now().unwrap();
        let _ = rx.recv().await.unwrap();

        // 28 newly lost out of 128 newly expected = 56/256.
        *context.remote.lock().unwrap() = RemoteSenderInfo {
            remote_ssrc: 0xB,
            cumulative_loss: 38,
            extended_highest_seq: 228,
            first_extended_seq: 0,
            ..Default::default()
        };
        sender.emit_now().unwrap();
        let (packets, _) = compound_of(rx.recv().await.unwrap());
        match &packets[0] {
            RtcpPacket::ReceiverReport(rr) => {
                assert_eq!(rr.report_blocks[0].fraction_lost, 56);
            }
            other => panic!("expected receiver report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scheduled_ticks_emit_until_bye() {
        let context = FakeContext::new();
        let worker = Worker::spawn("rtcp-tick");
        let (sender, mut rx) = sender_with(&context, &worker);
        sender.start();
        // First tick at interval/2 = 20 ms.
        let first = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            rx.recv(),
        )
        .await
        .expect("no scheduled rtcp emission")
        .unwrap();
        let (_, is_bye) = compound_of(first);
        assert!(!is_bye);

        sender.send_bye();
        let (packets, is_bye) = compound_of(rx.recv().await.unwrap());
        assert!(is_bye);
        assert!(matches!(packets.last(), Some(RtcpPacket::Bye(_))));
        assert!(sender.has_sent_bye());

        // No further scheduled traffic after the BYE.
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_nack_tail_and_suppression_after_peer_bye() {
        let context = FakeContext::new();
        let worker = Worker::spawn("rtcp-nack");
        let (sender, mut rx) = sender_with(&context, &worker);
        sender.send_nack(&[104]);
        let (packets, _) = compound_of(rx.recv().await.unwrap());
        match packets.last().unwrap() {
            RtcpPacket::Nack(nack) => {
                assert_eq!(nack.sender_ssrc, 0xA);
                assert_eq!(nack.media_ssrc, 0xB);
                assert_eq!(nack.packet_ids, vec![104]);
            }
            other => panic!("expected nack, got {:?}", other),
        }

        context.bye.store(true, Ordering::SeqCst);
        sender.send_nack(&[105]);
        assert!(rx.try_recv().is_err(), "nack after peer bye must be suppressed");
    }
}
