//! One media session: a local/remote SSRC pair over the shared transport
//!
//! Wires the RTP sender, RTP receiver and the RTCP endpoint together under
//! the configured direction policy, registers with the router, and fires
//! the application callback on the signalling worker.
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
use crate::config::{MediaDirection, MediaSessionConfig};
use crate::error::{RtpEngineError, RtpEngineResult};
use crate::router::{RtcpRouterDst, RtpRouterDst, RtpRtcpRouter};
use crate::rtcp_receiver::{RtcpReceiver, RtcpReceiverConfig};
use crate::rtcp_sender::{RemoteSenderInfo, RtcpContext, RtcpSender, RtcpSenderConfig};
use crate::rtp_packet::RtpPacket;
use crate::rtp_receiver::{RtpReceiver, RtpReceiverConfig};
use crate::rtp_sender::{LocalSenderInfo, RtpSender, RtpSenderConfig};
use crate::transceiver::RtpRtcpTransceiver;
use crate::worker::Worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// How often the receive cache is swept for expired deadlines and stale
/// loss records when no packets are arriving.
const RELEASE_TICK_MS: u64 = 20;

/// Application-facing sink for received media.
///
/// Invoked on the signalling worker with batches of packets in ascending
/// sequence order.
pub trait MediaSessionCallback: Send + Sync {
    fn on_rtp_packets(&self, packets: Vec<RtpPacket>);
}

/// A single media stream pair inside a session.
pub struct MediaSession {
    inner: Arc<MediaSessionInner>,
}

pub(crate) struct MediaSessionInner {
    direction: MediaDirection,
    local_ssrc: u32,
    callback: Arc<dyn MediaSessionCallback>,
    signalling: Worker,
    transceiver: RtpRtcpTransceiver,
    rtp_sender: Option<Mutex<RtpSender>>,
    rtp_receiver: Option<Mutex<RtpReceiver>>,
    rtcp_receiver: RtcpReceiver,
    rtcp_sender: Arc<RtcpSender>,
    has_received_bye: AtomicBool,
}

impl MediaSession {
    pub fn new(
        config: &MediaSessionConfig,
        cname: &str,
        signalling: Worker,
        worker: Worker,
        transceiver: RtpRtcpTransceiver,
        router: &Arc<RtpRtcpRouter>,
    ) -> RtpEngineResult<MediaSession> {
        config.validate()?;

        let rtp_sender = if config.direction.sends() {
            Some(Mutex::new(RtpSender::new(RtpSenderConfig {
                local_ssrc: config.local_ssrc,
                clock_rate_hz: config.local_clock_rate_hz,
                payload_types: config.local_payload_types.clone(),
                rtx: config.local_rtx.clone(),
            })?))
        } else {
            None
        };
        let rtp_receiver = if config.direction.receives() {
            Some(Mutex::new(RtpReceiver::new(RtpReceiverConfig {
                remote_ssrc: config.remote_ssrc,
                clock_rate_hz: config.remote_clock_rate_hz,
                payload_types: config.remote_payload_types.clone(),
                max_cache_duration_ms: config.max_cache_duration_ms,
                rtx: config.remote_rtx.clone(),
            })?))
        } else {
            None
        };
        let rtcp_receiver = RtcpReceiver::new(RtcpReceiverConfig {
            local_ssrc: config.local_ssrc,
            remote_ssrc: config.remote_ssrc,
        });
        let rtcp_sender_config = RtcpSenderConfig {
            local_ssrc: config.local_ssrc,
            remote_ssrc: config.remote_ssrc,
            cname: cname.to_string(),
            rtcp_report_interval_ms: config.rtcp_report_interval_ms,
            direction: config.direction,
        };

        let inner = Arc::new_cyclic(|weak: &Weak<MediaSessionInner>| {
            let context: Weak<dyn RtcpContext> = weak.clone();
            let rtcp_sender = Arc::new(RtcpSender::new(
                rtcp_sender_config,
                worker.clone(),
                transceiver.clone(),
                context,
            ));
            MediaSessionInner {
                direction: config.direction,
                local_ssrc: config.local_ssrc,
                callback: config.callback.clone(),
                signalling,
                transceiver,
                rtp_sender,
                rtp_receiver,
                rtcp_receiver,
                rtcp_sender,
                has_received_bye: AtomicBool::new(false),
            }
        });

        if config.direction.receives() {
            let rtp_dst_arc: Arc<dyn RtpRouterDst> = inner.clone();
            let rtp_dst = Arc::downgrade(&rtp_dst_arc);
            router.add_rtp_dst(rtp_dst);
            inner.schedule_release_tick(&worker);
        }
        let rtcp_dst_arc: Arc<dyn RtcpRouterDst> = inner.clone();
        let rtcp_dst = Arc::downgrade(&rtcp_dst_arc);
        router.add_rtcp_dst(rtcp_dst);
        inner.rtcp_sender.start();
        Ok(MediaSession { inner })
    }

    pub fn local_ssrc(&self) -> u32 {
        self.inner.local_ssrc
    }

    /// Submit a packet for transmission. Trampolines to the signalling
    /// worker; per-packet validation failures there are logged and the
    /// packet dropped.
    pub fn send_rtp(&self, packet: RtpPacket) -> RtpEngineResult<()> {
        if !self.inner.direction.sends() {
            return Err(RtpEngineError::DirectionViolation(
                "send_rtp on a receive-only session".to_string(),
            ));
        }
        self.inner.clone().dispatch_send(packet);
        Ok(())
    }

    /// Say goodbye: emits a BYE-tailed compound and stops RTCP scheduling.
    pub fn send_bye(&self) {
        self.inner.rtcp_sender.send_bye();
    }

    pub fn has_received_bye(&self) -> bool {
        self.inner.has_received_bye.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<MediaSessionInner> {
        &self.inner
    }
}

impl MediaSessionInner {
    fn schedule_release_tick(self: &Arc<Self>, worker: &Worker) {
        let weak = Arc::downgrade(self);
        let worker_handle = worker.clone();
        worker.push_delayed(RELEASE_TICK_MS, move || {
            let Some(session) = weak.upgrade() else {
                return;
            };
            session.on_release_tick();
            session.schedule_release_tick(&worker_handle);
        });
    }

    fn on_release_tick(&self) {
        let Some(receiver) = &self.rtp_receiver else {
            return;
        };
        let output = receiver
            .lock()
            .expect("rtp receiver lock poisoned")
            .poll(unix_time_millis());
        if !output.nack_seqs.is_empty() {
            self.rtcp_sender.send_nack(&output.nack_seqs);
        }
        if !output.released.is_empty() {
            let callback = self.callback.clone();
            let released = output.released;
            self.signalling
                .push(move || callback.on_rtp_packets(released));
        }
    }

    fn dispatch_send(self: Arc<Self>, packet: RtpPacket) {
        if !self.signalling.is_current() {
            let session = self.clone();
            self.signalling.push(move || session.dispatch_send(packet));
            return;
        }
        let Some(sender) = &self.rtp_sender else {
            return;
        };
        let outcome = sender
            .lock()
            .expect("rtp sender lock poisoned")
            .send_rtp(packet);
        match outcome {
            Ok(packet) => self.transceiver.send_rtp(&packet),
            Err(err) => warn!(%err, "dropping outbound rtp packet"),
        }
    }
}

impl RtpRouterDst for MediaSessionInner {
    fn is_expected_remote_ssrc(&self, ssrc: u32) -> bool {
        match &self.rtp_receiver {
            Some(receiver) => receiver
                .lock()
                .expect("rtp receiver lock poisoned")
                .is_expected_remote_ssrc(ssrc),
            None => false,
        }
    }

    fn on_rtp_packet(&self, packet: RtpPacket) {
        let Some(receiver) = &self.rtp_receiver else {
            return;
        };
        let outcome = receiver
            .lock()
            .expect("rtp receiver lock poisoned")
            .on_rtp_packet(packet, unix_time_millis());
        match outcome {
            Ok(output) => {
                if !output.nack_seqs.is_empty() {
                    self.rtcp_sender.send_nack(&output.nack_seqs);
                }
                if !output.released.is_empty() {
                    let callback = self.callback.clone();
                    let released = output.released;
                    self.signalling
                        .push(move || callback.on_rtp_packets(released));
                }
            }
            Err(err) => warn!(%err, "dropping received rtp packet"),
        }
    }
}

impl RtcpRouterDst for MediaSessionInner {
    fn on_rtcp_packet(&self, buffer: &[u8]) {
        let output = self.rtcp_receiver.on_rtcp_packet(buffer, unix_time_millis());
        if output.bye_received {
            debug!(local_ssrc = self.local_ssrc, "peer said goodbye");
            self.has_received_bye.store(true, Ordering::SeqCst);
        }
        if let Some(seqs) = output.nack_seqs {
            if let Some(sender) = &self.rtp_sender {
                let rtx_packets = sender
                    .lock()
                    .expect("rtp sender lock poisoned")
                    .build_rtx(&seqs);
                for packet in rtx_packets {
                    self.transceiver.send_rtp(&packet);
                }
            }
        }
    }
}

impl RtcpContext for MediaSessionInner {
    fn has_sent_rtp(&self) -> bool {
        match &self.rtp_sender {
            Some(sender) => sender
                .lock()
                .expect("rtp sender lock poisoned")
                .has_sent_rtp(),
            None => false,
        }
    }

    fn has_received_rtp(&self) -> bool {
        match &self.rtp_receiver {
            Some(receiver) => receiver
                .lock()
                .expect("rtp receiver lock poisoned")
                .has_received_rtp(),
            None => false,
        }
    }

    fn has_received_bye(&self) -> bool {
        self.has_received_bye.load(Ordering::SeqCst)
    }

    fn local_sender_info(&self) -> Option<LocalSenderInfo> {
        self.rtp_sender
            .as_ref()?
            .lock()
            .expect("rtp sender lock poisoned")
            .sender_info()
    }

    fn remote_sender_info(&self) -> Option<RemoteSenderInfo> {
        let stats = self
            .rtp_receiver
            .as_ref()?
            .lock()
            .expect("rtp receiver lock poisoned")
            .statistics()?;
        let (lsr, dlsr) = self.rtcp_receiver.sr_info(unix_time_millis());
        Some(RemoteSenderInfo {
            remote_ssrc: stats.remote_ssrc,
            cumulative_loss: stats.cumulative_loss,
            extended_highest_seq: stats.extended_highest_seq,
            first_extended_seq: stats.first_extended_seq,
            interarrival_jitter: stats.interarrival_jitter,
            lsr,
            dlsr,
        })
    }
}
