//! Datagram demultiplexing and per-SSRC dispatch
//!
//! A single UDP flow carries RTP and RTCP; the payload-type slot decides
//! which is which, and the router fans parsed traffic out to the media
//! sessions registered as destinations. Dispatch is pinned to the protocol
//! worker.
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


use crate::rtp_packet::{RtpPacket, RTP_FIXED_HEADER_LEN, RTP_VERSION};
use crate::worker::Worker;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// A destination for parsed RTP packets, keyed by remote SSRC.
pub trait RtpRouterDst: Send + Sync {
    fn is_expected_remote_ssrc(&self, ssrc: u32) -> bool;
    fn on_rtp_packet(&self, packet: RtpPacket);
}

/// A destination for raw RTCP compound buffers. Destinations filter by
/// SSRC themselves, so RTCP is broadcast.
pub trait RtcpRouterDst: Send + Sync {
    fn on_rtcp_packet(&self, buffer: &[u8]);
}

/// What a datagram looks like from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramKind {
    Rtp,
    Rtcp,
    Invalid,
}

/// Classify a datagram. RTCP claims the payload-type slot values 64..96;
/// anything else with an RTP-sized header is RTP.
pub fn classify(data: &[u8]) -> DatagramKind {
    if data.len() < 4 {
        return DatagramKind::Invalid;
    }
    if data[0] >> 6 != RTP_VERSION {
        return DatagramKind::Invalid;
    }
    let payload_type = data[1] & 0x7F;
    if (64..96).contains(&payload_type) {
        return DatagramKind::Rtcp;
    }
    if data.len() >= RTP_FIXED_HEADER_LEN {
        return DatagramKind::Rtp;
    }
    DatagramKind::Invalid
}

#[derive(Default)]
struct Destinations {
    rtp: Vec<Weak<dyn RtpRouterDst>>,
    rtcp: Vec<Weak<dyn RtcpRouterDst>>,
}

/// Routes incoming datagrams to the registered media sessions.
pub struct RtpRtcpRouter {
    worker: Worker,
    destinations: Mutex<Destinations>,
    malformed_datagrams: AtomicU64,
}

impl RtpRtcpRouter {
    pub fn new(worker: Worker) -> Arc<Self> {
        Arc::new(RtpRtcpRouter {
            worker,
            destinations: Mutex::new(Destinations::default()),
            malformed_datagrams: AtomicU64::new(0),
        })
    }

    pub fn add_rtp_dst(&self, dst: Weak<dyn RtpRouterDst>) {
        let mut destinations = self.destinations.lock().expect("router lock poisoned");
        if !destinations.rtp.iter().any(|d| d.ptr_eq(&dst)) {
            destinations.rtp.push(dst);
        }
    }

    pub fn remove_rtp_dst(&self, dst: &Weak<dyn RtpRouterDst>) {
        let mut destinations = self.destinations.lock().expect("router lock poisoned");
        destinations.rtp.retain(|d| !d.ptr_eq(dst));
    }

    pub fn add_rtcp_dst(&self, dst: Weak<dyn RtcpRouterDst>) {
        let mut destinations = self.destinations.lock().expect("router lock poisoned");
        if !destinations.rtcp.iter().any(|d| d.ptr_eq(&dst)) {
            destinations.rtcp.push(dst);
        }
    }

    pub fn remove_rtcp_dst(&self, dst: &Weak<dyn RtcpRouterDst>) {
        let mut destinations = self.destinations.lock().expect("router lock poisoned");
        destinations.rtcp.retain(|d| !d.ptr_eq(dst));
    }

    /// Count of datagrams that were neither valid RTP nor RTCP.
    pub fn malformed_datagrams(&self) -> u64 {
        self.malformed_datagrams.load(Ordering::Relaxed)
    }

    /// Feed received datagrams in arrival order. Re-enqueues itself onto
    /// the protocol worker when called from anywhere else.
    pub fn on_data(self: &Arc<Self>, buffers: Vec<Bytes>) {
        if buffers.is_empty() {
            return;
        }
        if !self.worker.is_current() {
            let router = self.clone();
            self.worker.push(move || router.dispatch(buffers));
            return;
        }
        self.dispatch(buffers);
    }

    fn dispatch(&self, buffers: Vec<Bytes>) {
        for buffer in buffers {
            match classify(&buffer) {
                DatagramKind::Rtp => match RtpPacket::parse(&buffer) {
                    Ok(packet) => self.route_rtp(packet),
                    Err(err) => {
                        warn!(%err, "failed to parse rtp datagram");
                        self.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
                    }
                },
                DatagramKind::Rtcp => self.route_rtcp(&buffer),
                DatagramKind::Invalid => {
                    warn!(len = buffer.len(), "datagram is neither rtp nor rtcp");
                    self.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn route_rtp(&self, packet: RtpPacket) {
        let targets: Vec<Arc<dyn RtpRouterDst>> = {
            let mut destinations = self.destinations.lock().expect("router lock poisoned");
            destinations.rtp.retain(|d| d.strong_count() > 0);
            destinations.rtp.iter().filter_map(|d| d.upgrade()).collect()
        };
        let ssrc = packet.ssrc();
        for target in targets {
            if target.is_expected_remote_ssrc(ssrc) {
                target.on_rtp_packet(packet);
                return;
            }
        }
        debug!(ssrc, "no destination for rtp packet");
    }

    fn route_rtcp(&self, buffer: &[u8]) {
        let targets: Vec<Arc<dyn RtcpRouterDst>> = {
            let mut destinations = self.destinations.lock().expect("router lock poisoned");
            destinations.rtcp.retain(|d| d.strong_count() > 0);
            destinations.rtcp.iter().filter_map(|d| d.upgrade()).collect()
        };
        for target in targets {
            target.on_rtcp_packet(buffer);
        }
    }
}
