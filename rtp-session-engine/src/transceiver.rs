//! UDP transceiver and network I/O loop
//!
//! One connected UDP socket carries both RTP and RTCP for a session. The
//! network loop drains the socket into the demultiplexing router and
//! services an outbound queue; sends are best-effort and never block
//! callers.
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


use crate::config::{TransportAddress, TransportProtocol};
use crate::error::{RtpEngineError, RtpEngineResult};
use crate::router::RtpRtcpRouter;
use crate::rtcp::{serialize_compound, RtcpPacket};
use crate::rtp_packet::RtpPacket;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Largest datagram the receive loop will accept.
const RECV_BUFFER_SIZE: usize = 65_535;

/// Observability-only session events; currently just "a BYE left the
/// socket".
#[derive(Clone)]
pub struct SessionEvents {
    bye_sent: Arc<watch::Sender<bool>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        SessionEvents {
            bye_sent: Arc::new(tx),
        }
    }

    pub fn bye_sent(&self) -> bool {
        *self.bye_sent.borrow()
    }

    /// Watch for the BYE-sent flag; useful in tests and shutdown logic.
    pub fn subscribe_bye_sent(&self) -> watch::Receiver<bool> {
        self.bye_sent.subscribe()
    }

    fn notify_bye_sent(&self) {
        self.bye_sent.send_replace(true);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct OutboundDatagram {
    pub buffer: Bytes,
    pub is_bye: bool,
}

pub(crate) enum TransceiverCommand {
    Send(OutboundDatagram),
    Shutdown,
}

/// Handle to the session's UDP endpoint. Cloning shares the same socket.
#[derive(Clone)]
pub struct RtpRtcpTransceiver {
    tx: mpsc::UnboundedSender<TransceiverCommand>,
}

impl RtpRtcpTransceiver {
    /// Bind and connect the socket and spawn the network loop.
    pub async fn start(
        local: &TransportAddress,
        remote: &TransportAddress,
        router: Arc<RtpRtcpRouter>,
        events: SessionEvents,
    ) -> RtpEngineResult<Self> {
        if local.protocol != TransportProtocol::Udp || remote.protocol != TransportProtocol::Udp
        {
            return Err(RtpEngineError::InvalidConfiguration(
                "transport protocol must be udp".to_string(),
            ));
        }
        if !local.same_family(remote) {
            return Err(RtpEngineError::InvalidConfiguration(
                "local and remote addresses must share an ip family".to_string(),
            ));
        }
        let socket = UdpSocket::bind(local.socket_addr()).await.map_err(|err| {
            RtpEngineError::ResourceFailure(format!(
                "failed to bind {}: {}",
                local.socket_addr(),
                err
            ))
        })?;
        socket.connect(remote.socket_addr()).await.map_err(|err| {
            RtpEngineError::ResourceFailure(format!(
                "failed to connect {}: {}",
                remote.socket_addr(),
                err
            ))
        })?;
        info!(
            local = %local.socket_addr(),
            remote = %remote.socket_addr(),
            "udp transceiver up"
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(network_loop(socket, rx, router, events));
        Ok(RtpRtcpTransceiver { tx })
    }

    /// Serialize and enqueue one RTP packet. Never blocks; failures are
    /// logged by the network loop.
    pub fn send_rtp(&self, packet: &RtpPacket) {
        let _ = self.tx.send(TransceiverCommand::Send(OutboundDatagram {
            buffer: packet.serialize().freeze(),
            is_bye: false,
        }));
    }

    /// Serialize and enqueue one compound RTCP packet.
    pub fn send_rtcp(&self, packets: &[RtcpPacket], is_bye: bool) {
        match serialize_compound(packets) {
            Ok(buffer) if !buffer.is_empty() => {
                let _ = self.tx.send(TransceiverCommand::Send(OutboundDatagram {
                    buffer: buffer.freeze(),
                    is_bye,
                }));
            }
            Ok(_) => {}
            Err(err) => error!(%err, "failed to serialize rtcp compound"),
        }
    }

    /// Stop the network loop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(TransceiverCommand::Shutdown);
    }

    /// A transceiver with no socket behind it; outbound datagrams land on
    /// the returned receiver. Test plumbing.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<TransceiverCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RtpRtcpTransceiver { tx }, rx)
    }
}

async fn network_loop(
    socket: UdpSocket,
    mut rx: mpsc::UnboundedReceiver<TransceiverCommand>,
    router: Arc<RtpRtcpRouter>,
    events: SessionEvents,
) {
    let mut recv_buffer = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(TransceiverCommand::Send(datagram)) => {
                    match socket.send(&datagram.buffer).await {
                        Ok(_) => {
                            if datagram.is_bye {
                                events.notify_bye_sent();
                            }
                        }
                        Err(err) => error!(%err, "failed to send datagram"),
                    }
                }
                Some(TransceiverCommand::Shutdown) | None => break,
            },
            readable = socket.readable() => {
                if let Err(err) = readable {
                    error!(%err, "udp socket wait failed");
                    break;
                }
                let mut buffers = Vec::new();
                loop {
                    match socket.try_recv(&mut recv_buffer) {
                        Ok(len) => {
                            buffers.push(Bytes::copy_from_slice(&recv_buffer[..len]))
                        }
                        Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                        Err(err) => {
                            debug!(%err, "udp recv error");
                            break;
                        }
                    }
                }
                router.on_data(buffers);
            }
        }
    }
    info!("network loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtcp::Bye;

    #[tokio::test]
    async fn test_detached_transceiver_queues_serialized_packets() {
        let (transceiver, mut rx) = RtpRtcpTransceiver::detached();
        transceiver.send_rtcp(
            &[RtcpPacket::Bye(Bye {
                sender_ssrc: 7,
                csrcs: vec![],
                reason: None,
            })],
            true,
        );
        match rx.recv().await.unwrap() {
            TransceiverCommand::Send(datagram) => {
                assert!(datagram.is_bye);
                assert_eq!(datagram.buffer[1], 203);
            }
            TransceiverCommand::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[tokio::test]
    async fn test_loopback_round_trip() {
        use crate::worker::Worker;

        let worker = Worker::spawn("net-test");
        let router = RtpRtcpRouter::new(worker.clone());
        let events = SessionEvents::new();

        let a_addr = TransportAddress::parse("127.0.0.1", 39341).unwrap();
        let b_addr = TransportAddress::parse("127.0.0.1", 39343).unwrap();
        let a = RtpRtcpTransceiver::start(&a_addr, &b_addr, router.clone(), events.clone())
            .await
            .unwrap();
        let _b = RtpRtcpTransceiver::start(&b_addr, &a_addr, router.clone(), events.clone())
            .await
            .unwrap();

        assert!(!events.bye_sent());
        a.send_rtcp(
            &[RtcpPacket::Bye(Bye {
                sender_ssrc: 1,
                csrcs: vec![],
                reason: None,
            })],
            true,
        );
        let mut bye_seen = events.subscribe_bye_sent();
        tokio::time::timeout(std::time::Duration::from_secs(1), bye_seen.wait_for(|&v| v))
            .await
            .expect("bye flag not raised")
            .unwrap();
    }
}
