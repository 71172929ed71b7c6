//! Integration tests for the two loss-recovery paths: NACK-driven
//! retransmission through a lossy relay, and application-level ULP-FEC.

use bytes::Bytes;
use rtp_session_engine::{
    FecDecoderConfig, FecEncoderConfig, FecMaskType, ImportantProtectionMode,
    MediaDirection, MediaSessionCallback, MediaSessionConfig, RtpHeader, RtpPacket,
    RtxConfig, Session, SessionConfig, TransportAddress, UlpFecDecoder, UlpFecEncoder,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const MEDIA_PT: u8 = 96;
const RTX_PT: u8 = 97;
const FEC_PT: u8 = 117;

struct ChannelCallback {
    tx: mpsc::UnboundedSender<Vec<RtpPacket>>,
}

impl MediaSessionCallback for ChannelCallback {
    fn on_rtp_packets(&self, packets: Vec<RtpPacket>) {
        let _ = self.tx.send(packets);
    }
}

fn media_packet(ssrc: u32, seq: u16, payload_type: u8) -> RtpPacket {
    RtpPacket::new(
        RtpHeader {
            marker: false,
            payload_type,
            sequence_number: seq,
            timestamp: seq as u32 * 3000,
            ssrc,
            csrcs: vec![],
            extension: None,
        },
        Bytes::from(format!("payload-{}", seq).into_bytes()),
        0,
    )
    .unwrap()
}

fn rtx_config(ssrc: u32) -> RtxConfig {
    RtxConfig {
        ssrc,
        max_cache_seq_difference: 512,
        payload_type_map: BTreeMap::from([(RTX_PT, MEDIA_PT)]),
    }
}

/// A bidirectional UDP relay that drops one specific RTP sequence number
/// on the a-to-b direction, once.
async fn lossy_relay(
    port_for_a: u16,
    a_addr: &str,
    port_for_b: u16,
    b_addr: &str,
    drop_seq: u16,
) {
    let toward_a = UdpSocket::bind(("127.0.0.1", port_for_a)).await.unwrap();
    let toward_b = UdpSocket::bind(("127.0.0.1", port_for_b)).await.unwrap();
    toward_a.connect(a_addr).await.unwrap();
    toward_b.connect(b_addr).await.unwrap();
    tokio::spawn(async move {
        let mut from_a = vec![0u8; 2048];
        let mut from_b = vec![0u8; 2048];
        let mut dropped = false;
        loop {
            tokio::select! {
                Ok(len) = toward_a.recv(&mut from_a) => {
                    // a -> b, with the single configured drop.
                    let datagram = &from_a[..len];
                    if !dropped
                        && len >= 12
                        && datagram[1] & 0x7F == MEDIA_PT
                        && u16::from_be_bytes([datagram[2], datagram[3]]) == drop_seq
                    {
                        dropped = true;
                        continue;
                    }
                    let _ = toward_b.send(datagram).await;
                }
                Ok(len) = toward_b.recv(&mut from_b) => {
                    let _ = toward_a.send(&from_b[..len]).await;
                }
                else => break,
            }
        }
    });
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nack_rtx_recovers_a_dropped_packet() {
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let sender_config = SessionConfig {
        local_address: TransportAddress::parse("127.0.0.1", 39450).unwrap(),
        remote_address: TransportAddress::parse("127.0.0.1", 39451).unwrap(),
        cname: "sender".to_string(),
        media_sessions: BTreeMap::from([(
            "media".to_string(),
            MediaSessionConfig {
                local_ssrc: 0xA,
                remote_ssrc: 0xB,
                local_clock_rate_hz: 90_000,
                remote_clock_rate_hz: 90_000,
                local_payload_types: vec![MEDIA_PT],
                remote_payload_types: vec![MEDIA_PT],
                local_rtx: Some(rtx_config(0xA0)),
                remote_rtx: None,
                max_cache_duration_ms: 2_000,
                direction: MediaDirection::SendRecv,
                rtcp_report_interval_ms: 500,
                callback: Arc::new(ChannelCallback {
                    tx: mpsc::unbounded_channel().0,
                }),
            },
        )]),
    };
    let receiver_config = SessionConfig {
        local_address: TransportAddress::parse("127.0.0.1", 39453).unwrap(),
        remote_address: TransportAddress::parse("127.0.0.1", 39454).unwrap(),
        cname: "receiver".to_string(),
        media_sessions: BTreeMap::from([(
            "media".to_string(),
            MediaSessionConfig {
                local_ssrc: 0xB,
                remote_ssrc: 0xA,
                local_clock_rate_hz: 90_000,
                remote_clock_rate_hz: 90_000,
                local_payload_types: vec![MEDIA_PT],
                remote_payload_types: vec![MEDIA_PT],
                local_rtx: None,
                remote_rtx: Some(rtx_config(0xA0)),
                max_cache_duration_ms: 2_000,
                direction: MediaDirection::SendRecv,
                rtcp_report_interval_ms: 500,
                callback: Arc::new(ChannelCallback { tx: tx_b }),
            },
        )]),
    };

    // Relay drops media seq 104 once on the way to the receiver.
    lossy_relay(39451, "127.0.0.1:39450", 39454, "127.0.0.1:39453", 104).await;
    let sender = Session::start(sender_config).await.unwrap();
    let _receiver = Session::start(receiver_config).await.unwrap();

    for seq in 100u16..110 {
        sender
            .send_rtp_packet(media_packet(0xA, seq, MEDIA_PT))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut seqs = Vec::new();
    while seqs.len() < 10 {
        match tokio::time::timeout(Duration::from_secs(5), rx_b.recv()).await {
            Ok(Some(batch)) => seqs.extend(batch.iter().map(|p| p.sequence_number())),
            _ => break,
        }
    }
    assert_eq!(
        seqs,
        (100u16..110).collect::<Vec<u16>>(),
        "dropped packet was not recovered via nack + rtx"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fec_recovers_a_dropped_packet_end_to_end() {
    // Receive-only endpoint; the test plays the remote peer and protects
    // the stream with ULP-FEC the way a sending application would.
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let receiver_config = SessionConfig {
        local_address: TransportAddress::parse("127.0.0.1", 39462).unwrap(),
        remote_address: TransportAddress::parse("127.0.0.1", 39460).unwrap(),
        cname: "receiver".to_string(),
        media_sessions: BTreeMap::from([(
            "media".to_string(),
            MediaSessionConfig {
                local_ssrc: 0xB,
                remote_ssrc: 0xA,
                local_clock_rate_hz: 1_000,
                remote_clock_rate_hz: 1_000,
                local_payload_types: vec![MEDIA_PT],
                remote_payload_types: vec![MEDIA_PT, FEC_PT],
                local_rtx: None,
                remote_rtx: None,
                max_cache_duration_ms: 0,
                direction: MediaDirection::SendRecv,
                rtcp_report_interval_ms: 1_000,
                callback: Arc::new(ChannelCallback { tx: tx_b }),
            },
        )]),
    };
    let _receiver = Session::start(receiver_config).await.unwrap();

    let peer = UdpSocket::bind("127.0.0.1:39460").await.unwrap();
    peer.connect("127.0.0.1:39462").await.unwrap();

    // 48 protected media packets, 12 of them important, full protection.
    let media: Vec<RtpPacket> = (200u16..248)
        .map(|seq| media_packet(0xA, seq, MEDIA_PT))
        .collect();
    let encoder = UlpFecEncoder::new(FecEncoderConfig {
        ssrc: 0xA,
        payload_type: FEC_PT,
    })
    .unwrap();
    let mut fec = encoder
        .encode(
            &media,
            12,
            ImportantProtectionMode::Overlap,
            255,
            FecMaskType::Random,
        )
        .unwrap();
    assert_eq!(fec.len(), 48);
    for (i, packet) in fec.iter_mut().enumerate() {
        packet.set_sequence_number(248 + i as u16);
        packet.set_timestamp(247 * 3000);
    }

    for packet in media.iter().filter(|p| p.sequence_number() != 220) {
        peer.send(&packet.serialize()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    for packet in &fec {
        peer.send(&packet.serialize()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // The media session delivers whatever arrived; the FEC decoder sits on
    // top and rebuilds the gap.
    let mut decoder = UlpFecDecoder::new(FecDecoderConfig {
        max_cache_seq_difference: 48,
        ssrc: 0xA,
        payload_type: FEC_PT,
    })
    .unwrap();
    let mut recovered = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(200), rx_b.recv()).await {
            Ok(Some(batch)) => recovered.extend(decoder.decode(batch)),
            _ => break,
        }
    }
    recovered.extend(decoder.flush());

    let media_seqs: Vec<u16> = recovered
        .iter()
        .filter(|p| p.payload_type() == MEDIA_PT)
        .map(|p| p.sequence_number())
        .collect();
    assert_eq!(
        media_seqs,
        (200u16..248).collect::<Vec<u16>>(),
        "fec did not rebuild the dropped packet"
    );
    let rebuilt = recovered
        .iter()
        .find(|p| p.sequence_number() == 220)
        .unwrap();
    assert_eq!(&rebuilt.payload[..], format!("payload-{}", 220).as_bytes());
}
