//! Integration tests for plain delivery, transport reordering and BYE
//! over two engine endpoints on loopback UDP.

use bytes::Bytes;
use rtp_session_engine::{
    MediaDirection, MediaSessionCallback, MediaSessionConfig, RtpHeader, RtpPacket,
    Session, SessionConfig, TransportAddress,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const MEDIA_PT: u8 = 96;

struct ChannelCallback {
    tx: mpsc::UnboundedSender<Vec<RtpPacket>>,
}

impl MediaSessionCallback for ChannelCallback {
    fn on_rtp_packets(&self, packets: Vec<RtpPacket>) {
        let _ = self.tx.send(packets);
    }
}

fn media_packet(ssrc: u32, seq: u16, timestamp: u32) -> RtpPacket {
    RtpPacket::new(
        RtpHeader {
            marker: false,
            payload_type: MEDIA_PT,
            sequence_number: seq,
            timestamp,
            ssrc,
            csrcs: vec![],
            extension: None,
        },
        Bytes::from(format!("packet-{}", seq).into_bytes()),
        0,
    )
    .unwrap()
}

fn session_config(
    local_port: u16,
    remote_port: u16,
    local_ssrc: u32,
    remote_ssrc: u32,
    max_cache_duration_ms: u64,
    cname: &str,
) -> (SessionConfig, mpsc::UnboundedReceiver<Vec<RtpPacket>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let media = MediaSessionConfig {
        local_ssrc,
        remote_ssrc,
        local_clock_rate_hz: 90_000,
        remote_clock_rate_hz: 90_000,
        local_payload_types: vec![MEDIA_PT],
        remote_payload_types: vec![MEDIA_PT],
        local_rtx: None,
        remote_rtx: None,
        max_cache_duration_ms,
        direction: MediaDirection::SendRecv,
        rtcp_report_interval_ms: 200,
        callback: Arc::new(ChannelCallback { tx }),
    };
    (
        SessionConfig {
            local_address: TransportAddress::parse("127.0.0.1", local_port).unwrap(),
            remote_address: TransportAddress::parse("127.0.0.1", remote_port).unwrap(),
            cname: cname.to_string(),
            media_sessions: BTreeMap::from([("media".to_string(), media)]),
        },
        rx,
    )
}

async fn collect_seqs(
    rx: &mut mpsc::UnboundedReceiver<Vec<RtpPacket>>,
    expected: usize,
) -> Vec<u16> {
    let mut seqs = Vec::new();
    while seqs.len() < expected {
        match tokio::time::timeout(Duration::from_secs(3), rx.recv()).await {
            Ok(Some(batch)) => seqs.extend(batch.iter().map(|p| p.sequence_number())),
            _ => break,
        }
    }
    seqs
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plain_delivery_in_order() {
    let (config_a, _rx_a) = session_config(39410, 39412, 0xA, 0xB, 100, "endpoint-a");
    let (config_b, mut rx_b) = session_config(39412, 39410, 0xB, 0xA, 100, "endpoint-b");
    let session_a = Session::start(config_a).await.unwrap();
    let _session_b = Session::start(config_b).await.unwrap();

    for seq in 100u16..110 {
        session_a
            .send_rtp_packet(media_packet(0xA, seq, seq as u32 * 3000))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let seqs = collect_seqs(&mut rx_b, 10).await;
    assert_eq!(seqs, (100u16..110).collect::<Vec<u16>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_local_ssrc_rejected() {
    let (config_a, _rx_a) = session_config(39420, 39422, 0xA, 0xB, 100, "endpoint-a");
    let session_a = Session::start(config_a).await.unwrap();
    assert!(session_a
        .send_rtp_packet(media_packet(0xDEAD, 1, 0))
        .is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transport_reorder_is_repaired() {
    // A receive-only endpoint; the test plays the remote peer on a raw
    // socket so the wire order can be scrambled.
    let (config_b, mut rx_b) = session_config(39432, 39430, 0xB, 0xA, 300, "endpoint-b");
    let _session_b = Session::start(config_b).await.unwrap();

    let peer = tokio::net::UdpSocket::bind("127.0.0.1:39430").await.unwrap();
    peer.connect("127.0.0.1:39432").await.unwrap();

    let order = [100u16, 102, 101, 103, 104, 106, 105, 107, 108, 109];
    for seq in order {
        let wire = media_packet(0xA, seq, seq as u32 * 3000).serialize();
        peer.send(&wire).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let seqs = collect_seqs(&mut rx_b, 10).await;
    assert_eq!(seqs, (100u16..110).collect::<Vec<u16>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bye_is_observed_and_latched() {
    let (config_a, _rx_a) = session_config(39440, 39442, 0xA, 0xB, 100, "endpoint-a");
    let (config_b, _rx_b) = session_config(39442, 39440, 0xB, 0xA, 100, "endpoint-b");
    let session_a = Session::start(config_a).await.unwrap();
    let session_b = Session::start(config_b).await.unwrap();

    assert!(!session_a.events().bye_sent());
    session_a.send_bye();

    let mut bye_sent = session_a.events().subscribe_bye_sent();
    tokio::time::timeout(Duration::from_secs(2), bye_sent.wait_for(|&sent| sent))
        .await
        .expect("bye was never sent")
        .unwrap();

    // The peer latches the goodbye.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let media = session_b.media_session("media").unwrap();
        if media.has_received_bye() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "peer never observed the bye"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
