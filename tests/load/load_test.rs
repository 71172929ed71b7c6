//! Throughput smoke test: a sustained stream through two loopback
//! endpoints must arrive complete and in order.

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
const PACKETS: u16 = 600;

struct ChannelCallback {
    tx: mpsc::UnboundedSender<Vec<RtpPacket>>,
}

impl MediaSessionCallback for ChannelCallback {
    fn on_rtp_packets(&self, packets: Vec<RtpPacket>) {
        let _ = self.tx.send(packets);
    }
}

fn config(
    local_port: u16,
    remote_port: u16,
    local_ssrc: u32,
    remote_ssrc: u32,
) -> (SessionConfig, mpsc::UnboundedReceiver<Vec<RtpPacket>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let media = MediaSessionConfig {
        local_ssrc,
        remote_ssrc,
        local_clock_rate_hz: 48_000,
        remote_clock_rate_hz: 48_000,
        local_payload_types: vec![MEDIA_PT],
        remote_payload_types: vec![MEDIA_PT],
        local_rtx: None,
        remote_rtx: None,
        max_cache_duration_ms: 500,
        direction: MediaDirection::SendRecv,
        rtcp_report_interval_ms: 250,
        callback: Arc::new(ChannelCallback { tx }),
    };
    (
        SessionConfig {
            local_address: TransportAddress::parse("127.0.0.1", local_port).unwrap(),
            remote_address: TransportAddress::parse("127.0.0.1", remote_port).unwrap(),
            cname: format!("load-{}", local_ssrc),
            media_sessions: BTreeMap::from([("media".to_string(), media)]),
        },
        rx,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sustained_stream_arrives_in_order() {
    let (config_a, _rx_a) = config(39480, 39482, 0xA, 0xB);
    let (config_b, mut rx_b) = config(39482, 39480, 0xB, 0xA);
    let session_a = Session::start(config_a).await.unwrap();
    let _session_b = Session::start(config_b).await.unwrap();

    for seq in 0..PACKETS {
        let packet = RtpPacket::new(
            RtpHeader {
                marker: false,
                payload_type: MEDIA_PT,
                sequence_number: seq,
                timestamp: seq as u32 * 960,
                ssrc: 0xA,
                csrcs: vec![],
                extension: None,
            },
            Bytes::from(vec![seq as u8; 160]),
            0,
        )
        .unwrap();
        session_a.send_rtp_packet(packet).unwrap();
        if seq % 20 == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    let mut seqs: Vec<u16> = Vec::new();
    while seqs.len() < PACKETS as usize {
        match tokio::time::timeout(Duration::from_secs(5), rx_b.recv()).await {
            Ok(Some(batch)) => seqs.extend(batch.iter().map(|p| p.sequence_number())),
            _ => break,
        }
    }
    assert_eq!(seqs.len(), PACKETS as usize, "stream did not arrive complete");
    assert!(
        seqs.windows(2).all(|w| w[1] == w[0].wrapping_add(1)),
        "stream arrived out of order"
    );
}
