//! Demo sender: streams numbered text payloads to a receiver on loopback,
//! then says goodbye.
//!
//! Run the receiver example first, then:
//! `cargo run --example sender`

use bytes::Bytes;
use rtp_session_engine::{
    MediaDirection, MediaSessionCallback, MediaSessionConfig, RtpHeader, RtpPacket,
    Session, SessionConfig, TransportAddress,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const MEDIA_PT: u8 = 0;
const LOCAL_SSRC: u32 = 123;
const REMOTE_SSRC: u32 = 789;

struct IgnorePackets;

impl MediaSessionCallback for IgnorePackets {
    fn on_rtp_packets(&self, _packets: Vec<RtpPacket>) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rtpcore_logging::init_console_logging("sender-demo", "info");

    let media = MediaSessionConfig {
        local_ssrc: LOCAL_SSRC,
        remote_ssrc: REMOTE_SSRC,
        local_clock_rate_hz: 1000,
        remote_clock_rate_hz: 1000,
        local_payload_types: vec![MEDIA_PT],
        remote_payload_types: vec![MEDIA_PT],
        local_rtx: None,
        remote_rtx: None,
        max_cache_duration_ms: 40,
        direction: MediaDirection::SendOnly,
        rtcp_report_interval_ms: 1000,
        callback: Arc::new(IgnorePackets),
    };
    let config = SessionConfig {
        local_address: TransportAddress::parse("127.0.0.1", 7777)?,
        remote_address: TransportAddress::parse("127.0.0.1", 6666)?,
        cname: "demo-sender".to_string(),
        media_sessions: BTreeMap::from([("demo".to_string(), media)]),
    };
    let session = Session::start(config).await?;

    for seq in 0u16..500 {
        let packet = RtpPacket::new(
            RtpHeader {
                marker: false,
                payload_type: MEDIA_PT,
                sequence_number: seq,
                timestamp: seq as u32 * 20,
                ssrc: LOCAL_SSRC,
                csrcs: vec![],
                extension: None,
            },
            Bytes::from(format!("hello {}", seq).into_bytes()),
            0,
        )?;
        session.send_rtp_packet(packet)?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    session.send_bye();
    let mut bye_sent = session.events().subscribe_bye_sent();
    let _ = tokio::time::timeout(Duration::from_secs(2), bye_sent.wait_for(|&sent| sent)).await;
    session.stop();
    Ok(())
}
