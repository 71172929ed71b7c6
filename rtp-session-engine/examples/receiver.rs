//! Demo receiver: prints whatever the sender example streams until the
//! peer says goodbye.
//!
//! `cargo run --example receiver`

use rtp_session_engine::{
    MediaDirection, MediaSessionCallback, MediaSessionConfig, RtpPacket, Session,
    SessionConfig, TransportAddress,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MEDIA_PT: u8 = 0;
const LOCAL_SSRC: u32 = 789;
const REMOTE_SSRC: u32 = 123;

struct PrintPackets;

impl MediaSessionCallback for PrintPackets {
    fn on_rtp_packets(&self, packets: Vec<RtpPacket>) {
        for packet in packets {
            info!(
                seq = packet.sequence_number(),
                timestamp = packet.timestamp(),
                content = %String::from_utf8_lossy(&packet.payload),
                "received rtp packet"
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rtpcore_logging::init_console_logging("receiver-demo", "info");

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
        direction: MediaDirection::RecvOnly,
        rtcp_report_interval_ms: 1000,
        callback: Arc::new(PrintPackets),
    };
    let config = SessionConfig {
        local_address: TransportAddress::parse("127.0.0.1", 6666)?,
        remote_address: TransportAddress::parse("127.0.0.1", 7777)?,
        cname: "demo-receiver".to_string(),
        media_sessions: BTreeMap::from([("demo".to_string(), media)]),
    };
    let session = Session::start(config).await?;

    // Run until the peer's BYE arrives.
    loop {
        let media_session = session
            .media_session("demo")
            .expect("configured media session exists");
        if media_session.has_received_bye() {
            info!("peer said goodbye");
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    session.stop();
    Ok(())
}
