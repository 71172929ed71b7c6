//! Session facade: one UDP flow, three workers, many media sessions
//!
//! `Session::start` brings up the signalling and protocol workers, the
//! router, the UDP transceiver (whose receive loop is the network worker)
//! and one media session per configured stream. Everything degrades
//! gracefully after start: per-packet failures are logged and dropped, and
//! the session runs until `stop`.
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


use crate::config::SessionConfig;
use crate::error::{RtpEngineError, RtpEngineResult};
use crate::media_session::MediaSession;
use crate::router::RtpRtcpRouter;
use crate::rtp_packet::RtpPacket;
use crate::transceiver::{RtpRtcpTransceiver, SessionEvents};
use crate::worker::Worker;
use std::sync::Arc;
use tracing::{error, info};

/// A running engine endpoint.
pub struct Session {
    signalling: Worker,
    worker: Worker,
    #[allow(dead_code)]
    router: Arc<RtpRtcpRouter>,
    transceiver: RtpRtcpTransceiver,
    media_sessions: Vec<(String, MediaSession)>,
    events: SessionEvents,
}

impl Session {
    /// Validate the configuration, bring up the runtime and start every
    /// media session. On failure everything that was started is torn down.
    pub async fn start(config: SessionConfig) -> RtpEngineResult<Session> {
        config.validate()?;

        let signalling = Worker::spawn("signalling");
        let worker = Worker::spawn("worker");
        let router = RtpRtcpRouter::new(worker.clone());
        let events = SessionEvents::new();
        let transceiver = match RtpRtcpTransceiver::start(
            &config.local_address,
            &config.remote_address,
            router.clone(),
            events.clone(),
        )
        .await
        {
            Ok(transceiver) => transceiver,
            Err(err) => {
                error!(%err, "failed to start transceiver");
                signalling.stop();
                worker.stop();
                return Err(err);
            }
        };

        let mut media_sessions = Vec::new();
        for (name, media_config) in &config.media_sessions {
            match MediaSession::new(
                media_config,
                &config.cname,
                signalling.clone(),
                worker.clone(),
                transceiver.clone(),
                &router,
            ) {
                Ok(session) => media_sessions.push((name.clone(), session)),
                Err(err) => {
                    error!(name = %name, %err, "failed to start media session");
                    transceiver.shutdown();
                    signalling.stop();
                    worker.stop();
                    return Err(RtpEngineError::InvalidConfiguration(format!(
                        "media session {}: {}",
                        name, err
                    )));
                }
            }
        }
        info!(
            streams = media_sessions.len(),
            local = %config.local_address.socket_addr(),
            remote = %config.remote_address.socket_addr(),
            "session started"
        );
        Ok(Session {
            signalling,
            worker,
            router,
            transceiver,
            media_sessions,
            events,
        })
    }

    /// Submit an RTP packet; it is routed to the media session owning the
    /// packet's SSRC.
    pub fn send_rtp_packet(&self, packet: RtpPacket) -> RtpEngineResult<()> {
        let ssrc = packet.ssrc();
        for (_, session) in &self.media_sessions {
            if session.local_ssrc() == ssrc {
                return session.send_rtp(packet);
            }
        }
        Err(RtpEngineError::UnexpectedSsrc(ssrc))
    }

    /// Say goodbye on every media session.
    pub fn send_bye(&self) {
        for (_, session) in &self.media_sessions {
            session.send_bye();
        }
    }

    /// Access one media session by its configured name.
    pub fn media_session(&self, name: &str) -> Option<&MediaSession> {
        self.media_sessions
            .iter()
            .find(|(session_name, _)| session_name == name)
            .map(|(_, session)| session)
    }

    /// Observability events (currently the BYE-sent flag).
    pub fn events(&self) -> SessionEvents {
        self.events.clone()
    }

    /// Stop the workers and the network loop. Queued tasks are dropped.
    pub fn stop(&self) {
        self.transceiver.shutdown();
        self.worker.stop();
        self.signalling.stop();
        info!("session stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
