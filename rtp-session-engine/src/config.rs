//! Configuration surface for sessions and their sub-components
//!
//! Every subsystem takes a validated config struct; validation happens once
//! at construction and the rest of the engine trusts the values.
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


use crate::error::{RtpEngineError, RtpEngineResult};
use crate::media_session::MediaSessionCallback;
use crate::rtp_packet::MAX_PAYLOAD_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Transport protocol; the engine speaks UDP only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProtocol {
    Udp,
}

/// One endpoint address of the session's UDP flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportAddress {
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: TransportProtocol,
}

impl TransportAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        TransportAddress {
            ip,
            port,
            protocol: TransportProtocol::Udp,
        }
    }

    /// Parse an IPv4 or IPv6 literal.
    pub fn parse(ip: &str, port: u16) -> RtpEngineResult<Self> {
        let ip: IpAddr = ip.parse().map_err(|_| {
            RtpEngineError::InvalidConfiguration(format!("invalid ip address: {}", ip))
        })?;
        Ok(Self::new(ip, port))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn same_family(&self, other: &TransportAddress) -> bool {
        self.ip.is_ipv4() == other.ip.is_ipv4()
    }
}

/// RFC 4588 retransmission configuration for one direction of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxConfig {
    /// SSRC the retransmission stream is carried on
    pub ssrc: u32,
    /// Retransmission cache window in sequence numbers
    pub max_cache_seq_difference: u16,
    /// Map of rtx payload type to the media payload type it carries
    pub payload_type_map: BTreeMap<u8, u8>,
}

impl RtxConfig {
    pub fn validate(&self) -> RtpEngineResult<()> {
        if self.max_cache_seq_difference == 0 {
            return Err(RtpEngineError::InvalidConfiguration(
                "rtx cache window cannot be 0".to_string(),
            ));
        }
        if self.max_cache_seq_difference > crate::seq::SEQ_HALF_RANGE {
            return Err(RtpEngineError::InvalidConfiguration(
                "rtx cache window cannot exceed half the sequence space".to_string(),
            ));
        }
        for (&rtx_pt, &associated_pt) in &self.payload_type_map {
            if rtx_pt > MAX_PAYLOAD_TYPE || associated_pt > MAX_PAYLOAD_TYPE {
                return Err(RtpEngineError::InvalidConfiguration(format!(
                    "rtx payload type mapping {} -> {} exceeds 7 bits",
                    rtx_pt, associated_pt
                )));
            }
        }
        Ok(())
    }

    /// The media payload type carried by an rtx payload type.
    pub fn associated_for(&self, rtx_pt: u8) -> Option<u8> {
        self.payload_type_map.get(&rtx_pt).copied()
    }

    /// The rtx payload type that carries a media payload type.
    pub fn rtx_for(&self, associated_pt: u8) -> Option<u8> {
        self.payload_type_map
            .iter()
            .find(|(_, &pt)| pt == associated_pt)
            .map(|(&rtx_pt, _)| rtx_pt)
    }
}

/// Transmission direction policy for a media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
}

impl MediaDirection {
    pub fn sends(self) -> bool {
        self != MediaDirection::RecvOnly
    }

    pub fn receives(self) -> bool {
        self != MediaDirection::SendOnly
    }
}

/// Configuration of one media session (one local/remote SSRC pair).
#[derive(Clone)]
pub struct MediaSessionConfig {
    pub local_ssrc: u32,
    pub remote_ssrc: u32,
    pub local_clock_rate_hz: u32,
    pub remote_clock_rate_hz: u32,
    pub local_payload_types: Vec<u8>,
    pub remote_payload_types: Vec<u8>,
    pub local_rtx: Option<RtxConfig>,
    pub remote_rtx: Option<RtxConfig>,
    /// How long a received packet may wait for reordering before release
    pub max_cache_duration_ms: u64,
    pub direction: MediaDirection,
    pub rtcp_report_interval_ms: u64,
    /// Receives in-order packet batches on the signalling worker
    pub callback: Arc<dyn MediaSessionCallback>,
}

impl fmt::Debug for MediaSessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSessionConfig")
            .field("local_ssrc", &self.local_ssrc)
            .field("remote_ssrc", &self.remote_ssrc)
            .field("direction", &self.direction)
            .field("local_payload_types", &self.local_payload_types)
            .field("remote_payload_types", &self.remote_payload_types)
            .finish_non_exhaustive()
    }
}

impl MediaSessionConfig {
    pub fn validate(&self) -> RtpEngineResult<()> {
        if self.direction.sends() {
            if self.local_clock_rate_hz == 0 {
                return Err(RtpEngineError::InvalidConfiguration(
                    "local rtp clock rate cannot be 0".to_string(),
                ));
            }
            if self.local_payload_types.is_empty() {
                return Err(RtpEngineError::InvalidConfiguration(
                    "local payload types cannot be empty on a sending session".to_string(),
                ));
            }
            validate_payload_types(&self.local_payload_types)?;
        }
        if self.direction.receives() {
            if self.remote_clock_rate_hz == 0 {
                return Err(RtpEngineError::InvalidConfiguration(
                    "remote rtp clock rate cannot be 0".to_string(),
                ));
            }
            if self.remote_payload_types.is_empty() {
                return Err(RtpEngineError::InvalidConfiguration(
                    "remote payload types cannot be empty on a receiving session".to_string(),
                ));
            }
            validate_payload_types(&self.remote_payload_types)?;
        }
        if self.rtcp_report_interval_ms == 0 {
            return Err(RtpEngineError::InvalidConfiguration(
                "rtcp report interval cannot be 0".to_string(),
            ));
        }
        if let Some(rtx) = &self.local_rtx {
            rtx.validate()?;
        }
        if let Some(rtx) = &self.remote_rtx {
            rtx.validate()?;
        }
        let ssrcs = self.ssrcs();
        let mut deduped = ssrcs.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != ssrcs.len() {
            return Err(RtpEngineError::InvalidConfiguration(
                "duplicate ssrc inside one media session".to_string(),
            ));
        }
        Ok(())
    }

    /// All SSRCs this session claims, for global uniqueness checks.
    pub fn ssrcs(&self) -> Vec<u32> {
        let mut ssrcs = vec![self.local_ssrc, self.remote_ssrc];
        if let Some(rtx) = &self.local_rtx {
            ssrcs.push(rtx.ssrc);
        }
        if let Some(rtx) = &self.remote_rtx {
            ssrcs.push(rtx.ssrc);
        }
        ssrcs
    }
}

fn validate_payload_types(payload_types: &[u8]) -> RtpEngineResult<()> {
    for &pt in payload_types {
        if pt > MAX_PAYLOAD_TYPE {
            return Err(RtpEngineError::InvalidConfiguration(format!(
                "payload type {} exceeds 7 bits",
                pt
            )));
        }
    }
    Ok(())
}

/// Top-level session configuration: one UDP flow, many media sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub local_address: TransportAddress,
    pub remote_address: TransportAddress,
    pub cname: String,
    /// Media sessions keyed by a caller-chosen name
    pub media_sessions: BTreeMap<String, MediaSessionConfig>,
}

impl SessionConfig {
    pub fn validate(&self) -> RtpEngineResult<()> {
        if self.local_address.protocol != TransportProtocol::Udp
            || self.remote_address.protocol != TransportProtocol::Udp
        {
            return Err(RtpEngineError::InvalidConfiguration(
                "transport protocol must be udp".to_string(),
            ));
        }
        if !self.local_address.same_family(&self.remote_address) {
            return Err(RtpEngineError::InvalidConfiguration(
                "local and remote addresses must share an ip family".to_string(),
            ));
        }
        if self.cname.is_empty() || self.cname.len() > 0xFF {
            return Err(RtpEngineError::InvalidConfiguration(
                "cname must be 1..=255 bytes".to_string(),
            ));
        }
        let mut all_ssrcs = Vec::new();
        for (name, media) in &self.media_sessions {
            media.validate().map_err(|err| {
                RtpEngineError::InvalidConfiguration(format!(
                    "media session {}: {}",
                    name, err
                ))
            })?;
            all_ssrcs.extend(media.ssrcs());
        }
        let count = all_ssrcs.len();
        all_ssrcs.sort_unstable();
        all_ssrcs.dedup();
        if all_ssrcs.len() != count {
            return Err(RtpEngineError::InvalidConfiguration(
                "ssrcs must be unique across all media sessions".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCallback;
    impl MediaSessionCallback for NullCallback {
        fn on_rtp_packets(&self, _packets: Vec<crate::rtp_packet::RtpPacket>) {}
    }

    fn media_config(local_ssrc: u32, remote_ssrc: u32) -> MediaSessionConfig {
        MediaSessionConfig {
            local_ssrc,
            remote_ssrc,
            local_clock_rate_hz: 90_000,
            remote_clock_rate_hz: 90_000,
            local_payload_types: vec![96],
            remote_payload_types: vec![96],
            local_rtx: None,
            remote_rtx: None,
            max_cache_duration_ms: 40,
            direction: MediaDirection::SendRecv,
            rtcp_report_interval_ms: 1000,
            callback: Arc::new(NullCallback),
        }
    }

    #[test]
    fn test_transport_address_parse() {
        assert!(TransportAddress::parse("127.0.0.1", 5000).is_ok());
        assert!(TransportAddress::parse("::1", 5000).is_ok());
        assert!(TransportAddress::parse("nonsense", 5000).is_err());
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let config = SessionConfig {
            local_address: TransportAddress::parse("127.0.0.1", 5000).unwrap(),
            remote_address: TransportAddress::parse("::1", 5002).unwrap(),
            cname: "test".to_string(),
            media_sessions: BTreeMap::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_media_config_direction_requirements() {
        let mut config = media_config(1, 2);
        config.local_payload_types.clear();
        assert!(config.validate().is_err());

        config.direction = MediaDirection::RecvOnly;
        assert!(config.validate().is_ok(), "receive-only needs no local payload types");
    }

    #[test]
    fn test_rtx_validation() {
        let mut rtx = RtxConfig {
            ssrc: 3,
            max_cache_seq_difference: 0,
            payload_type_map: BTreeMap::from([(97, 96)]),
        };
        assert!(rtx.validate().is_err());
        rtx.max_cache_seq_difference = 100;
        assert!(rtx.validate().is_ok());
        rtx.payload_type_map.insert(0x80, 96);
        assert!(rtx.validate().is_err());
    }

    #[test]
    fn test_rtx_lookup_by_either_side() {
        let rtx = RtxConfig {
            ssrc: 3,
            max_cache_seq_difference: 100,
            payload_type_map: BTreeMap::from([(97, 96), (99, 98)]),
        };
        assert_eq!(rtx.associated_for(97), Some(96));
        assert_eq!(rtx.rtx_for(98), Some(99));
        assert_eq!(rtx.rtx_for(97), None);
    }

    #[test]
    fn test_duplicate_ssrc_across_sessions_rejected() {
        let config = SessionConfig {
            local_address: TransportAddress::parse("127.0.0.1", 5000).unwrap(),
            remote_address: TransportAddress::parse("127.0.0.1", 5002).unwrap(),
            cname: "test".to_string(),
            media_sessions: BTreeMap::from([
                ("audio".to_string(), media_config(1, 2)),
                ("video".to_string(), media_config(1, 4)),
            ]),
        };
        assert!(config.validate().is_err());
    }
}
