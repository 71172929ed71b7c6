//! Bidirectional RTP/RTCP session engine with loss recovery
//!
//! This crate provides the media transport core for loss-resilient RTP
//! delivery over a single UDP flow, including:
//! - RTP packet parsing and construction
//! - RTCP compound packets (SR/RR, SDES, BYE, APP, generic NACK)
//! - ULP-FEC (RFC 5109) encoding and decoding
//! - RFC 4588 retransmission with NACK-driven recovery
//! - Receive-side reordering with loss tracking
//! - A three-worker runtime (signalling / protocol / network)
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


pub mod clock;
pub mod config;
pub mod error;
pub mod fec;
mod fec_tables;
pub mod media_session;
pub mod router;
pub mod rtcp;
pub mod rtcp_receiver;
pub mod rtcp_sender;
pub mod rtp_packet;
pub mod rtp_receiver;
pub mod rtp_sender;
pub mod seq;
pub mod session;
pub mod transceiver;
pub mod worker;

// Re-export main types
pub use clock::NtpTime;
pub use config::{
    MediaDirection, MediaSessionConfig, RtxConfig, SessionConfig, TransportAddress,
    TransportProtocol,
};
pub use error::{RtpEngineError, RtpEngineResult};
pub use fec::{
    FecDecoderConfig, FecEncoderConfig, FecMaskType, ImportantProtectionMode, UlpFecDecoder,
    UlpFecEncoder,
};
pub use media_session::{MediaSession, MediaSessionCallback};
pub use rtcp::{
    Bye, Nack, ReceiverReport, ReportBlock, RtcpPacket, Sdes, SenderReport,
};
pub use rtcp_sender::RemoteSenderInfo;
pub use rtp_packet::{ExtensionHeader, RtpHeader, RtpPacket};
pub use rtp_receiver::{ReceiverOutput, RtpReceiver, RtpReceiverConfig, RtpReceiverStats};
pub use rtp_sender::{LocalSenderInfo, RtpSender, RtpSenderConfig};
pub use session::Session;
pub use transceiver::{RtpRtcpTransceiver, SessionEvents};
pub use worker::Worker;
