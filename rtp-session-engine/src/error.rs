//! Error types for the RTP session engine
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


use thiserror::Error;

/// Result type for engine operations
pub type RtpEngineResult<T> = Result<T, RtpEngineError>;

/// Errors that can occur in the session engine
#[derive(Error, Debug)]
pub enum RtpEngineError {
    /// A wire byte violated a packet-format invariant
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A configuration value was rejected at construction
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation not allowed by the session direction policy
    #[error("direction violation: {0}")]
    DirectionViolation(String),

    /// A received packet carried an SSRC this endpoint does not know
    #[error("unexpected ssrc: {0}")]
    UnexpectedSsrc(u32),

    /// A packet carried a payload type outside the configured set
    #[error("unexpected payload type: {0}")]
    UnexpectedPayloadType(u8),

    /// A count or length field exceeds an RFC-defined upper bound
    #[error("oversized field: {0}")]
    Oversized(String),

    /// Socket bind/connect/send failure
    #[error("resource failure: {0}")]
    ResourceFailure(String),
}

impl From<std::io::Error> for RtpEngineError {
    fn from(err: std::io::Error) -> Self {
        RtpEngineError::ResourceFailure(err.to_string())
    }
}
