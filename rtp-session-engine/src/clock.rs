//! Wallclock and NTP time helpers
//!
//! RTCP sender reports carry 64-bit NTP timestamps (Q32.32 seconds since
//! 1900); the rest of the engine works in UTC milliseconds.
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


use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
const NTP_JAN_1970_SECS: u64 = 2_208_988_800;
/// NTP fractional units per second (2^32).
const NTP_FRACTIONS_PER_SECOND: u64 = 0x1_0000_0000;

/// 64-bit NTP timestamp in Q32.32 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTime(u64);

impl NtpTime {
    pub fn new(value: u64) -> Self {
        NtpTime(value)
    }

    pub fn from_parts(seconds: u32, fractions: u32) -> Self {
        NtpTime(((seconds as u64) << 32) | fractions as u64)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn seconds(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn fractions(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// The middle 32 bits, as referenced by RTCP report blocks (LSR).
    pub fn middle_32(self) -> u32 {
        ((self.0 << 16) >> 32) as u32
    }

    /// NTP standard (RFC 1305, section 3.1) states value 0 is invalid.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Current UTC time in milliseconds since the Unix epoch.
pub fn unix_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current time as a 64-bit NTP timestamp.
pub fn ntp_time_now() -> NtpTime {
    ntp_from_unix_millis(unix_time_millis())
}

/// Converts UTC milliseconds since the Unix epoch to an NTP timestamp.
pub fn ntp_from_unix_millis(unix_ms: u64) -> NtpTime {
    let ntp_ms = unix_ms + NTP_JAN_1970_SECS * 1000;
    let seconds = ntp_ms / 1000;
    let fractions = (ntp_ms % 1000) * NTP_FRACTIONS_PER_SECOND / 1000;
    NtpTime((seconds << 32) | fractions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_parts_round_trip() {
        let ntp = NtpTime::from_parts(0x8911_2233, 0x4000_0000);
        assert_eq!(ntp.seconds(), 0x8911_2233);
        assert_eq!(ntp.fractions(), 0x4000_0000);
        assert_eq!(ntp.middle_32(), 0x2233_4000);
    }

    #[test]
    fn test_ntp_from_unix_millis() {
        // Exactly the Unix epoch.
        let ntp = ntp_from_unix_millis(0);
        assert_eq!(ntp.seconds() as u64, NTP_JAN_1970_SECS);
        assert_eq!(ntp.fractions(), 0);
        // Half a second is half the fraction space.
        let ntp = ntp_from_unix_millis(500);
        assert_eq!(ntp.fractions(), (NTP_FRACTIONS_PER_SECOND / 2) as u32);
    }

    #[test]
    fn test_zero_is_invalid() {
        assert!(!NtpTime::default().is_valid());
        assert!(ntp_from_unix_millis(1).is_valid());
    }
}
