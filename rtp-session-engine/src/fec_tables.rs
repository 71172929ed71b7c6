//! Pre-tabulated FEC protection masks
//!
//! Two mask profiles for protected groups of up to 12 media packets, indexed
//! by `[num_media - 1][num_fec - 1]`; each entry is `num_fec` rows of 2
//! bytes, one row per FEC packet, one bit per media packet (MSB first).
//! The random profile spreads each parity row across the whole group; the
//! bursty profile covers consecutive runs with one packet of overlap between
//! neighboring rows, which holds up better under burst loss. Groups larger
//! than 12 fall back to the interleaved generator in `fec.rs`.
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


/// Largest group the bursty profile is defined for.
pub(crate) const BURSTY_TABLE_MAX_MEDIA: usize = 12;
/// Largest group either table is defined for.
pub(crate) const TABLE_MAX_MEDIA: usize = 12;

static RANDOM_1: [&[u8]; 1] = [&[0x80, 0x00]];

static RANDOM_2: [&[u8]; 2] = [
    &[0xC0, 0x00],
    &[0x80, 0x00, 0x40, 0x00],
];

static RANDOM_3: [&[u8]; 3] = [
    &[0xE0, 0x00],
    &[0xA0, 0x00, 0x40, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00],
];

static RANDOM_4: [&[u8]; 4] = [
    &[0xF0, 0x00],
    &[0xA0, 0x00, 0x50, 0x00],
    &[0x90, 0x00, 0x40, 0x00, 0x20, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00],
];

static RANDOM_5: [&[u8]; 5] = [
    &[0xF8, 0x00],
    &[0xA8, 0x00, 0x50, 0x00],
    &[0x90, 0x00, 0x48, 0x00, 0x20, 0x00],
    &[0x88, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00],
];

static RANDOM_6: [&[u8]; 6] = [
    &[0xFC, 0x00],
    &[0xA8, 0x00, 0x54, 0x00],
    &[0x90, 0x00, 0x48, 0x00, 0x24, 0x00],
    &[0x88, 0x00, 0x44, 0x00, 0x20, 0x00, 0x10, 0x00],
    &[0x84, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00],
];

static RANDOM_7: [&[u8]; 7] = [
    &[0xFE, 0x00],
    &[0xAA, 0x00, 0x54, 0x00],
    &[0x92, 0x00, 0x48, 0x00, 0x24, 0x00],
    &[0x88, 0x00, 0x44, 0x00, 0x22, 0x00, 0x10, 0x00],
    &[0x84, 0x00, 0x42, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00],
    &[0x82, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00],
];

static RANDOM_8: [&[u8]; 8] = [
    &[0xFF, 0x00],
    &[0xAA, 0x00, 0x55, 0x00],
    &[0x92, 0x00, 0x49, 0x00, 0x24, 0x00],
    &[0x88, 0x00, 0x44, 0x00, 0x22, 0x00, 0x11, 0x00],
    &[0x84, 0x00, 0x42, 0x00, 0x21, 0x00, 0x10, 0x00, 0x08, 0x00],
    &[0x82, 0x00, 0x41, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00],
    &[0x81, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00],
];

static RANDOM_9: [&[u8]; 9] = [
    &[0xFF, 0x80],
    &[0xAA, 0x80, 0x55, 0x00],
    &[0x92, 0x00, 0x49, 0x00, 0x24, 0x80],
    &[0x88, 0x80, 0x44, 0x00, 0x22, 0x00, 0x11, 0x00],
    &[0x84, 0x00, 0x42, 0x00, 0x21, 0x00, 0x10, 0x80, 0x08, 0x00],
    &[0x82, 0x00, 0x41, 0x00, 0x20, 0x80, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00],
    &[0x81, 0x00, 0x40, 0x80, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00],
    &[0x80, 0x80, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80],
];

static RANDOM_10: [&[u8]; 10] = [
    &[0xFF, 0xC0],
    &[0xAA, 0x80, 0x55, 0x40],
    &[0x92, 0x40, 0x49, 0x00, 0x24, 0x80],
    &[0x88, 0x80, 0x44, 0x40, 0x22, 0x00, 0x11, 0x00],
    &[0x84, 0x00, 0x42, 0x00, 0x21, 0x00, 0x10, 0x80, 0x08, 0x40],
    &[0x82, 0x00, 0x41, 0x00, 0x20, 0x80, 0x10, 0x40, 0x08, 0x00, 0x04, 0x00],
    &[0x81, 0x00, 0x40, 0x80, 0x20, 0x40, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00],
    &[0x80, 0x80, 0x40, 0x40, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00],
    &[0x80, 0x40, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40],
];

static RANDOM_11: [&[u8]; 11] = [
    &[0xFF, 0xE0],
    &[0xAA, 0xA0, 0x55, 0x40],
    &[0x92, 0x40, 0x49, 0x20, 0x24, 0x80],
    &[0x88, 0x80, 0x44, 0x40, 0x22, 0x20, 0x11, 0x00],
    &[0x84, 0x20, 0x42, 0x00, 0x21, 0x00, 0x10, 0x80, 0x08, 0x40],
    &[0x82, 0x00, 0x41, 0x00, 0x20, 0x80, 0x10, 0x40, 0x08, 0x20, 0x04, 0x00],
    &[0x81, 0x00, 0x40, 0x80, 0x20, 0x40, 0x10, 0x20, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00],
    &[0x80, 0x80, 0x40, 0x40, 0x20, 0x20, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00],
    &[0x80, 0x40, 0x40, 0x20, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80],
    &[0x80, 0x20, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40, 0x00, 0x20],
];

static RANDOM_12: [&[u8]; 12] = [
    &[0xFF, 0xF0],
    &[0xAA, 0xA0, 0x55, 0x50],
    &[0x92, 0x40, 0x49, 0x20, 0x24, 0x90],
    &[0x88, 0x80, 0x44, 0x40, 0x22, 0x20, 0x11, 0x10],
    &[0x84, 0x20, 0x42, 0x10, 0x21, 0x00, 0x10, 0x80, 0x08, 0x40],
    &[0x82, 0x00, 0x41, 0x00, 0x20, 0x80, 0x10, 0x40, 0x08, 0x20, 0x04, 0x10],
    &[0x81, 0x00, 0x40, 0x80, 0x20, 0x40, 0x10, 0x20, 0x08, 0x10, 0x04, 0x00,
      0x02, 0x00],
    &[0x80, 0x80, 0x40, 0x40, 0x20, 0x20, 0x10, 0x10, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00],
    &[0x80, 0x40, 0x40, 0x20, 0x20, 0x10, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80],
    &[0x80, 0x20, 0x40, 0x10, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40],
    &[0x80, 0x10, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40, 0x00, 0x20],
    &[0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10, 0x00, 0x08, 0x00, 0x04, 0x00,
      0x02, 0x00, 0x01, 0x00, 0x00, 0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0x10],
];

static BURSTY_1: [&[u8]; 1] = [&[0x80, 0x00]];

static BURSTY_2: [&[u8]; 2] = [
    &[0xC0, 0x00],
    &[0x80, 0x00, 0xC0, 0x00],
];

static BURSTY_3: [&[u8]; 3] = [
    &[0xE0, 0x00],
    &[0xC0, 0x00, 0x60, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00],
];

static BURSTY_4: [&[u8]; 4] = [
    &[0xF0, 0x00],
    &[0xC0, 0x00, 0x70, 0x00],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00],
];

static BURSTY_5: [&[u8]; 5] = [
    &[0xF8, 0x00],
    &[0xE0, 0x00, 0x38, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00],
];

static BURSTY_6: [&[u8]; 6] = [
    &[0xFC, 0x00],
    &[0xE0, 0x00, 0x3C, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00],
];

static BURSTY_7: [&[u8]; 7] = [
    &[0xFE, 0x00],
    &[0xF0, 0x00, 0x1E, 0x00],
    &[0xE0, 0x00, 0x38, 0x00, 0x0E, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00],
];

static BURSTY_8: [&[u8]; 8] = [
    &[0xFF, 0x00],
    &[0xF0, 0x00, 0x1F, 0x00],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00, 0x03, 0x00],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00,
      0x03, 0x00],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00, 0x03, 0x00],
];

static BURSTY_9: [&[u8]; 9] = [
    &[0xFF, 0x80],
    &[0xF8, 0x00, 0x0F, 0x80],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x80],
    &[0xE0, 0x00, 0x38, 0x00, 0x0E, 0x00, 0x03, 0x80],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0x80],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00, 0x03, 0x00, 0x01, 0x80],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00,
      0x01, 0x80],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00,
      0x03, 0x00, 0x01, 0x80],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00, 0x03, 0x00, 0x01, 0x80],
];

static BURSTY_10: [&[u8]; 10] = [
    &[0xFF, 0xC0],
    &[0xF8, 0x00, 0x0F, 0xC0],
    &[0xF0, 0x00, 0x1E, 0x00, 0x03, 0xC0],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x00, 0x01, 0xC0],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0xC0],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0x80, 0x00, 0xC0],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00, 0x03, 0x00, 0x01, 0x80,
      0x00, 0xC0],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00,
      0x01, 0x80, 0x00, 0xC0],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00,
      0x03, 0x00, 0x01, 0x80, 0x00, 0xC0],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00, 0x03, 0x00, 0x01, 0x80, 0x00, 0xC0],
];

static BURSTY_11: [&[u8]; 11] = [
    &[0xFF, 0xE0],
    &[0xFC, 0x00, 0x07, 0xE0],
    &[0xF0, 0x00, 0x1F, 0x00, 0x01, 0xE0],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x80, 0x00, 0xE0],
    &[0xE0, 0x00, 0x38, 0x00, 0x0E, 0x00, 0x03, 0x80, 0x00, 0xE0],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0xC0, 0x00, 0x60],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0x80, 0x00, 0xC0,
      0x00, 0x60],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00, 0x03, 0x00, 0x01, 0x80,
      0x00, 0xC0, 0x00, 0x60],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00,
      0x01, 0x80, 0x00, 0xC0, 0x00, 0x60],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00,
      0x03, 0x00, 0x01, 0x80, 0x00, 0xC0, 0x00, 0x60],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00, 0x03, 0x00, 0x01, 0x80, 0x00, 0xC0, 0x00, 0x60],
];

static BURSTY_12: [&[u8]; 12] = [
    &[0xFF, 0xF0],
    &[0xFC, 0x00, 0x07, 0xF0],
    &[0xF0, 0x00, 0x1F, 0x00, 0x01, 0xF0],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x80, 0x00, 0xF0],
    &[0xE0, 0x00, 0x3C, 0x00, 0x07, 0x00, 0x01, 0xC0, 0x00, 0x70],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0xC0, 0x00, 0x70],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0xC0, 0x00, 0x60,
      0x00, 0x30],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x07, 0x00, 0x01, 0x80, 0x00, 0xC0,
      0x00, 0x60, 0x00, 0x30],
    &[0xC0, 0x00, 0x70, 0x00, 0x1C, 0x00, 0x06, 0x00, 0x03, 0x00, 0x01, 0x80,
      0x00, 0xC0, 0x00, 0x60, 0x00, 0x30],
    &[0xC0, 0x00, 0x70, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x03, 0x00,
      0x01, 0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30],
    &[0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00, 0x06, 0x00,
      0x03, 0x00, 0x01, 0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30],
    &[0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x18, 0x00, 0x0C, 0x00,
      0x06, 0x00, 0x03, 0x00, 0x01, 0x80, 0x00, 0xC0, 0x00, 0x60, 0x00, 0x30],
];

pub(crate) static PACKET_MASKS_RANDOM: [&[&[u8]]; 12] = [
    &RANDOM_1, &RANDOM_2, &RANDOM_3, &RANDOM_4, &RANDOM_5, &RANDOM_6,
    &RANDOM_7, &RANDOM_8, &RANDOM_9, &RANDOM_10, &RANDOM_11, &RANDOM_12,
];

pub(crate) static PACKET_MASKS_BURSTY: [&[&[u8]]; 12] = [
    &BURSTY_1, &BURSTY_2, &BURSTY_3, &BURSTY_4, &BURSTY_5, &BURSTY_6,
    &BURSTY_7, &BURSTY_8, &BURSTY_9, &BURSTY_10, &BURSTY_11, &BURSTY_12,
];
