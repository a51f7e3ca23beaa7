// Copyright 2025 Dustin McAfee
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

//! VNC authentication implementation.
//!
//! This module implements the client side of VNC Authentication (security
//! type 2) as specified in RFC 6143 Section 7.2.2: the server's 16-byte
//! challenge is encrypted with DES in ECB mode using the password as the
//! key, with a VNC-specific quirk where each key byte has its bits reversed.
//!
//! The DES primitive is self-contained (FIPS 46-3 tables and construction)
//! rather than pulled from a crypto crate: single-block legacy DES is all
//! that is needed, and modern crypto stacks treat it as a legacy algorithm.
//!
//! # Security Note
//!
//! VNC Authentication is a legacy protocol with known weaknesses (the
//! password is effectively limited to 8 bytes of key material). It should
//! only be used on trusted networks or through an encrypted tunnel.

// Initial permutation (IP), 1-based bit positions.
#[rustfmt::skip]
const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10,  2,
    60, 52, 44, 36, 28, 20, 12,  4,
    62, 54, 46, 38, 30, 22, 14,  6,
    64, 56, 48, 40, 32, 24, 16,  8,
    57, 49, 41, 33, 25, 17,  9,  1,
    59, 51, 43, 35, 27, 19, 11,  3,
    61, 53, 45, 37, 29, 21, 13,  5,
    63, 55, 47, 39, 31, 23, 15,  7,
];

// Final permutation (IP^-1).
#[rustfmt::skip]
const FP: [u8; 64] = [
    40,  8, 48, 16, 56, 24, 64, 32,
    39,  7, 47, 15, 55, 23, 63, 31,
    38,  6, 46, 14, 54, 22, 62, 30,
    37,  5, 45, 13, 53, 21, 61, 29,
    36,  4, 44, 12, 52, 20, 60, 28,
    35,  3, 43, 11, 51, 19, 59, 27,
    34,  2, 42, 10, 50, 18, 58, 26,
    33,  1, 41,  9, 49, 17, 57, 25,
];

// Expansion permutation E: 32 bits -> 48 bits.
#[rustfmt::skip]
const E: [u8; 48] = [
    32,  1,  2,  3,  4,  5,
     4,  5,  6,  7,  8,  9,
     8,  9, 10, 11, 12, 13,
    12, 13, 14, 15, 16, 17,
    16, 17, 18, 19, 20, 21,
    20, 21, 22, 23, 24, 25,
    24, 25, 26, 27, 28, 29,
    28, 29, 30, 31, 32,  1,
];

// Permutation P applied after S-box substitution.
#[rustfmt::skip]
const P: [u8; 32] = [
    16,  7, 20, 21, 29, 12, 28, 17,
     1, 15, 23, 26,  5, 18, 31, 10,
     2,  8, 24, 14, 32, 27,  3,  9,
    19, 13, 30,  6, 22, 11,  4, 25,
];

// Permuted choice 1: 64-bit key -> 56 bits (C28 || D28).
#[rustfmt::skip]
const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17,  9,
     1, 58, 50, 42, 34, 26, 18,
    10,  2, 59, 51, 43, 35, 27,
    19, 11,  3, 60, 52, 44, 36,
    63, 55, 47, 39, 31, 23, 15,
     7, 62, 54, 46, 38, 30, 22,
    14,  6, 61, 53, 45, 37, 29,
    21, 13,  5, 28, 20, 12,  4,
];

// Permuted choice 2: 56-bit CD -> 48-bit round subkey.
#[rustfmt::skip]
const PC2: [u8; 48] = [
    14, 17, 11, 24,  1,  5,
     3, 28, 15,  6, 21, 10,
    23, 19, 12,  4, 26,  8,
    16,  7, 27, 20, 13,  2,
    41, 52, 31, 37, 47, 55,
    30, 40, 51, 45, 33, 48,
    44, 49, 39, 56, 34, 53,
    46, 42, 50, 36, 29, 32,
];

// Left-rotation count for each of the 16 rounds.
#[rustfmt::skip]
const KEY_SHIFTS: [u8; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

// The eight S-boxes, each 4 rows x 16 columns.
#[rustfmt::skip]
const S_BOXES: [[u8; 64]; 8] = [
    [14,  4, 13,  1,  2, 15, 11,  8,  3, 10,  6, 12,  5,  9,  0,  7,
      0, 15,  7,  4, 14,  2, 13,  1, 10,  6, 12, 11,  9,  5,  3,  8,
      4,  1, 14,  8, 13,  6,  2, 11, 15, 12,  9,  7,  3, 10,  5,  0,
     15, 12,  8,  2,  4,  9,  1,  7,  5, 11,  3, 14, 10,  0,  6, 13],
    [15,  1,  8, 14,  6, 11,  3,  4,  9,  7,  2, 13, 12,  0,  5, 10,
      3, 13,  4,  7, 15,  2,  8, 14, 12,  0,  1, 10,  6,  9, 11,  5,
      0, 14,  7, 11, 10,  4, 13,  1,  5,  8, 12,  6,  9,  3,  2, 15,
     13,  8, 10,  1,  3, 15,  4,  2, 11,  6,  7, 12,  0,  5, 14,  9],
    [10,  0,  9, 14,  6,  3, 15,  5,  1, 13, 12,  7, 11,  4,  2,  8,
     13,  7,  0,  9,  3,  4,  6, 10,  2,  8,  5, 14, 12, 11, 15,  1,
     13,  6,  4,  9,  8, 15,  3,  0, 11,  1,  2, 12,  5, 10, 14,  7,
      1, 10, 13,  0,  6,  9,  8,  7,  4, 15, 14,  3, 11,  5,  2, 12],
    [ 7, 13, 14,  3,  0,  6,  9, 10,  1,  2,  8,  5, 11, 12,  4, 15,
     13,  8, 11,  5,  6, 15,  0,  3,  4,  7,  2, 12,  1, 10, 14,  9,
     10,  6,  9,  0, 12, 11,  7, 13, 15,  1,  3, 14,  5,  2,  8,  4,
      3, 15,  0,  6, 10,  1, 13,  8,  9,  4,  5, 11, 12,  7,  2, 14],
    [ 2, 12,  4,  1,  7, 10, 11,  6,  8,  5,  3, 15, 13,  0, 14,  9,
     14, 11,  2, 12,  4,  7, 13,  1,  5,  0, 15, 10,  3,  9,  8,  6,
      4,  2,  1, 11, 10, 13,  7,  8, 15,  9, 12,  5,  6,  3,  0, 14,
     11,  8, 12,  7,  1, 14,  2, 13,  6, 15,  0,  9, 10,  4,  5,  3],
    [12,  1, 10, 15,  9,  2,  6,  8,  0, 13,  3,  4, 14,  7,  5, 11,
     10, 15,  4,  2,  7, 12,  9,  5,  6,  1, 13, 14,  0, 11,  3,  8,
      9, 14, 15,  5,  2,  8, 12,  3,  7,  0,  4, 10,  1, 13, 11,  6,
      4,  3,  2, 12,  9,  5, 15, 10, 11, 14,  1,  7,  6,  0,  8, 13],
    [ 4, 11,  2, 14, 15,  0,  8, 13,  3, 12,  9,  7,  5, 10,  6,  1,
     13,  0, 11,  7,  4,  9,  1, 10, 14,  3,  5, 12,  2, 15,  8,  6,
      1,  4, 11, 13, 12,  3,  7, 14, 10, 15,  6,  8,  0,  5,  9,  2,
      6, 11, 13,  8,  1,  4, 10,  7,  9,  5,  0, 15, 14,  2,  3, 12],
    [13,  2,  8,  4,  6, 15, 11,  1, 10,  9,  3, 14,  5,  0, 12,  7,
      1, 15, 13,  8, 10,  3,  7,  4, 12,  5,  6, 11,  0, 14,  9,  2,
      7, 11,  4,  1,  9, 12, 14,  2,  0,  6, 10, 13, 15,  3,  5,  8,
      2,  1, 14,  7,  4, 10,  8, 13, 15, 12,  9,  0,  3,  5,  6, 11],
];

/// Apply a DES permutation table to a right-aligned `width`-bit value.
///
/// Table entries are 1-based bit positions counted from the most
/// significant bit, as FIPS 46-3 writes them. The result has one bit per
/// table entry, right-aligned.
fn permute(value: u64, width: u32, table: &[u8]) -> u64 {
    let mut out = 0u64;
    for &src in table {
        out = (out << 1) | ((value >> (width - u32::from(src))) & 1);
    }
    out
}

/// Rotate the low 28 bits of `half` left by `n` positions.
fn rotate28(half: u32, n: u8) -> u32 {
    ((half << n) | (half >> (28 - n))) & 0x0FFF_FFFF
}

/// Derive the 16 round subkeys (48 bits each, right-aligned) from a key.
fn key_schedule(key: u64) -> [u64; 16] {
    let pc1 = permute(key, 64, &PC1);
    let mut c = ((pc1 >> 28) & 0x0FFF_FFFF) as u32;
    let mut d = (pc1 & 0x0FFF_FFFF) as u32;

    let mut subkeys = [0u64; 16];
    for (round, &shift) in KEY_SHIFTS.iter().enumerate() {
        c = rotate28(c, shift);
        d = rotate28(d, shift);
        let cd = (u64::from(c) << 28) | u64::from(d);
        subkeys[round] = permute(cd, 56, &PC2);
    }
    subkeys
}

/// The Feistel function f(R, K): expand, mix with the subkey, substitute
/// through the S-boxes, permute.
fn feistel(r: u32, subkey: u64) -> u32 {
    let mixed = permute(u64::from(r), 32, &E) ^ subkey;

    let mut substituted = 0u32;
    for (i, sbox) in S_BOXES.iter().enumerate() {
        let six = ((mixed >> (48 - 6 * (i + 1))) & 0x3F) as usize;
        // Row is the outer bit pair (b1, b6); column is the middle four.
        let row = ((six >> 4) & 0b10) | (six & 1);
        let col = (six >> 1) & 0xF;
        substituted = (substituted << 4) | u32::from(sbox[row * 16 + col]);
    }

    permute(u64::from(substituted), 32, &P) as u32
}

/// Encrypt a single 8-byte block with an 8-byte key using DES-ECB.
fn encrypt_block(key: &[u8; 8], block: &[u8; 8]) -> [u8; 8] {
    let subkeys = key_schedule(u64::from_be_bytes(*key));

    let permuted = permute(u64::from_be_bytes(*block), 64, &IP);
    let mut left = (permuted >> 32) as u32;
    let mut right = permuted as u32;

    for subkey in subkeys {
        let next = left ^ feistel(right, subkey);
        left = right;
        right = next;
    }

    // Pre-output swaps the halves: R16 || L16.
    let preout = (u64::from(right) << 32) | u64::from(left);
    permute(preout, 64, &FP).to_be_bytes()
}

/// Reverses the bits within a single byte.
///
/// VNC authentication inherits a historical quirk from the original
/// reference implementation: password bytes have their bits reversed
/// before being used as the DES key.
fn reverse_bits(byte: u8) -> u8 {
    let mut result = 0u8;
    for i in 0..8 {
        if byte & (1 << i) != 0 {
            result |= 1 << (7 - i);
        }
    }
    result
}

/// Build the DES key for a VNC password.
///
/// The password is taken as Latin-1 bytes, truncated to 8 bytes or padded
/// with zeros, and each byte is bit-reversed.
fn prepare_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (slot, ch) in key.iter_mut().zip(password.chars()) {
        let code = ch as u32;
        // Latin-1 projection; characters outside it degrade to '?'.
        let byte = if code <= 0xFF { code as u8 } else { b'?' };
        *slot = reverse_bits(byte);
    }
    key
}

/// Encrypt a 16-byte VNC authentication challenge with the password.
///
/// The challenge is encrypted as two independent 8-byte DES-ECB blocks;
/// the result is the 16-byte response to send back to the server.
pub fn encrypt_challenge(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let key = prepare_key(password);

    let mut first = [0u8; 8];
    first.copy_from_slice(&challenge[0..8]);
    let mut second = [0u8; 8];
    second.copy_from_slice(&challenge[8..16]);

    let mut response = [0u8; 16];
    response[0..8].copy_from_slice(&encrypt_block(&key, &first));
    response[8..16].copy_from_slice(&encrypt_block(&key, &second));
    response
}
