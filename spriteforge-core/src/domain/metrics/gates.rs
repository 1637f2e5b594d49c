// spriteforge-core/src/domain/metrics/gates.rs
//
// Hard gates run before any soft metric and fail fast: a candidate that is
// structurally broken is not worth scoring.

use serde::{Deserialize, Serialize};

use crate::domain::reason;

pub const FILE_SIZE_MIN: u64 = 1024; // 1 KB
pub const FILE_SIZE_MAX: u64 = 500 * 1024; // 500 KB

/// What the decoder could tell us about the candidate file. `decoded` is
/// None when the bytes were not a decodable image at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFileInfo {
    pub byte_len: u64,
    pub decoded: Option<DecodedInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecodedInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bits_per_channel: u8,
}

/// Returns the first failed gate's reason code, or None when all pass.
pub fn check_hard_gates(info: &CandidateFileInfo, target_size: u32) -> Option<&'static str> {
    // Decodability first: every other gate needs the decoded header.
    let decoded = match &info.decoded {
        Some(d) => d,
        None => return Some(reason::HF03_DECODE_FAILED),
    };

    if decoded.width != target_size || decoded.height != target_size {
        return Some(reason::HF01_DIMENSION_MISMATCH);
    }

    if decoded.channels != 4 {
        return Some(reason::HF02_CHANNEL_COUNT);
    }

    if info.byte_len < FILE_SIZE_MIN || info.byte_len > FILE_SIZE_MAX {
        return Some(reason::HF04_FILE_SIZE);
    }

    if decoded.bits_per_channel != 8 {
        return Some(reason::HF05_BIT_DEPTH);
    }

    None
}
