// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Video codecs an engine may be asked to encode with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Codec requested from the encode engine.
///
/// The harness does not interpret codecs; it passes them through and
/// records which one a run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// MPEG-4 Part 2.
    Mp4v,
    /// HEVC.
    H265,
    /// AVC.
    H264,
    /// AVC, FourCC `avc1`.
    Avc1,
    /// Xvid.
    Xvid,
}

impl Codec {
    /// Every supported codec, in declaration order.
    pub const ALL: [Codec; 5] = [
        Codec::Mp4v,
        Codec::H265,
        Codec::H264,
        Codec::Avc1,
        Codec::Xvid,
    ];

    /// Lowercase identifier used in logs, file names and the metrics log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Mp4v => "mp4v",
            Codec::H265 => "h265",
            Codec::H264 => "h264",
            Codec::Avc1 => "avc1",
            Codec::Xvid => "xvid",
        }
    }

    /// Container extension conventionally used for this codec.
    pub fn container_extension(&self) -> &'static str {
        match self {
            Codec::Mp4v | Codec::H264 | Codec::Avc1 => "mp4",
            Codec::H265 => "mkv",
            Codec::Xvid => "avi",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp4v" => Ok(Codec::Mp4v),
            "h265" | "hevc" => Ok(Codec::H265),
            "h264" => Ok(Codec::H264),
            "avc1" => Ok(Codec::Avc1),
            "xvid" => Ok(Codec::Xvid),
            other => Err(crate::Error::invalid_input(format!(
                "unknown codec '{}', expected one of mp4v, h265, h264, avc1, xvid",
                other
            ))),
        }
    }
}
