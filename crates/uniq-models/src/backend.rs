//! Hardware encoder backends.
//!
//! Each backend knows its FFmpeg encoder name, the hardware acceleration tag,
//! the signature string that shows up in `ffmpeg -encoders`, and its own
//! rate-control arguments. Adding a backend means adding a variant here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A hardware video encoder backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EncoderBackend {
    /// NVIDIA NVENC
    Nvenc,
    /// Intel Quick Sync Video
    QuickSync,
    /// AMD Advanced Media Framework
    Amf,
    /// Apple VideoToolbox
    VideoToolbox,
}

impl EncoderBackend {
    /// Probe order. The first backend that answers wins.
    pub const PRIORITY: [EncoderBackend; 4] = [
        EncoderBackend::Nvenc,
        EncoderBackend::QuickSync,
        EncoderBackend::Amf,
        EncoderBackend::VideoToolbox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc => "nvenc",
            EncoderBackend::QuickSync => "qsv",
            EncoderBackend::Amf => "amf",
            EncoderBackend::VideoToolbox => "videotoolbox",
        }
    }

    /// FFmpeg encoder identifier (`-c:v`).
    pub fn encoder(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc => "h264_nvenc",
            EncoderBackend::QuickSync => "h264_qsv",
            EncoderBackend::Amf => "h264_amf",
            EncoderBackend::VideoToolbox => "h264_videotoolbox",
        }
    }

    /// Hardware acceleration tag for this backend.
    pub fn hwaccel(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc => "cuda",
            EncoderBackend::QuickSync => "qsv",
            EncoderBackend::Amf => "d3d11va",
            EncoderBackend::VideoToolbox => "videotoolbox",
        }
    }

    /// String that must appear in the encoder listing for the backend to count as present.
    pub fn signature(&self) -> &'static str {
        self.encoder()
    }

    /// Backend-specific rate-control arguments for a target bitrate in kbit/s.
    pub fn rate_control_args(&self, bitrate_kbps: u32) -> Vec<String> {
        let kbps = |v: u64| format!("{}k", v);
        let b = bitrate_kbps as u64;

        let args: Vec<String> = match self {
            EncoderBackend::Nvenc => vec![
                "-preset".into(),
                "p4".into(),
                "-rc".into(),
                "vbr".into(),
                "-b:v".into(),
                kbps(b),
                "-maxrate".into(),
                kbps(b * 3 / 2),
                "-bufsize".into(),
                kbps(b * 2),
                "-rc-lookahead".into(),
                "20".into(),
                "-spatial-aq".into(),
                "1".into(),
                "-temporal-aq".into(),
                "1".into(),
                "-b_ref_mode".into(),
                "middle".into(),
            ],
            // QSV is quality-driven; the bitrate jitter does not apply.
            EncoderBackend::QuickSync => vec![
                "-global_quality".into(),
                "23".into(),
                "-preset".into(),
                "balanced".into(),
            ],
            EncoderBackend::Amf => vec![
                "-quality".into(),
                "balanced".into(),
                "-rc".into(),
                "vbr_peak".into(),
                "-b:v".into(),
                kbps(b),
            ],
            EncoderBackend::VideoToolbox => vec![
                "-b:v".into(),
                kbps(b),
                "-allow_sw".into(),
                "1".into(),
                "-realtime".into(),
                "1".into(),
            ],
        };

        args
    }
}

impl fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of hardware capability detection.
///
/// Determined once per process and passed by value to whatever needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "kind", content = "backend", rename_all = "snake_case")]
pub enum CapabilityProfile {
    /// No hardware encoder answered the probe.
    #[default]
    NoneFound,
    /// A usable hardware encoder.
    Hardware(EncoderBackend),
}

impl CapabilityProfile {
    /// The detected backend, if any.
    pub fn backend(&self) -> Option<EncoderBackend> {
        match self {
            CapabilityProfile::NoneFound => None,
            CapabilityProfile::Hardware(backend) => Some(*backend),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CapabilityProfile::Hardware(_))
    }
}

impl From<Option<EncoderBackend>> for CapabilityProfile {
    fn from(backend: Option<EncoderBackend>) -> Self {
        match backend {
            Some(b) => CapabilityProfile::Hardware(b),
            None => CapabilityProfile::NoneFound,
        }
    }
}
