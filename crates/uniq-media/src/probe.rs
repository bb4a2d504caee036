//! FFprobe resolution lookup.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use uniq_models::Resolution;

use crate::command::ProcessRunner;
use crate::error::{MediaError, MediaResult};

/// Default bound for a resolution probe.
pub const DEFAULT_RESOLUTION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Report the first video stream's width and height.
pub async fn probe_resolution(
    runner: &dyn ProcessRunner,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<Resolution> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args: Vec<String> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "json",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path.to_string_lossy().to_string()))
    .collect();

    let output = runner
        .run("ffprobe", &args, timeout)
        .await
        .map_err(|e| match e {
            MediaError::ToolNotFound(_) => MediaError::FfprobeNotFound,
            other => other,
        })?;

    if !output.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(output.stderr),
        });
    }

    parse_resolution(&output.stdout)
}

fn parse_resolution(json: &str) -> MediaResult<Resolution> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok(Resolution::new(w, h)),
        _ => Err(MediaError::InvalidVideo(
            "Video stream has no dimensions".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        let json = r#"{"programs":[],"streams":[{"width":1080,"height":1920}]}"#;
        assert_eq!(parse_resolution(json).unwrap(), Resolution::new(1080, 1920));
    }

    #[test]
    fn test_parse_resolution_no_stream() {
        assert!(matches!(
            parse_resolution(r#"{"streams":[]}"#),
            Err(MediaError::InvalidVideo(_))
        ));
        assert!(matches!(
            parse_resolution(r#"{"streams":[{}]}"#),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_parse_resolution_garbage() {
        assert!(matches!(parse_resolution("1920x1080"), Err(MediaError::JsonParse(_))));
    }
}
