/// FFmpeg-backed video encoder
///
/// Arguments are built as a vector and handed straight to the process, never
/// through a shell.
use super::{EncodeJob, TranscodeError, VideoEncoder};
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use tracing::debug;

/// Last part of encoder stderr kept in errors
const STDERR_TAIL_BYTES: usize = 2048;

/// Output container and codec pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscodeProfile {
    /// H.264 + AAC in MP4, plays everywhere
    #[default]
    H264Mp4,
    /// VP9 with alpha + Opus in WebM, for videos with transparency
    Vp9AlphaWebm,
}

impl TranscodeProfile {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::H264Mp4 => "mp4",
            Self::Vp9AlphaWebm => "webm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::H264Mp4 => "video/mp4",
            Self::Vp9AlphaWebm => "video/webm",
        }
    }
}

impl FromStr for TranscodeProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "mp4" | "h264-mp4" => Ok(Self::H264Mp4),
            "vp9" | "webm" | "vp9-alpha-webm" => Ok(Self::Vp9AlphaWebm),
            other => Err(format!("unknown transcode profile: {other}")),
        }
    }
}

/// Typed ffmpeg invocation for one encode job
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    args: Vec<OsString>,
}

impl FfmpegCommand {
    pub fn for_job(job: &EncodeJob) -> Self {
        let mut cmd = Self { args: Vec::new() };
        cmd.push_all(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
        cmd.push("-i").push(job.input.as_os_str());

        if let Some(overlay) = &job.overlay {
            cmd.push("-i").push(overlay.as_os_str());
            let pix_fmt = match job.profile {
                TranscodeProfile::H264Mp4 => "yuv420p",
                TranscodeProfile::Vp9AlphaWebm => "yuva420p",
            };
            // Photo scaled to a quarter of the video width, inset bottom-right.
            let graph = format!(
                "[1:v][0:v]scale2ref=w=trunc(main_w/8)*2:h=trunc(ow/dar/2)*2[ov][base];\
                 [base][ov]overlay=W-w-10:H-h-10,format={pix_fmt}[v]"
            );
            cmd.push("-filter_complex").push(graph);
            cmd.push_all(["-map", "[v]", "-map", "0:a?"]);
        }

        let rate = format!("{}k", job.bitrate_kbps);
        let bufsize = format!("{}k", job.bitrate_kbps.saturating_mul(2));

        match job.profile {
            TranscodeProfile::H264Mp4 => {
                cmd.push_all(["-c:v", "libx264", "-preset", "veryfast"]);
                cmd.push("-b:v").push(rate.clone());
                cmd.push("-maxrate").push(rate);
                cmd.push("-bufsize").push(bufsize);
                cmd.push_all(["-pix_fmt", "yuv420p", "-movflags", "+faststart"]);
                cmd.push_all(["-c:a", "aac", "-b:a", "96k"]);
            }
            TranscodeProfile::Vp9AlphaWebm => {
                cmd.push_all(["-c:v", "libvpx-vp9", "-pix_fmt", "yuva420p"]);
                cmd.push("-b:v").push(rate.clone());
                cmd.push("-maxrate").push(rate);
                cmd.push("-bufsize").push(bufsize);
                cmd.push_all(["-auto-alt-ref", "0", "-deadline", "good", "-row-mt", "1"]);
                cmd.push_all(["-c:a", "libopus", "-b:a", "64k"]);
            }
        }

        cmd.push(job.output.as_os_str());
        cmd
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn push(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn push_all<const N: usize>(&mut self, args: [&str; N]) -> &mut Self {
        self.args.extend(args.iter().map(OsString::from));
        self
    }
}

/// Runs the ffmpeg binary as a child process.
///
/// The child is killed if the encode future is dropped, so a stage timeout
/// does not leave orphaned encoders behind.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), TranscodeError> {
        let command = FfmpegCommand::for_job(job);
        debug!(
            program = %self.ffmpeg_path,
            bitrate_kbps = job.bitrate_kbps,
            output = %job.output.display(),
            "running encoder"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::EncoderFailed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
