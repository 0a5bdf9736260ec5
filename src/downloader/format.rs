// Translates a (media type, quality) choice into yt-dlp's format-selector
// syntax plus the post-processing yt-dlp should run.

use super::{AudioBitrate, Quality, VideoQuality};

/// Audio extraction through ffmpeg after the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: &'static str,
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// Value for yt-dlp's `--format`
    pub selector: String,
    pub extract_audio: Option<AudioExtraction>,
}

impl FormatSelection {
    pub fn for_quality(quality: Quality) -> Self {
        match quality {
            Quality::Video(video) => Self::video(video),
            Quality::Audio(audio) => Self::audio(audio),
        }
    }

    /// Best video stream up to the height ceiling merged with the best audio,
    /// or the best pre-muxed file under the ceiling. Falls back to whatever is
    /// best when nothing fits under the ceiling.
    fn video(quality: VideoQuality) -> Self {
        let h = quality.height();
        Self {
            selector: format!("bv*[height<={h}]+ba/b[height<={h}] / bv*+ba/b"),
            extract_audio: None,
        }
    }

    fn audio(bitrate: AudioBitrate) -> Self {
        Self {
            selector: "bestaudio/best".to_string(),
            extract_audio: Some(AudioExtraction {
                codec: "mp3",
                bitrate_kbps: bitrate.kbps(),
            }),
        }
    }

    pub fn needs_transcoder(&self) -> bool {
        self.extract_audio.is_some()
    }

    /// The yt-dlp arguments for this selection.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--format".to_string(), self.selector.clone()];
        if let Some(extract) = &self.extract_audio {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                extract.codec.to_string(),
                "--audio-quality".to_string(),
                format!("{}K", extract.bitrate_kbps),
            ]);
        }
        args
    }
}
