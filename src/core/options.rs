//! Download option presets and the yt-dlp invocation they translate to
//!
//! Every job uses one of two immutable presets: best mp4 video, or mp3
//! audio. Both carry English subtitles converted to srt and the same
//! resilience policy, so transient network trouble is absorbed by the
//! downloader's own retry loop rather than by re-running whole jobs.

use serde::{Deserialize, Serialize};

use crate::core::models::DownloadMode;
use crate::utils::file_utils::{sanitize_filename, truncate_to_bytes, truncate_to_chars};

/// Bytes of the title kept in the output file name
pub const TITLE_MAX_BYTES: usize = 80;

/// Longest output file name, extension included
pub const FILENAME_MAX_CHARS: usize = 120;

/// Retry and pacing parameters handed to the downloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    pub retries: u32,
    pub fragment_retries: u32,
    pub concurrent_fragments: u32,
    /// Seconds to sleep between metadata requests
    pub sleep_requests_s: u32,
    /// Range slept before each download, in seconds
    pub sleep_interval_s: (u32, u32),
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            retries: 20,
            fragment_retries: 20,
            concurrent_fragments: 1,
            sleep_requests_s: 2,
            sleep_interval_s: (2, 5),
        }
    }
}

/// Output naming: `{title, truncated} [{id}].{ext}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTemplate {
    pub title_max_bytes: usize,
    pub max_filename_chars: usize,
    pub windows_filenames: bool,
}

impl Default for OutputTemplate {
    fn default() -> Self {
        Self {
            title_max_bytes: TITLE_MAX_BYTES,
            max_filename_chars: FILENAME_MAX_CHARS,
            windows_filenames: true,
        }
    }
}

impl OutputTemplate {
    /// The template in yt-dlp's own `-o` syntax
    pub fn pattern(&self) -> String {
        format!("%(title).{}B [%(id)s].%(ext)s", self.title_max_bytes)
    }

    pub fn sanitize_title(&self, title: &str) -> String {
        if self.windows_filenames {
            sanitize_filename(title)
        } else {
            title.replace(['/', '\0'], "_")
        }
    }

    /// File name the downloader will produce for a given title and id.
    ///
    /// The title is cut to `title_max_bytes` first; if the whole name is still
    /// too long, the part before the extension is trimmed so the result never
    /// exceeds `max_filename_chars`.
    pub fn render(&self, title: &str, id: &str, ext: &str) -> String {
        let title = self.sanitize_title(title);
        let title = truncate_to_bytes(&title, self.title_max_bytes);
        let stem = format!("{} [{}]", title, id);
        let suffix = format!(".{}", ext);

        let suffix_chars = suffix.chars().count();
        if stem.chars().count() + suffix_chars <= self.max_filename_chars {
            return format!("{}{}", stem, suffix);
        }

        let budget = self.max_filename_chars.saturating_sub(suffix_chars);
        if budget == 0 {
            return truncate_to_chars(&suffix, self.max_filename_chars).to_string();
        }
        format!("{}{}", truncate_to_chars(&stem, budget), suffix)
    }
}

/// Audio post-processing for audio mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioExtraction {
    pub codec: String,
    /// yt-dlp VBR scale, "0" is best
    pub quality: String,
}

/// Immutable option set for one mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub mode: DownloadMode,
    pub format_selector: String,
    pub merge_container: Option<String>,
    pub template: OutputTemplate,
    pub subtitle_langs: Vec<String>,
    pub write_subs: bool,
    pub write_auto_subs: bool,
    pub convert_subs: String,
    pub resilience: ResiliencePolicy,
    pub force_ipv4: bool,
    pub hls_prefer_ffmpeg: bool,
    pub audio: Option<AudioExtraction>,
}

impl DownloadOptions {
    pub fn video() -> Self {
        Self {
            mode: DownloadMode::Video,
            format_selector: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best".to_string(),
            merge_container: Some("mp4".to_string()),
            template: OutputTemplate::default(),
            subtitle_langs: vec!["en".to_string()],
            write_subs: true,
            write_auto_subs: true,
            convert_subs: "srt".to_string(),
            resilience: ResiliencePolicy::default(),
            force_ipv4: true,
            hls_prefer_ffmpeg: true,
            audio: None,
        }
    }

    pub fn audio() -> Self {
        Self {
            mode: DownloadMode::Audio,
            format_selector: "bestaudio/best".to_string(),
            merge_container: None,
            // every English variant: en, en-US, en-GB, ...
            subtitle_langs: vec!["en.*".to_string()],
            audio: Some(AudioExtraction {
                codec: "mp3".to_string(),
                quality: "0".to_string(),
            }),
            ..Self::video()
        }
    }

    pub fn for_mode(mode: DownloadMode) -> Self {
        match mode {
            DownloadMode::Video => Self::video(),
            DownloadMode::Audio => Self::audio(),
        }
    }

    /// Extension of the final media file
    pub fn final_extension(&self) -> &str {
        if let Some(audio) = &self.audio {
            return &audio.codec;
        }
        self.merge_container.as_deref().unwrap_or("mp4")
    }

    /// Option flags without output naming or URL
    pub fn option_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-f".into(), self.format_selector.clone()];

        if let Some(container) = &self.merge_container {
            args.push("--merge-output-format".into());
            args.push(container.clone());
        }

        if let Some(audio) = &self.audio {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                audio.codec.clone(),
                "--audio-quality".to_string(),
                audio.quality.clone(),
            ]);
        }

        if self.write_subs {
            args.push("--write-subs".into());
        }
        if self.write_auto_subs {
            args.push("--write-auto-subs".into());
        }
        if self.write_subs || self.write_auto_subs {
            args.push("--sub-langs".into());
            args.push(self.subtitle_langs.join(","));
            args.push("--convert-subs".into());
            args.push(self.convert_subs.clone());
        }

        if self.hls_prefer_ffmpeg {
            args.push("--hls-prefer-ffmpeg".into());
        }
        if self.force_ipv4 {
            args.push("--force-ipv4".into());
        }

        let policy = &self.resilience;
        args.extend([
            "--sleep-requests".to_string(),
            policy.sleep_requests_s.to_string(),
            "--min-sleep-interval".to_string(),
            policy.sleep_interval_s.0.to_string(),
            "--max-sleep-interval".to_string(),
            policy.sleep_interval_s.1.to_string(),
            "--retries".to_string(),
            policy.retries.to_string(),
            "--fragment-retries".to_string(),
            policy.fragment_retries.to_string(),
            "-N".to_string(),
            policy.concurrent_fragments.to_string(),
        ]);

        args
    }

    /// Full argument vector for the yt-dlp executable
    pub fn to_cli_args(&self, url: &str) -> Vec<String> {
        self.to_cli_args_with(&[], url)
    }

    /// Like [`to_cli_args`](Self::to_cli_args), with `extra` flags placed
    /// before the URL
    pub fn to_cli_args_with(&self, extra: &[String], url: &str) -> Vec<String> {
        let mut args = self.option_args();

        if self.template.windows_filenames {
            args.push("--windows-filenames".into());
        }
        args.push("--trim-filenames".into());
        args.push(self.template.max_filename_chars.to_string());
        args.push("-o".into());
        args.push(self.template.pattern());

        // one progress update per line, so output can be forwarded as it arrives
        args.push("--newline".into());
        args.extend_from_slice(extra);
        args.push("--".into());
        args.push(url.to_string());
        args
    }
}
