//! FFmpeg argument construction.
//!
//! Arguments are produced as a vector passed straight to the process
//! spawner, never as a shell string. Invalid format/codec combinations are
//! not validated here; ffmpeg rejects them at run time.

use std::path::Path;

use crate::media::{OutputFormat, QualityTier};

/// Codec and bitrate selection for the audio stream of the output.
///
/// flac ignores bitrate and forces the lossless codec; wav forces 16-bit
/// PCM; mp3 forces libmp3lame; aac/m4a/mp4 force AAC. Everything else takes
/// the libmp3lame default path.
fn audio_codec_args(format: OutputFormat, quality: QualityTier) -> Vec<String> {
    match format {
        OutputFormat::Flac => vec!["-c:a".into(), "flac".into()],
        OutputFormat::Wav => vec!["-c:a".into(), "pcm_s16le".into()],
        OutputFormat::Mp3 => vec![
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            quality.bitrate().into(),
        ],
        OutputFormat::Aac | OutputFormat::M4a | OutputFormat::Mp4 => vec![
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            quality.bitrate().into(),
        ],
        _ => vec![
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            quality.bitrate().into(),
        ],
    }
}

/// Build the full ffmpeg argument list for one input/output pair.
pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    quality: QualityTier,
    filter_chain: Option<&str>,
    keep_metadata: bool,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), input.to_string_lossy().into_owned()];

    if keep_metadata {
        args.push("-map_metadata".into());
        args.push("0".into());
    }

    if format.is_audio() {
        // Audio output: drop the video stream
        args.push("-vn".into());
        args.extend(audio_codec_args(format, quality));
    } else {
        // Video container output: copy the video stream to avoid a re-encode
        args.push("-c:v".into());
        args.push("copy".into());
        args.extend(audio_codec_args(format, quality));
    }

    if let Some(chain) = filter_chain {
        args.push("-af".into());
        args.push(chain.to_string());
    }

    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn build(format: OutputFormat, quality: QualityTier) -> Vec<String> {
        build_ffmpeg_args(
            &PathBuf::from("/in/song.wav"),
            &PathBuf::from("/out/song.mp3"),
            format,
            quality,
            None,
            false,
        )
    }

    #[test]
    fn mp3_high_selects_lame_320k() {
        let args = build(OutputFormat::Mp3, QualityTier::High);
        let joined = args.join(" ");
        assert!(joined.contains("-c:a libmp3lame -b:a 320k"));
    }

    #[test]
    fn mp3_tiers_map_to_documented_bitrates() {
        for (tier, rate) in [
            (QualityTier::High, "320k"),
            (QualityTier::Medium, "192k"),
            (QualityTier::Low, "128k"),
        ] {
            let args = build(OutputFormat::Mp3, tier);
            assert!(args.join(" ").contains(&format!("-b:a {rate}")));
        }
    }

    #[test]
    fn aac_family_forces_aac_codec() {
        for fmt in [OutputFormat::Aac, OutputFormat::M4a, OutputFormat::Mp4] {
            let args = build(fmt, QualityTier::Medium);
            assert!(args.join(" ").contains("-c:a aac -b:a 192k"));
        }
    }

    #[test]
    fn flac_ignores_bitrate() {
        let args = build(OutputFormat::Flac, QualityTier::High);
        let joined = args.join(" ");
        assert!(joined.contains("-c:a flac"));
        assert!(!joined.contains("-b:a"));
    }

    #[test]
    fn wav_forces_16_bit_pcm() {
        let args = build(OutputFormat::Wav, QualityTier::Low);
        let joined = args.join(" ");
        assert!(joined.contains("-c:a pcm_s16le"));
        assert!(!joined.contains("-b:a"));
    }

    #[test]
    fn audio_targets_drop_video_and_never_copy_it() {
        for fmt in [OutputFormat::Mp3, OutputFormat::Flac, OutputFormat::Ogg] {
            let args = build(fmt, QualityTier::High);
            assert!(args.contains(&"-vn".to_string()));
            assert!(!args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        }
    }

    #[test]
    fn video_targets_copy_video_stream() {
        let args = build(OutputFormat::Mkv, QualityTier::High);
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        assert!(!args.contains(&"-vn".to_string()));
    }

    #[test]
    fn always_overwrites_and_ends_with_output() {
        let args = build(OutputFormat::Mp3, QualityTier::High);
        assert_eq!(args[0], "-y");
        assert_eq!(args[1], "-i");
        assert_eq!(args.last().unwrap(), "/out/song.mp3");
    }

    #[test]
    fn metadata_mapping_is_optional() {
        let with = build_ffmpeg_args(
            &PathBuf::from("in.wav"),
            &PathBuf::from("out.mp3"),
            OutputFormat::Mp3,
            QualityTier::High,
            None,
            true,
        );
        assert!(with.windows(2).any(|w| w[0] == "-map_metadata" && w[1] == "0"));

        let without = build(OutputFormat::Mp3, QualityTier::High);
        assert!(!without.contains(&"-map_metadata".to_string()));
    }

    #[test]
    fn filter_chain_becomes_single_af_argument() {
        let args = build_ffmpeg_args(
            &PathBuf::from("in.wav"),
            &PathBuf::from("out.mp3"),
            OutputFormat::Mp3,
            QualityTier::High,
            Some("loudnorm,afftdn"),
            false,
        );
        let pos = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[pos + 1], "loudnorm,afftdn");
    }
}
