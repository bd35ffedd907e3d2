//! Enhancement presets resolved into ffmpeg `-af` directives.
//!
//! Profile names are matched case-insensitively on substrings, so display
//! labels ("Bass Boost", "Rock EQ", "Auto (Genre)") and their plain CLI
//! spellings resolve the same way.

use std::path::Path;

const NORMALIZE: &str = "loudnorm";
const BASS_BOOST: &str = "equalizer=f=100:width_type=h:width=200:g=4";
const TREBLE_BOOST: &str = "equalizer=f=8000:width_type=h:width=2000:g=3";
const VOCAL_CLARITY: &str = "acompressor=threshold=-21dB:ratio=3:attack=200:release=1000";

const ROCK_CLUSTER: &[&str] = &[
    "loudnorm",
    "equalizer=f=100:width_type=h:width=200:g=4",
    "equalizer=f=1000:width_type=h:width=300:g=3",
    "equalizer=f=8000:width_type=h:width=2000:g=2",
    "acompressor=threshold=-18dB:ratio=3:attack=50:release=250",
];

const EDM_CLUSTER: &[&str] = &[
    "loudnorm",
    "equalizer=f=60:width_type=h:width=120:g=5",
    "equalizer=f=1000:width_type=h:width=300:g=2",
    "equalizer=f=10000:width_type=h:width=2000:g=3",
    "acompressor=threshold=-18dB:ratio=4:attack=20:release=200",
];

const CHILL_CLUSTER: &[&str] = &[
    "loudnorm",
    "equalizer=f=1000:width_type=h:width=400:g=3",
    "afftdn",
];

const CLASSICAL_CLUSTER: &[&str] = &[
    "loudnorm",
    "equalizer=f=200:width_type=h:width=300:g=2",
    "afftdn",
];

/// Infer a genre keyword from the input file's path text.
pub fn genre_from_path(path: &Path) -> Option<&'static str> {
    let p = path.to_string_lossy().to_lowercase();
    if p.contains("rock") {
        return Some("rock");
    }
    if p.contains("edm") || p.contains("electronic") {
        return Some("edm");
    }
    if p.contains("chill") || p.contains("lofi") || p.contains("lo-fi") {
        return Some("chill");
    }
    if p.contains("classical") || p.contains("orchestra") {
        return Some("classical");
    }
    if p.contains("jazz") {
        return Some("jazz");
    }
    None
}

/// Resolve a profile name (and optional genre hint) into an ordered filter
/// list. "auto" falls through to the genre hint when nothing else matched;
/// the indirection is one level deep, never recursive beyond that.
pub fn resolve_filters(profile: &str, genre_hint: Option<&str>) -> Vec<&'static str> {
    let p = profile.to_lowercase();
    let mut parts: Vec<&'static str> = Vec::new();

    if p.contains("normalize") {
        parts.push(NORMALIZE);
    }
    if p.contains("bass") {
        parts.push(BASS_BOOST);
    }
    if p.contains("treble") {
        parts.push(TREBLE_BOOST);
    }
    if p.contains("vocal") || p.contains("clarity") {
        parts.push(VOCAL_CLARITY);
    }
    if p.contains("rock") {
        parts.extend_from_slice(ROCK_CLUSTER);
    }
    if p.contains("edm") {
        parts.extend_from_slice(EDM_CLUSTER);
    }
    if p.contains("chill") {
        parts.extend_from_slice(CHILL_CLUSTER);
    }
    if p.contains("classical") {
        parts.extend_from_slice(CLASSICAL_CLUSTER);
    }

    if parts.is_empty() && p.contains("auto") {
        if let Some(hint) = genre_hint {
            return resolve_filters(hint, None);
        }
    }

    parts
}

/// Comma-joined filter graph for ffmpeg's `-af`, or None when the profile
/// resolves to nothing.
pub fn filter_chain(profile: &str, genre_hint: Option<&str>) -> Option<String> {
    let parts = resolve_filters(profile, genre_hint);
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_profile_resolves_to_nothing() {
        assert!(filter_chain("None", None).is_none());
        assert!(filter_chain("None", Some("edm")).is_none());
    }

    #[test]
    fn normalize_profile() {
        assert_eq!(filter_chain("Normalize", None).unwrap(), "loudnorm");
    }

    #[test]
    fn bass_then_treble_priority_order() {
        let chain = filter_chain("Bass Boost + Treble Boost", None).unwrap();
        assert_eq!(
            chain,
            "equalizer=f=100:width_type=h:width=200:g=4,equalizer=f=8000:width_type=h:width=2000:g=3"
        );
    }

    #[test]
    fn vocal_clarity_matches_either_keyword() {
        let expected = "acompressor=threshold=-21dB:ratio=3:attack=200:release=1000";
        assert_eq!(filter_chain("Vocal Clarity", None).unwrap(), expected);
        assert_eq!(filter_chain("clarity", None).unwrap(), expected);
    }

    #[test]
    fn auto_resolves_via_genre_hint() {
        let auto = filter_chain("Auto (Genre)", Some("edm")).unwrap();
        let direct = filter_chain("EDM EQ", None).unwrap();
        assert_eq!(auto, direct);
        assert_eq!(auto, EDM_CLUSTER.join(","));
    }

    #[test]
    fn auto_without_hint_resolves_to_nothing() {
        assert!(filter_chain("Auto (Genre)", None).is_none());
    }

    #[test]
    fn auto_with_jazz_hint_resolves_to_nothing() {
        // Jazz is a recognized genre keyword but has no filter cluster.
        assert!(filter_chain("Auto (Genre)", Some("jazz")).is_none());
    }

    #[test]
    fn genre_hint_from_path_keywords() {
        assert_eq!(genre_from_path(Path::new("/music/edm/track01.wav")), Some("edm"));
        assert_eq!(genre_from_path(Path::new("/music/Electronic-set.mp3")), Some("edm"));
        assert_eq!(genre_from_path(Path::new("lofi-beats.flac")), Some("chill"));
        assert_eq!(genre_from_path(Path::new("Orchestra Hall.wav")), Some("classical"));
        assert_eq!(genre_from_path(Path::new("/home/me/song.mp3")), None);
    }

    #[test]
    fn auto_profile_follows_path_derived_hint() {
        let hint = genre_from_path(Path::new("/music/edm/banger.wav"));
        assert_eq!(filter_chain("Auto (Genre)", hint).unwrap(), EDM_CLUSTER.join(","));

        let no_hint = genre_from_path(Path::new("/music/untagged/track.wav"));
        assert!(filter_chain("Auto (Genre)", no_hint).is_none());
    }

    #[test]
    fn rock_profile_uses_full_cluster() {
        assert_eq!(filter_chain("Rock EQ", None).unwrap(), ROCK_CLUSTER.join(","));
    }
}
