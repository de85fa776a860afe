//! HLS manifest sanitizer
//!
//! Removes inserted advertisement segments from a media playlist before it is
//! handed to the player. Works line by line with two states:
//!
//! - `Normal`: lines pass through, except discontinuity markers (splice
//!   artifacts) and segment URIs hitting the ad blacklist.
//! - `InAdBlock`: entered on a cue-out/SCTE-35 out directive, left on cue-in.
//!   Everything inside is dropped.
//!
//! A dropped segment also takes its `#EXTINF` (and any per-segment tags in
//! between) with it, so the output never has a duration without a URI. Tags
//! that carry over to later segments, such as `#EXT-X-KEY` and `#EXT-X-MAP`,
//! stay in place.

use reqwest::Url;
use tracing::debug;

/// Built-in URI substrings that identify ad segments (matched lowercase)
pub const DEFAULT_AD_PATTERNS: &[&str] = &[
    "/ad/",
    "/ads/",
    "/adjump/",
    "/video/adjump",
    "/advert",
    "/ad_",
    "_ad_",
    "-ad-",
    "doubleclick.net",
    "googlesyndication",
    "imasdk.googleapis",
];

const DURATION_TAG: &str = "#EXTINF";
const DISCONTINUITY_TAG: &str = "#EXT-X-DISCONTINUITY";
const CUE_OUT_TAGS: &[&str] = &["#EXT-X-CUE-OUT", "#EXT-X-SCTE35", "#EXT-OATCLS-SCTE35"];
const CUE_IN_TAG: &str = "#EXT-X-CUE-IN";
/// Tags that describe only the next segment
const SEGMENT_TAGS: &[&str] = &["#EXT-X-BYTERANGE", "#EXT-X-PROGRAM-DATE-TIME", "#EXT-X-GAP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InAdBlock,
}

/// How one manifest line is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    CueOut,
    CueIn,
    Discontinuity,
    Duration,
    Directive,
    Uri,
    Blank,
}

/// Classify a single (already trimmed) manifest line
pub fn classify(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if !line.starts_with('#') {
        return LineKind::Uri;
    }
    if line == DISCONTINUITY_TAG {
        LineKind::Discontinuity
    } else if line.starts_with(DURATION_TAG) {
        LineKind::Duration
    } else if line.starts_with(CUE_IN_TAG) || is_daterange_with(line, "SCTE35-IN") {
        LineKind::CueIn
    } else if CUE_OUT_TAGS.iter().any(|t| line.starts_with(t))
        || is_daterange_with(line, "SCTE35-OUT")
    {
        LineKind::CueOut
    } else {
        LineKind::Directive
    }
}

fn is_daterange_with(line: &str, attr: &str) -> bool {
    line.starts_with("#EXT-X-DATERANGE") && line.contains(attr)
}

fn is_segment_scoped(line: &str) -> bool {
    classify(line) == LineKind::Duration || SEGMENT_TAGS.iter().any(|t| line.starts_with(t))
}

/// Drop the open segment starting at `start`, keeping tags that outlive it
fn retract(out: &mut Vec<&str>, start: usize) {
    let carried: Vec<&str> = out
        .drain(start..)
        .filter(|line| !is_segment_scoped(line))
        .collect();
    out.extend(carried);
}

/// Ad-segment filter for HLS manifests
#[derive(Debug, Clone)]
pub struct ManifestSanitizer {
    patterns: Vec<String>,
}

impl Default for ManifestSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestSanitizer {
    pub fn new() -> Self {
        Self::with_extra_patterns(std::iter::empty::<String>())
    }

    /// Built-in blacklist plus caller-supplied substrings
    pub fn with_extra_patterns<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut patterns: Vec<String> = DEFAULT_AD_PATTERNS.iter().map(|p| p.to_string()).collect();
        patterns.extend(
            extra
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        Self { patterns }
    }

    pub fn is_ad_uri(&self, uri: &str) -> bool {
        let lower = uri.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    /// Strip ad blocks and ad segments from `manifest`
    pub fn sanitize(&self, manifest: &str) -> String {
        if manifest.trim().is_empty() {
            return manifest.to_string();
        }

        let mut out: Vec<&str> = Vec::new();
        let mut state = State::Normal;
        // Output index of the #EXTINF still waiting for its URI
        let mut open_segment: Option<usize> = None;
        let mut dropped = 0usize;

        for raw in manifest.lines() {
            let line = raw.trim();
            let kind = classify(line);

            if state == State::InAdBlock {
                if kind == LineKind::CueIn {
                    state = State::Normal;
                }
                dropped += 1;
                continue;
            }

            match kind {
                LineKind::CueOut => {
                    if let Some(start) = open_segment.take() {
                        retract(&mut out, start);
                    }
                    state = State::InAdBlock;
                    dropped += 1;
                }
                LineKind::CueIn | LineKind::Discontinuity => dropped += 1,
                LineKind::Duration => {
                    // A second #EXTINF without a URI in between: the first is orphaned
                    if let Some(start) = open_segment.take() {
                        retract(&mut out, start);
                    }
                    open_segment = Some(out.len());
                    out.push(line);
                }
                LineKind::Uri => {
                    if self.is_ad_uri(line) {
                        if let Some(start) = open_segment.take() {
                            retract(&mut out, start);
                        }
                        dropped += 1;
                    } else {
                        open_segment = None;
                        out.push(line);
                    }
                }
                LineKind::Directive | LineKind::Blank => out.push(line),
            }
        }

        if let Some(start) = open_segment {
            retract(&mut out, start);
        }

        debug!(dropped, kept = out.len(), "manifest sanitized");
        let mut result = out.join("\n");
        if manifest.ends_with('\n') {
            result.push('\n');
        }
        result
    }

    /// Sanitize, then make relative URIs absolute against `base`
    pub fn sanitize_with_base(&self, manifest: &str, base: &str) -> String {
        let cleaned = self.sanitize(manifest);
        let Ok(base) = Url::parse(base) else {
            return cleaned;
        };

        let mut result = cleaned
            .lines()
            .map(|line| match classify(line) {
                LineKind::Uri => base
                    .join(line)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| line.to_string()),
                _ => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        if cleaned.ends_with('\n') {
            result.push('\n');
        }
        result
    }
}

/// Sanitize with the built-in blacklist
pub fn sanitize(manifest: &str) -> String {
    ManifestSanitizer::new().sanitize(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("#EXTINF:4.0,"), LineKind::Duration);
        assert_eq!(classify("#EXT-X-DISCONTINUITY"), LineKind::Discontinuity);
        assert_eq!(classify("#EXT-X-DISCONTINUITY-SEQUENCE:3"), LineKind::Directive);
        assert_eq!(classify("#EXT-X-CUE-OUT:30"), LineKind::CueOut);
        assert_eq!(classify("#EXT-X-CUE-OUT-CONT:10/30"), LineKind::CueOut);
        assert_eq!(classify("#EXT-X-CUE-IN"), LineKind::CueIn);
        assert_eq!(
            classify("#EXT-X-DATERANGE:ID=\"1\",SCTE35-OUT=0xFC"),
            LineKind::CueOut
        );
        assert_eq!(classify("#EXT-X-DATERANGE:ID=\"1\",SCTE35-IN=0xFC"), LineKind::CueIn);
        assert_eq!(classify("seg1.ts"), LineKind::Uri);
        assert_eq!(classify(""), LineKind::Blank);
    }

    #[test]
    fn test_blacklisted_uri_retracts_duration() {
        let input = "#EXTM3U\n#EXTINF:3,\nhttps://cdn/ad/1.ts\n#EXTINF:4,\nhttps://cdn/v/2.ts\n";
        let output = sanitize(input);
        assert_eq!(output, "#EXTM3U\n#EXTINF:4,\nhttps://cdn/v/2.ts\n");
    }

    #[test]
    fn test_per_segment_tags_go_with_dropped_segment() {
        let input = "#EXTINF:3,\n#EXT-X-BYTERANGE:100@0\nhttps://x/adjump/a.ts\n#EXTINF:2,\nok.ts";
        assert_eq!(sanitize(input), "#EXTINF:2,\nok.ts");
    }

    #[test]
    fn test_unterminated_ad_block_drops_rest() {
        let input = "#EXTINF:2,\na.ts\n#EXT-X-CUE-OUT:30\n#EXTINF:2,\nb.ts\n#EXT-X-ENDLIST";
        assert_eq!(sanitize(input), "#EXTINF:2,\na.ts");
    }

    #[test]
    fn test_cue_out_after_open_duration_retracts_it() {
        let input = "#EXTINF:2,\n#EXT-X-CUE-OUT:5\nad.ts\n#EXT-X-CUE-IN\n#EXTINF:2,\nb.ts";
        assert_eq!(sanitize(input), "#EXTINF:2,\nb.ts");
    }

    #[test]
    fn test_dangling_duration_at_end_removed() {
        assert_eq!(sanitize("#EXTM3U\n#EXTINF:2,\n"), "#EXTM3U\n");
    }

    #[test]
    fn test_empty_input_unchanged() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("\n"), "\n");
    }

    #[test]
    fn test_extra_patterns_case_insensitive() {
        let sanitizer = ManifestSanitizer::with_extra_patterns(["PROMO"]);
        assert!(sanitizer.is_ad_uri("https://cdn/promo/1.ts"));
        assert!(!sanitizer.is_ad_uri("https://cdn/video/1.ts"));
    }

    #[test]
    fn test_sanitize_with_base() {
        let input = "#EXTM3U\n#EXTINF:2,\nseg/1.ts\n#EXTINF:2,\nhttps://other/2.ts\n";
        let output = ManifestSanitizer::new()
            .sanitize_with_base(input, "https://cdn.example/hls/index.m3u8");
        assert_eq!(
            output,
            "#EXTM3U\n#EXTINF:2,\nhttps://cdn.example/hls/seg/1.ts\n#EXTINF:2,\nhttps://other/2.ts\n"
        );
    }
}
