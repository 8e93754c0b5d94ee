//! Literal rewrites that drop the audio side of caller-written concat and
//! crossfade graphs when the inputs carry no audio.
//!
//! This matches exact substrings rather than parsing filter-graph grammar, so
//! anything written differently from the patterns below passes through
//! untouched. It runs before placeholder substitution, so upload paths are
//! never rewritten.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

fn acrossfade_clause() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r#";?[^;"'\s]*acrossfade[^;"'\s]*"#)
}

fn concat_clause() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r#"[^;"'\s]*concat=[^;"'\s]*"#)
}

fn audio_pad() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"\[\d+:a(?::\d+)?\]")
}

fn video_count() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r":v=(\d+)")
}

fn label_map() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r#"-map\s+["']?\[([^\]]+)\]["']?"#)
}

fn stream_audio_map() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"-map\s+\d+:a(?::\d+)?\??")
}

fn audio_codec_flag() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"(?:-c:a|-codec:a|-acodec|-b:a)(?::\d+)?\s+\S+")
}

fn leading_separator() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r#"(^|["'\s]);+"#)
}

fn trailing_separator() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r#";+($|["'\s])"#)
}

fn repeated_separator() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r";{2,}")
}

/// Whether the command contains a graph whose audio side these rewrites cover
pub fn references_audio_graph(command: &str) -> bool {
    ["concat=", "xfade", "acrossfade"]
        .iter()
        .any(|needle| command.contains(needle))
}

/// Rewrite `command` so it no longer expects audio.
///
/// - `acrossfade` clauses are removed, with their output labels
/// - concat clauses with `:a=1` lose their `[N:a]` pads, become `:a=0` and
///   keep only their video output labels
/// - `-map` of any removed label, `-map N:a`, and audio codec/bitrate flags
///   are removed
pub fn strip_audio_side(command: &str) -> String {
    let mut removed_labels: Vec<String> = Vec::new();

    let text = acrossfade_clause().replace_all(command, |caps: &Captures<'_>| {
        let (_, labels) = split_trailing_labels(&caps[0]);
        removed_labels.extend(labels);
        String::new()
    });

    let text = concat_clause().replace_all(&text, |caps: &Captures<'_>| {
        let clause = &caps[0];
        if !clause.contains(":a=1") {
            return clause.to_string();
        }
        let (head, mut labels) = split_trailing_labels(clause);
        let keep = video_count()
            .captures(head)
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(1);
        if labels.len() > keep {
            removed_labels.extend(labels.split_off(keep));
        }
        let head = audio_pad().replace_all(head, "").replace(":a=1", ":a=0");
        let labels: String = labels.iter().map(|l| format!("[{}]", l)).collect();
        format!("{}{}", head, labels)
    });

    let text = repeated_separator().replace_all(&text, ";");
    let text = leading_separator().replace_all(&text, "${1}");
    let text = trailing_separator().replace_all(&text, "${1}");

    let text = label_map().replace_all(&text, |caps: &Captures<'_>| {
        if removed_labels.iter().any(|l| l == &caps[1]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    let text = stream_audio_map().replace_all(&text, "");
    let text = audio_codec_flag().replace_all(&text, "");

    text.trim().to_string()
}

/// Split `[a][b]` output labels off the end of a filter clause
fn split_trailing_labels(clause: &str) -> (&str, Vec<String>) {
    let mut head = clause;
    let mut labels = Vec::new();
    while head.ends_with(']') {
        match head.rfind('[') {
            Some(start) => {
                labels.push(head[start + 1..head.len() - 1].to_string());
                head = &head[..start];
            }
            None => break,
        }
    }
    labels.reverse();
    (head, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        shell_words::split(text).unwrap()
    }

    #[test]
    fn test_detects_audio_graphs() {
        assert!(references_audio_graph(
            "-filter_complex \"[0:v][0:a]concat=n=1:v=1:a=1[v][a]\""
        ));
        assert!(references_audio_graph("-filter_complex [0:a][1:a]acrossfade=d=1[a]"));
        assert!(references_audio_graph("-filter_complex [0:v][1:v]xfade=offset=2[v]"));
        assert!(!references_audio_graph("-vf scale=640:480 -c:a aac"));
    }

    #[test]
    fn test_concat_drops_audio_side() {
        let command = "-i {a} -i {b} -filter_complex \"[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[outv][outa]\" \
                       -map \"[outv]\" -map \"[outa]\" -c:v libx264 -c:a aac";
        assert_eq!(
            tokens(&strip_audio_side(command)),
            vec![
                "-i",
                "{a}",
                "-i",
                "{b}",
                "-filter_complex",
                "[0:v][1:v]concat=n=2:v=1:a=0[outv]",
                "-map",
                "[outv]",
                "-c:v",
                "libx264",
            ]
        );
    }

    #[test]
    fn test_crossfade_clause_removed() {
        let command = "-i {a} -i {b} -filter_complex \
                       \"[0:v][1:v]xfade=transition=fade:duration=1:offset=4[v];[0:a][1:a]acrossfade=d=1[a]\" \
                       -map '[v]' -map '[a]' -b:a 192k";
        assert_eq!(
            tokens(&strip_audio_side(command)),
            vec![
                "-i",
                "{a}",
                "-i",
                "{b}",
                "-filter_complex",
                "[0:v][1:v]xfade=transition=fade:duration=1:offset=4[v]",
                "-map",
                "[v]",
            ]
        );
    }

    #[test]
    fn test_leading_crossfade_clause_removed() {
        let command = "-filter_complex [0:a][1:a]acrossfade=d=2[a];[0:v][1:v]xfade=duration=2:offset=3[v] -map [v] -map [a] -map 0:a";
        assert_eq!(
            tokens(&strip_audio_side(command)),
            vec![
                "-filter_complex",
                "[0:v][1:v]xfade=duration=2:offset=3[v]",
                "-map",
                "[v]",
            ]
        );
    }

    #[test]
    fn test_stream_specific_audio_flags_removed() {
        let command = "-filter_complex \"[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[v][a]\" \
                       -map [v] -map [a] -c:v:0 libx264 -c:a:0 aac -b:a:0 128k";
        assert_eq!(
            tokens(&strip_audio_side(command)),
            vec![
                "-filter_complex",
                "[0:v][1:v]concat=n=2:v=1:a=0[v]",
                "-map",
                "[v]",
                "-c:v:0",
                "libx264",
            ]
        );
    }

    #[test]
    fn test_video_only_concat_untouched() {
        let command = "-filter_complex \"[0:v][1:v]concat=n=2:v=1:a=0[v]\" -map \"[v]\"";
        assert_eq!(strip_audio_side(command), command);
    }

    #[test]
    fn test_split_trailing_labels() {
        let (head, labels) = split_trailing_labels("[0:v][1:v]concat=n=2:v=1:a=1[outv][outa]");
        assert_eq!(head, "[0:v][1:v]concat=n=2:v=1:a=1");
        assert_eq!(labels, vec!["outv", "outa"]);
    }
}
