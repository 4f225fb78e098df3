use std::sync::OnceLock;

use serde_json::Value;

const FORMAT_CODES_JSON: &str = include_str!("../assets/format_codes.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    Video,
    Audio,
    Legacy,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatInfo {
    pub label: String,
    pub kind: FormatKind,
}

// フォーマットコード (例: "399" や "140-drc") を表示用ラベルへ変換する。
pub fn classify(code: &str) -> FormatInfo {
    if code.is_empty() {
        return FormatInfo {
            label: String::new(),
            kind: FormatKind::Other,
        };
    }
    let stem = code.split('-').next().unwrap_or(code);
    let Ok(num) = stem.parse::<i64>() else {
        return FormatInfo {
            label: stem.to_string(),
            kind: FormatKind::Other,
        };
    };

    let table = format_table();
    for (resolution, codes) in &table.video {
        if codes.contains(&num) {
            return FormatInfo {
                label: format!("Video {resolution}"),
                kind: FormatKind::Video,
            };
        }
    }
    for (audio_code, bitrate) in &table.audio {
        if *audio_code == num {
            return FormatInfo {
                label: format!("Audio {bitrate}"),
                kind: FormatKind::Audio,
            };
        }
    }
    for (legacy_code, description) in &table.legacy {
        if *legacy_code == num {
            return FormatInfo {
                label: format!("Legacy {description}"),
                kind: FormatKind::Legacy,
            };
        }
    }
    FormatInfo {
        label: format!("Format {stem}"),
        kind: FormatKind::Other,
    }
}

#[derive(Default)]
struct FormatTable {
    video: Vec<(String, Vec<i64>)>,
    audio: Vec<(i64, String)>,
    legacy: Vec<(i64, String)>,
}

fn format_table() -> &'static FormatTable {
    static TABLE: OnceLock<FormatTable> = OnceLock::new();
    TABLE.get_or_init(|| parse_format_table(FORMAT_CODES_JSON).unwrap_or_default())
}

fn parse_format_table(json: &str) -> Option<FormatTable> {
    let value: Value = serde_json::from_str(json).ok()?;
    let mut table = FormatTable::default();

    let video = value
        .get("dash_video")
        .and_then(|v| v.get("formats"))
        .and_then(Value::as_object)?;
    for (resolution, codecs) in video {
        let mut codes = Vec::new();
        if let Some(codecs) = codecs.as_object() {
            for entries in codecs.values() {
                if let Some(entries) = entries.as_array() {
                    codes.extend(entries.iter().filter_map(Value::as_i64));
                }
            }
        }
        table.video.push((resolution.clone(), codes));
    }

    let audio = value
        .get("dash_audio")
        .and_then(|v| v.get("formats"))
        .and_then(Value::as_array)?;
    for entry in audio {
        let Some(code) = entry.get("code").and_then(Value::as_i64) else {
            continue;
        };
        let Some(bitrate) = entry.get("bitrate").and_then(Value::as_str) else {
            continue;
        };
        table.audio.push((code, bitrate.to_string()));
    }

    let legacy = value
        .get("legacy_formats")
        .and_then(|v| v.get("formats"))
        .and_then(Value::as_array)?;
    for entry in legacy {
        let Some(code) = entry.get("code").and_then(Value::as_i64) else {
            continue;
        };
        let description = match entry.get("notes").and_then(Value::as_str) {
            Some(notes) => notes.to_string(),
            None => {
                let video = entry.get("video").and_then(Value::as_str).unwrap_or("");
                let audio = entry.get("audio").and_then(Value::as_str).unwrap_or("");
                format!("{video} + {audio}")
            }
        };
        table.legacy.push((code, description));
    }

    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_dash_video_codes() {
        let info = classify("399");
        assert_eq!(info.label, "Video 1080p");
        assert_eq!(info.kind, FormatKind::Video);

        let info = classify("247");
        assert_eq!(info.label, "Video 720p");
        assert_eq!(info.kind, FormatKind::Video);
    }

    #[test]
    fn strips_suffix_after_hyphen() {
        let info = classify("140-drc");
        assert_eq!(info.label, "Audio 128k");
        assert_eq!(info.kind, FormatKind::Audio);

        let info = classify("399-drc");
        assert_eq!(info.label, "Video 1080p");
    }

    #[test]
    fn classifies_legacy_codes() {
        let info = classify("18");
        assert_eq!(info.label, "Legacy 360p + 96k");
        assert_eq!(info.kind, FormatKind::Legacy);

        // notes があればそちらを優先する。
        let info = classify("17");
        assert_eq!(info.label, "Legacy 3GP 144p");
        assert_eq!(info.kind, FormatKind::Legacy);
    }

    #[test]
    fn unknown_numeric_code_becomes_format_label() {
        let info = classify("9999");
        assert_eq!(info.label, "Format 9999");
        assert_eq!(info.kind, FormatKind::Other);
    }

    #[test]
    fn non_numeric_code_is_returned_as_is() {
        let info = classify("sb0");
        assert_eq!(info.label, "sb0");
        assert_eq!(info.kind, FormatKind::Other);
    }

    #[test]
    fn empty_code_yields_empty_label() {
        let info = classify("");
        assert!(info.label.is_empty());
        assert_eq!(info.kind, FormatKind::Other);
    }

    #[test]
    fn bundled_table_parses() {
        let table = parse_format_table(FORMAT_CODES_JSON).expect("parse bundled table");
        assert!(!table.video.is_empty());
        assert!(!table.audio.is_empty());
        assert!(!table.legacy.is_empty());
    }
}
