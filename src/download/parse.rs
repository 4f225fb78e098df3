use std::sync::OnceLock;

use regex::Regex;

// 1行のテキストから取り出せる構造化された事実。1行に複数含まれることがある。
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedFact {
    Progress(f64),
    Speed(String),
    Eta(String),
    SleepSeconds(f64),
    PlaylistTitle(String),
    ItemIndex { current: u32, total: u32 },
    SkippedItem(String),
}

// yt-dlp の出力1行を解析して事実の一覧を返す。未知の行は空の一覧になる。
pub fn parse_facts(line: &str) -> Vec<ParsedFact> {
    let mut facts = Vec::new();

    if let Some(caps) = progress_regex().captures(line) {
        if let Ok(percent) = caps[1].parse::<f64>() {
            facts.push(ParsedFact::Progress(percent.clamp(0.0, 100.0)));
        }
    }
    if let Some(caps) = playlist_regex().captures(line) {
        facts.push(ParsedFact::PlaylistTitle(caps[1].to_string()));
    }
    if let Some(caps) = item_regex().captures(line) {
        if let (Ok(current), Ok(total)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            facts.push(ParsedFact::ItemIndex { current, total });
        }
    }
    if let Some(caps) = speed_regex().captures(line) {
        facts.push(ParsedFact::Speed(caps[1].to_string()));
    }
    if let Some(caps) = eta_regex().captures(line) {
        facts.push(ParsedFact::Eta(caps[1].to_string()));
    }
    if let Some(caps) = sleep_regex().captures(line) {
        if let Ok(seconds) = caps[1].parse::<f64>() {
            if seconds >= 0.0 {
                facts.push(ParsedFact::SleepSeconds(seconds));
            }
        }
    }
    if let Some(caps) = skip_regex().captures(line) {
        facts.push(ParsedFact::SkippedItem(caps[1].trim().to_string()));
    }

    facts
}

// ダウンロード進捗のパーセント行かどうか。ログの置き換え判定に使う。
pub fn is_progress_line(line: &str) -> bool {
    progress_regex().is_match(line)
}

// 行頭に限らず最初の [ラベル] を小文字で返す。なければ "info"。
pub fn severity_label(line: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]").unwrap());
    match re.captures(line) {
        Some(caps) => caps[1].to_lowercase(),
        None => "info".to_string(),
    }
}

// タイトル更新イベントの生文字列を (タイトル, フォーマットコード) に分割する。
// ".f399" のような接尾辞がなければフォーマットコードは None。
pub fn split_title_format(raw: &str) -> (String, Option<String>) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(.+?)\.f(\d+)").unwrap());
    match re.captures(raw) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (raw.to_string(), None),
    }
}

// "Destination: <パス>" を含む行からファイル名由来のタイトルを取り出す。
// 拡張子を落とし、末尾の " [動画ID]" があれば取り除く。
pub fn extract_destination_title(line: &str) -> Option<String> {
    let start = line.find("Destination: ")?;
    let path_part = &line[start + "Destination: ".len()..];

    let normalized = path_part.replace('\\', "/");
    let filename = normalized.split('/').next_back()?;

    let mut title = filename.to_string();
    if let Some(dot_idx) = title.rfind('.') {
        title = title[..dot_idx].to_string();
    }
    if let Some(bracket_start) = title.rfind(" [") {
        if title[bracket_start..].ends_with(']') {
            title = title[..bracket_start].to_string();
        }
    }
    Some(title)
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\]\s+([\d.]+)%").unwrap())
}

fn playlist_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Downloading playlist:\s+(.+)").unwrap())
}

fn item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Downloading item\s+(\d+)\s+of\s+(\d+)").unwrap())
}

fn speed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"at\s+([^\s]+)").unwrap())
}

fn eta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ETA\s+([^\s]+)").unwrap())
}

fn sleep_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Sleeping\s+([\d.]+)\s+seconds").unwrap())
}

fn skip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\[.*?\]\s*)?(.+) does not pass filter .+ skipping \.\.").unwrap())
}
