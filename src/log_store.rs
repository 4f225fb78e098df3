use std::collections::VecDeque;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::download::parse;

const MAX_ENTRIES: usize = 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub message: String,
    pub timestamp: String,
    pub repeat_count: u32,
}

// append が末尾のエントリへどう作用したか。表示側の描画方法を決めるのに使う。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogChange {
    Appended,
    Repeated,
    ReplacedLast,
}

pub struct LogStore {
    entries: VecDeque<LogEntry>,
}

impl LogStore {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_ENTRIES),
        }
    }

    // 1行をログ列へ反映する。直前と完全一致なら repeat_count を増やし、
    // 進捗行どうしなら末尾を置き換える。severity_prefix は標準エラー行の "[warning]" など。
    pub fn append(&mut self, line: &str, severity_prefix: Option<&str>) -> LogChange {
        let message = match severity_prefix {
            Some(prefix) => format!("{prefix} {line}"),
            None => line.to_string(),
        };

        if let Some(last) = self.entries.back_mut() {
            if last.message == message {
                last.repeat_count += 1;
                return LogChange::Repeated;
            }
            if parse::is_progress_line(&message) && parse::is_progress_line(&last.message) {
                *last = LogEntry {
                    message,
                    timestamp: current_time_text(),
                    repeat_count: 1,
                };
                return LogChange::ReplacedLast;
            }
        }

        self.entries.push_back(LogEntry {
            message,
            timestamp: current_time_text(),
            repeat_count: 1,
        });
        while self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
        }
        LogChange::Appended
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ログ中に現れる重大度ラベルの一覧 (出現順、重複なし)。
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for entry in &self.entries {
            let label = parse::severity_label(&entry.message);
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    // 指定ラベルのエントリだけを借用で返す。元の列は変更しない。
    pub fn filtered(&self, enabled_labels: &[String]) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|entry| enabled_labels.contains(&parse::severity_label(&entry.message)))
            .collect()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn current_time_text() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "00:00:00".to_string())
}
