use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use crate::download::DownloadEvent;
use crate::download::parse::{self, ParsedFact};
use crate::format_codes::{self, FormatKind};

const SLEEP_TICK_MILLIS: u64 = 100;
const SLEEP_TICK_STEP: f64 = 0.1;
const SKIPPED_FORMAT: &str = "Skipped";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Active,
    Complete,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Video,
    Audio,
    Legacy,
    Skip,
    Other,
}

impl From<FormatKind> for Classification {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Video => Self::Video,
            FormatKind::Audio => Self::Audio,
            FormatKind::Legacy => Self::Legacy,
            FormatKind::Other => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinishedItem {
    pub title: String,
    pub format_code: String,
    pub classification: Classification,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowStatus {
    Success,
    Warning,
}

// finished をまとめた表示用の1行。formats は表示ラベル。
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedRow {
    pub title: String,
    pub formats: Vec<String>,
    pub status: RowStatus,
}

#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    pub playlist_title: String,
    pub item_index: String,
    pub current_title: String,
    pub current_format: String,
    pub sleep_remaining: Option<f64>,
    pub finished: Vec<FinishedItem>,
}

impl SessionState {
    // finished を表示用の行へまとめる。保存はせず毎回導出する。
    // 同じタイトルが隣接し、フォーマットコードが異なり、分類が異なる
    // (または片方が Other) なら映像+音声のペアとして1行に畳む。
    pub fn grouped_finished(&self) -> Vec<FinishedRow> {
        let mut rows = Vec::new();
        let mut i = 0;
        while i < self.finished.len() {
            let current = &self.finished[i];
            if let Some(next) = self.finished.get(i + 1) {
                if current.title == next.title
                    && current.format_code != next.format_code
                    && (current.classification != next.classification
                        || current.classification == Classification::Other
                        || next.classification == Classification::Other)
                {
                    rows.push(FinishedRow {
                        title: current.title.clone(),
                        formats: vec![
                            format_label(&current.format_code),
                            format_label(&next.format_code),
                        ],
                        status: RowStatus::Success,
                    });
                    i += 2;
                    continue;
                }
            }

            // 単独行。Legacy は映像と音声を1本に含むので成功扱い。
            let status = if current.classification == Classification::Legacy {
                RowStatus::Success
            } else {
                RowStatus::Warning
            };
            rows.push(FinishedRow {
                title: current.title.clone(),
                formats: vec![format_label(&current.format_code)],
                status,
            });
            i += 1;
        }
        rows
    }
}

fn format_label(code: &str) -> String {
    format_codes::classify(code).label
}

// 1回のダウンロード実行に対する状態機械。イベントループからの
// reducer 呼び出しだけが状態を変更する。
pub struct Session {
    state: SessionState,
    tx: mpsc::Sender<DownloadEvent>,
    sleep_ticker: Option<Arc<AtomicBool>>,
}

impl Session {
    pub fn new(tx: mpsc::Sender<DownloadEvent>) -> Self {
        Self {
            state: SessionState::default(),
            tx,
            sleep_ticker: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mark_active(&mut self) {
        if self.state.phase == Phase::Idle {
            self.state.phase = Phase::Active;
        }
    }

    // 標準出力の1行を解析して状態へ反映する。
    pub fn apply_stdout_line(&mut self, line: &str) {
        if self.is_terminal() {
            return;
        }
        for fact in parse::parse_facts(line) {
            self.apply_fact(fact);
        }
    }

    // タイトル更新イベント。".f399" 接尾辞があればフォーマットコードも更新する。
    // 接尾辞のない更新では直前のフォーマットコードを保持する。
    pub fn apply_title(&mut self, raw: &str) {
        if self.is_terminal() {
            return;
        }
        let (title, format_code) = parse::split_title_format(raw);
        self.state.current_title = title;
        if let Some(code) = format_code {
            self.state.current_format = code;
        }
    }

    // プロセス終了。ログへ追記する1行を返す。既に終端状態なら None。
    pub fn apply_exit(&mut self, code: i32) -> Option<String> {
        if self.is_terminal() {
            return None;
        }
        self.cancel_sleep();
        if code == 0 {
            self.state.percent = 100.0;
            self.state.speed.clear();
            self.state.eta.clear();
            self.record_finished_if_done();
            self.state.phase = Phase::Complete;
            Some("[success] Download completed successfully!".to_string())
        } else {
            self.state.phase = Phase::Failed;
            Some(format!("[error] Download failed with exit code: {code}"))
        }
    }

    // ティッカー1回分の減算。取り消し後に届いた遅延ティックは何もしない。
    pub fn apply_sleep_tick(&mut self) {
        if self.is_terminal() {
            return;
        }
        let Some(remaining) = self.state.sleep_remaining else {
            return;
        };
        if remaining <= 0.0 {
            self.state.sleep_remaining = None;
            self.stop_sleep_ticker();
            return;
        }
        self.state.sleep_remaining = Some((remaining - SLEEP_TICK_STEP).max(0.0));
    }

    // セッション終了時の後始末。ティッカーを止める。
    pub fn shutdown(&mut self) {
        self.state.sleep_remaining = None;
        self.stop_sleep_ticker();
    }

    fn apply_fact(&mut self, fact: ParsedFact) {
        match fact {
            ParsedFact::Progress(percent) => {
                self.state.percent = percent;
                self.cancel_sleep();
                self.record_finished_if_done();
            }
            ParsedFact::Speed(speed) => self.state.speed = speed,
            ParsedFact::Eta(eta) => self.state.eta = eta,
            ParsedFact::SleepSeconds(seconds) => {
                self.state.sleep_remaining = Some(seconds);
                self.ensure_sleep_ticker();
            }
            ParsedFact::PlaylistTitle(title) => self.state.playlist_title = title,
            ParsedFact::ItemIndex { current, total } => {
                self.state.item_index = format!("{current} of {total}");
            }
            ParsedFact::SkippedItem(title) => self.record_skipped(title),
        }
    }

    // 進捗が100%に達していて現在のタイトルが分かっていれば finished へ記録する。
    // (タイトル, フォーマットコード) の組で重複を除外する。
    fn record_finished_if_done(&mut self) {
        if self.state.percent < 100.0 || self.state.current_title.is_empty() {
            return;
        }
        let title = self.state.current_title.clone();
        let format_code = self.state.current_format.clone();
        let already = self
            .state
            .finished
            .iter()
            .any(|item| item.title == title && item.format_code == format_code);
        if already {
            return;
        }
        let classification = Classification::from(format_codes::classify(&format_code).kind);
        self.state.finished.push(FinishedItem {
            title,
            format_code,
            classification,
        });
    }

    fn record_skipped(&mut self, title: String) {
        let already = self
            .state
            .finished
            .iter()
            .any(|item| item.title == title && item.format_code == SKIPPED_FORMAT);
        if already {
            return;
        }
        self.state.finished.push(FinishedItem {
            title,
            format_code: SKIPPED_FORMAT.to_string(),
            classification: Classification::Skip,
        });
    }

    fn cancel_sleep(&mut self) {
        self.state.sleep_remaining = None;
        self.stop_sleep_ticker();
    }

    fn ensure_sleep_ticker(&mut self) {
        if let Some(flag) = &self.sleep_ticker {
            if flag.load(Ordering::Relaxed) {
                return;
            }
        }
        let flag = Arc::new(AtomicBool::new(true));
        let active = flag.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            while active.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(SLEEP_TICK_MILLIS));
                if !active.load(Ordering::Relaxed) {
                    break;
                }
                if tx.send(DownloadEvent::SleepTick).is_err() {
                    break;
                }
            }
        });
        self.sleep_ticker = Some(flag);
    }

    fn stop_sleep_ticker(&mut self) {
        if let Some(flag) = self.sleep_ticker.take() {
            flag.store(false, Ordering::Relaxed);
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state.phase, Phase::Complete | Phase::Failed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_sleep_ticker();
    }
}
