use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use url::Url;

use crate::download::{self, DownloadEvent, DownloadRequest, parse};
use crate::log_store::{LogChange, LogStore};
use crate::session::{Phase, RowStatus, Session};
use crate::settings::SettingsData;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "ytdltracker")]
#[command(about = "yt-dlp を起動し、進捗と完了状況を整形して表示するダウンロードツール")]
pub struct CliArgs {
    /// ダウンロードする動画・プレイリストの URL
    pub url: String,

    /// プロキシ (例: socks5://127.0.0.1:9050)。設定ファイルより優先される
    #[arg(long)]
    pub proxy: Option<String>,

    /// Netscape 形式 cookie ファイルのパス
    #[arg(long)]
    pub cookies: Option<String>,

    /// 保存先フォルダ。未指定なら設定ファイルの値を使う
    #[arg(long)]
    pub output_dir: Option<String>,

    /// 表示するログラベル (カンマ区切り。例: download,error)。未指定なら全部表示する
    #[arg(long)]
    pub labels: Option<String>,

    /// 進捗行の逐次表示を抑制する
    #[arg(long)]
    pub quiet_progress: bool,

    /// 今回の保存先・プロキシ・cookie 設定を既定値として保存する
    #[arg(long)]
    pub save_defaults: bool,
}

// CLI のエントリポイント。子プロセスの終了コードをそのまま返す。
pub fn run() -> Result<i32, String> {
    let args = CliArgs::parse();
    let settings = SettingsData::load();
    let request = build_request(&args, &settings)?;
    let label_filter = parse_label_filter(args.labels.as_deref());

    if args.save_defaults {
        let updated = SettingsData {
            download_dir: request.download_dir.clone(),
            proxy: request.proxy.clone(),
            cookies_file: request.cookies_file.clone(),
        };
        updated.save()?;
        println!("設定を保存しました。");
    }

    run_session(request, label_filter, args.quiet_progress)
}

// CLI 引数と設定ファイルを突き合わせてダウンロード要求を組み立てる。
// CLI 側が常に優先。URL はここで一度だけ検証する。
fn build_request(args: &CliArgs, settings: &SettingsData) -> Result<DownloadRequest, String> {
    let url = args.url.trim().to_string();
    Url::parse(&url).map_err(|err| format!("URLの形式が正しくありません: {err}"))?;

    let proxy = args
        .proxy
        .clone()
        .unwrap_or_else(|| settings.proxy.clone());
    let cookies_file = args
        .cookies
        .clone()
        .unwrap_or_else(|| settings.cookies_file.clone());
    let download_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.download_dir.clone());

    Ok(DownloadRequest {
        url,
        proxy,
        cookies_file,
        download_dir,
    })
}

fn parse_label_filter(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    let labels: Vec<String> = raw
        .split(',')
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect();
    if labels.is_empty() { None } else { Some(labels) }
}

// ダウンロードを1回実行し、イベントを使い切るまで処理する。
// logs と session を更新するのはこのループだけ。
fn run_session(
    request: DownloadRequest,
    label_filter: Option<Vec<String>>,
    quiet_progress: bool,
) -> Result<i32, String> {
    let (tx, rx) = mpsc::channel();
    let mut session = Session::new(tx.clone());
    let mut logs = LogStore::new();

    let dir = request.download_dir.trim();
    if !dir.is_empty() {
        println!("保存先: {dir}");
    }
    println!("ダウンロードを開始します: {}", request.url.trim());

    let worker_tx = tx.clone();
    let worker = thread::spawn(move || download::run_download(request, worker_tx));
    session.mark_active();

    let mut exit_code = 0;
    let mut fatal = None;
    let mut line_open = false;
    while let Ok(event) = rx.recv() {
        match event {
            DownloadEvent::Stdout(line) => {
                session.apply_stdout_line(&line);
                let change = logs.append(&line, None);
                render_log_change(&logs, change, &label_filter, quiet_progress, &mut line_open);
            }
            DownloadEvent::Stderr(line) => {
                let change = logs.append(&line, Some("[warning]"));
                render_log_change(&logs, change, &label_filter, quiet_progress, &mut line_open);
            }
            DownloadEvent::Title(raw) => session.apply_title(&raw),
            DownloadEvent::SleepTick => {
                session.apply_sleep_tick();
                if !quiet_progress {
                    if let Some(remaining) = session.state().sleep_remaining {
                        print!("\rSleeping for {remaining:.1} seconds...    ");
                        let _ = io::stdout().flush();
                        line_open = true;
                    }
                }
            }
            DownloadEvent::Exit(code) => {
                if let Some(line) = session.apply_exit(code) {
                    let change = logs.append(&line, None);
                    render_log_change(&logs, change, &label_filter, quiet_progress, &mut line_open);
                }
                exit_code = code;
                break;
            }
            DownloadEvent::Fatal(err) => {
                fatal = Some(err);
                break;
            }
        }
    }

    close_open_line(&mut line_open);
    let _ = worker.join();
    session.shutdown();

    if let Some(err) = fatal {
        return Err(err);
    }

    print_summary(&logs, &session);
    Ok(exit_code)
}

// 1件のログ反映結果を端末に描画する。進捗行は \r で同一行を書き換える。
fn render_log_change(
    logs: &LogStore,
    change: LogChange,
    label_filter: &Option<Vec<String>>,
    quiet_progress: bool,
    line_open: &mut bool,
) {
    if change == LogChange::Repeated {
        return;
    }
    let Some(entry) = logs.last() else {
        return;
    };
    if let Some(filter) = label_filter {
        if !filter.contains(&parse::severity_label(&entry.message)) {
            return;
        }
    }

    let is_progress = parse::is_progress_line(&entry.message);
    if is_progress && quiet_progress {
        return;
    }

    let text = format!("[{}] {}", entry.timestamp, entry.message);
    if is_progress {
        print!("\r{text}    ");
        let _ = io::stdout().flush();
        *line_open = true;
    } else {
        close_open_line(line_open);
        println!("{text}");
    }
}

fn close_open_line(line_open: &mut bool) {
    if *line_open {
        println!();
        *line_open = false;
    }
}

// 終了後のまとめ。完了一覧と、失敗時は警告・エラーの抜粋を出す。
fn print_summary(logs: &LogStore, session: &Session) {
    let state = session.state();

    if !state.playlist_title.is_empty() {
        println!("プレイリスト: {}", state.playlist_title);
    }
    if !state.item_index.is_empty() {
        println!("処理アイテム: {}", state.item_index);
    }

    let rows = state.grouped_finished();
    if !rows.is_empty() {
        println!("完了一覧 ({}件):", rows.len());
        for row in &rows {
            let mark = match row.status {
                RowStatus::Success => "[OK]",
                RowStatus::Warning => "[!] ",
            };
            println!("  {mark} {} ({})", row.title, row.formats.join(" / "));
        }
    }

    match state.phase {
        Phase::Complete => println!("ダウンロード完了!"),
        Phase::Failed => {
            println!(
                "ダウンロードは失敗しました。中断時の進捗: {:.1}%",
                state.percent
            );
            if !state.current_title.is_empty() {
                println!("処理中だったアイテム: {}", state.current_title);
            }
            if !state.speed.is_empty() || !state.eta.is_empty() {
                println!("最後の計測: 速度 {} / 残り {}", state.speed, state.eta);
            }
            let recap_labels = ["error".to_string(), "warning".to_string()];
            let recap = logs.filtered(&recap_labels);
            if !recap.is_empty() {
                println!("エラーと警告の抜粋:");
                for entry in recap {
                    if entry.repeat_count > 1 {
                        println!("  [{}] {} (x{})", entry.timestamp, entry.message, entry.repeat_count);
                    } else {
                        println!("  [{}] {}", entry.timestamp, entry.message);
                    }
                }
            }
        }
        _ => {}
    }

    if !logs.is_empty() {
        println!("ログ {}件 (ラベル: {})", logs.len(), logs.labels().join(", "));
    }
}
