mod args;
pub(crate) mod parse;
mod process;

use std::path::Path;
use std::sync::mpsc;

use crate::fs_utils::{ensure_dir, is_executable};
use crate::paths::{resolve_downloader_path, resolve_tool_paths};

pub use args::{DownloadRequest, build_download_args};

// ダウンロード実行中にイベントループへ届く通知。
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadEvent {
    Stdout(String),
    Stderr(String),
    Title(String),
    SleepTick,
    Exit(i32),
    Fatal(String),
}

// ダウンロード処理のエントリポイント。ツール確認から終了コード通知までを統括する。
// ワーカースレッド上で実行し、結果はイベントとしてだけ報告する。
pub fn run_download(request: DownloadRequest, tx: mpsc::Sender<DownloadEvent>) {
    match run_download_inner(&request, &tx) {
        Ok(code) => {
            let _ = tx.send(DownloadEvent::Exit(code));
        }
        Err(err) => {
            let _ = tx.send(DownloadEvent::Fatal(err));
        }
    }
}

fn run_download_inner(
    request: &DownloadRequest,
    tx: &mpsc::Sender<DownloadEvent>,
) -> Result<i32, String> {
    // アプリ専用 bin の yt-dlp が使えない場合は PATH 上の名前で起動を試す。
    let downloader = resolve_downloader_path();
    if downloader.is_absolute() && (!downloader.exists() || !is_executable(&downloader)) {
        return Err("yt-dlpが見つかりません。".to_string());
    }

    let dir = request.download_dir.trim();
    if !dir.is_empty() {
        ensure_dir(Path::new(dir))
            .map_err(|err| format!("保存先フォルダの作成に失敗しました: {err}"))?;
    }

    let tools = resolve_tool_paths();
    let args = build_download_args(request, &tools);
    process::run_downloader(&downloader, &args, tx)
}
