use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use super::{DownloadEvent, parse};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

// yt-dlp を起動し、標準出力・標準エラーを並列で読み取ってイベントに変換する。
// 行イベントが Exit より後に届かないよう、読み取りスレッドを回収してから終了コードを返す。
pub(super) fn run_downloader(
    downloader: &Path,
    args: &[String],
    tx: &mpsc::Sender<DownloadEvent>,
) -> Result<i32, String> {
    // yt-dlp (Python) が非ASCII出力を壊さないよう UTF-8 を強制する。
    let mut child = Command::new(downloader)
        .args(args)
        .env("PYTHONIOENCODING", "utf-8")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| format!("yt-dlpの起動に失敗しました: {err}"))?;

    let stdout_reader = spawn_stream_thread(child.stdout.take(), tx, StreamKind::Stdout);
    let stderr_reader = spawn_stream_thread(child.stderr.take(), tx, StreamKind::Stderr);

    let status = child
        .wait()
        .map_err(|err| format!("yt-dlpの終了待ちに失敗しました: {err}"))?;

    if let Some(handle) = stdout_reader {
        let _ = handle.join();
    }
    if let Some(handle) = stderr_reader {
        let _ = handle.join();
    }

    Ok(status.code().unwrap_or(-1))
}

// Optional Reader を読み取りスレッドへ渡すためのヘルパー。
fn spawn_stream_thread<R: Read + Send + 'static>(
    reader: Option<R>,
    tx: &mpsc::Sender<DownloadEvent>,
    kind: StreamKind,
) -> Option<thread::JoinHandle<()>> {
    let reader = reader?;
    let tx = tx.clone();
    Some(thread::spawn(move || stream_lines(reader, tx, kind)))
}

// 子プロセスのストリームを \r と \n の両方で行に分解してイベント化する。
// yt-dlp の進捗表示は \r で同一行を書き換えるため、\n だけでは進捗が取れない。
fn stream_lines<R: Read + Send + 'static>(
    reader: R,
    tx: mpsc::Sender<DownloadEvent>,
    kind: StreamKind,
) {
    let mut buffered = BufReader::new(reader);
    let mut buf = [0u8; 4096];
    let mut line = Vec::new();
    loop {
        let read = match buffered.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        for &byte in &buf[..read] {
            if byte == b'\n' || byte == b'\r' {
                if !line.is_empty() {
                    if let Ok(text) = String::from_utf8(line.clone()) {
                        handle_stream_line(&text, &tx, kind);
                    } else {
                        let text = String::from_utf8_lossy(&line).to_string();
                        handle_stream_line(&text, &tx, kind);
                    }
                    line.clear();
                }
            } else {
                line.push(byte);
            }
        }
    }
    if !line.is_empty() {
        let text = String::from_utf8_lossy(&line).to_string();
        handle_stream_line(&text, &tx, kind);
    }
}

// 空行を捨てる。タイトルが取れる標準出力行は Title イベントを先に送る。
fn handle_stream_line(line: &str, tx: &mpsc::Sender<DownloadEvent>, kind: StreamKind) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    match kind {
        StreamKind::Stdout => {
            if trimmed.contains("[download] Destination:") || trimmed.contains("[info]") {
                if let Some(title) = parse::extract_destination_title(trimmed) {
                    let _ = tx.send(DownloadEvent::Title(title));
                }
            }
            let _ = tx.send(DownloadEvent::Stdout(trimmed.to_string()));
        }
        StreamKind::Stderr => {
            let _ = tx.send(DownloadEvent::Stderr(trimmed.to_string()));
        }
    }
}
