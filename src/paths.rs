use std::path::PathBuf;

use crate::fs_utils::is_executable;

// yt-dlp に渡す補助ツールの解決済みパス。存在しないツールは None のまま引数から外す。
#[derive(Clone, Debug, Default)]
pub struct ToolPaths {
    pub ffmpeg: Option<PathBuf>,
    pub deno: Option<PathBuf>,
}

pub fn default_download_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join("Downloads").join("YtDlpTracker")
}

pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".ytdltracker")
}

pub fn settings_file_path() -> PathBuf {
    app_data_dir().join("settings.properties")
}

pub fn make_absolute_path(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub fn bin_dir() -> PathBuf {
    app_data_dir().join("bin")
}

pub fn yt_dlp_path() -> PathBuf {
    bin_dir().join("yt-dlp")
}

pub fn ffmpeg_path() -> PathBuf {
    bin_dir().join("ffmpeg")
}

pub fn deno_path() -> PathBuf {
    bin_dir().join("deno")
}

// アプリ専用 bin に実行可能な yt-dlp があればそれを使い、無ければ PATH 上の名前に任せる。
pub fn resolve_downloader_path() -> PathBuf {
    let bundled = yt_dlp_path();
    if bundled.exists() && is_executable(&bundled) {
        bundled
    } else {
        PathBuf::from("yt-dlp")
    }
}

pub fn resolve_tool_paths() -> ToolPaths {
    ToolPaths {
        ffmpeg: existing_tool(ffmpeg_path()),
        deno: existing_tool(deno_path()),
    }
}

fn existing_tool(path: PathBuf) -> Option<PathBuf> {
    if path.exists() && is_executable(&path) {
        Some(path)
    } else {
        None
    }
}
