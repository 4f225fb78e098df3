use crate::paths::ToolPaths;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

// 1回のダウンロード要求。空文字列の項目は未指定として扱う。
#[derive(Clone, Debug, Default)]
pub struct DownloadRequest {
    pub url: String,
    pub proxy: String,
    pub cookies_file: String,
    pub download_dir: String,
}

// yt-dlp へ渡す引数列を組み立てる。失敗しない全関数で、URL は必ず末尾に置く。
pub fn build_download_args(request: &DownloadRequest, tools: &ToolPaths) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(ffmpeg) = &tools.ffmpeg {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.to_string_lossy().to_string());
    }
    if let Some(deno) = &tools.deno {
        args.push("--js-runtimes".to_string());
        args.push(format!("deno:{}", deno.to_string_lossy()));
    }

    // スロットリング対策のスリープと各種リトライ。
    args.extend(vec![
        "--sleep-interval".to_string(),
        "7".to_string(),
        "--max-sleep-interval".to_string(),
        "15".to_string(),
        "--retries".to_string(),
        "5".to_string(),
        "--fragment-retries".to_string(),
        "5".to_string(),
        "--file-access-retries".to_string(),
        "3".to_string(),
        "--extractor-retries".to_string(),
        "3".to_string(),
    ]);

    // 再開と進捗報告。
    args.push("--continue".to_string());
    args.push("--no-part".to_string());
    args.push("--progress".to_string());

    // 一部の動画が落とせなくても処理全体は続行する。
    args.push("--ignore-errors".to_string());
    args.push("--skip-unavailable-fragments".to_string());
    args.push("--no-abort-on-error".to_string());

    args.push("--verbose".to_string());
    args.push("--no-quiet".to_string());

    args.push("--user-agent".to_string());
    args.push(USER_AGENT.to_string());

    // 非ASCII文字がサニタイズされないよう UTF-8 を強制する。
    args.push("--encoding".to_string());
    args.push("utf-8".to_string());

    // ライブ配信とメンバー限定コンテンツを除外する。
    args.push("--match-filter".to_string());
    args.push("!is_live & availability!=premium_only & availability!=subscriber_only".to_string());

    let proxy = request.proxy.trim();
    if !proxy.is_empty() {
        args.push("--proxy".to_string());
        args.push(proxy.to_string());
    }

    let cookies = request.cookies_file.trim();
    if !cookies.is_empty() {
        args.push("--cookies".to_string());
        args.push(cookies.to_string());
    }

    // 投稿者フォルダ付きの出力テンプレート。保存先未指定なら相対テンプレート。
    args.push("-o".to_string());
    if request.download_dir.trim().is_empty() {
        args.push("%(uploader)s/%(title)s.%(ext)s".to_string());
    } else {
        let normalized = request.download_dir.replace('\\', "/");
        args.push(format!("{normalized}/%(uploader)s/%(title)s.%(ext)s"));
    }

    // URL は必ず最後に置く。
    args.push(request.url.trim().to_string());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn url_is_last_and_optional_flags_are_omitted() {
        let request = DownloadRequest {
            url: "https://x".to_string(),
            ..DownloadRequest::default()
        };
        let args = build_download_args(&request, &ToolPaths::default());

        assert_eq!(args.last().map(String::as_str), Some("https://x"));
        assert!(!args.contains(&"--proxy".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.contains(&"--js-runtimes".to_string()));

        let o_index = args.iter().position(|a| a == "-o").expect("-o flag");
        assert_eq!(args[o_index + 1], "%(uploader)s/%(title)s.%(ext)s");
    }

    #[test]
    fn non_blank_proxy_adds_exactly_one_pair_before_url() {
        let request = DownloadRequest {
            url: "https://x".to_string(),
            proxy: " socks5://127.0.0.1:9050 ".to_string(),
            ..DownloadRequest::default()
        };
        let args = build_download_args(&request, &ToolPaths::default());

        let proxy_flags = args.iter().filter(|a| *a == "--proxy").count();
        assert_eq!(proxy_flags, 1);
        let index = args.iter().position(|a| a == "--proxy").expect("proxy flag");
        assert_eq!(args[index + 1], "socks5://127.0.0.1:9050");
        assert!(index + 1 < args.len() - 1);
    }

    #[test]
    fn whitespace_only_proxy_and_cookies_are_omitted() {
        let request = DownloadRequest {
            url: "https://x".to_string(),
            proxy: "   ".to_string(),
            cookies_file: "\t".to_string(),
            ..DownloadRequest::default()
        };
        let args = build_download_args(&request, &ToolPaths::default());

        assert!(!args.contains(&"--proxy".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn tool_paths_lead_the_argument_list() {
        let tools = ToolPaths {
            ffmpeg: Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")),
            deno: Some(PathBuf::from("/usr/local/bin/deno")),
        };
        let request = DownloadRequest {
            url: "https://x".to_string(),
            ..DownloadRequest::default()
        };
        let args = build_download_args(&request, &tools);

        assert_eq!(
            &args[..4],
            [
                "--ffmpeg-location",
                "/opt/ffmpeg/bin/ffmpeg",
                "--js-runtimes",
                "deno:/usr/local/bin/deno",
            ]
        );
    }

    #[test]
    fn output_template_normalizes_backslashes() {
        let request = DownloadRequest {
            url: "https://x".to_string(),
            download_dir: r"C:\Users\me\Downloads".to_string(),
            ..DownloadRequest::default()
        };
        let args = build_download_args(&request, &ToolPaths::default());

        let o_index = args.iter().position(|a| a == "-o").expect("-o flag");
        assert_eq!(
            args[o_index + 1],
            "C:/Users/me/Downloads/%(uploader)s/%(title)s.%(ext)s"
        );
    }

    #[test]
    fn fixed_flags_keep_a_stable_order() {
        let request = DownloadRequest {
            url: " https://www.youtube.com/watch?v=abc ".to_string(),
            proxy: "http://proxy:8080".to_string(),
            cookies_file: "/tmp/cookies.txt".to_string(),
            download_dir: "/media/ytdl".to_string(),
        };
        let args = build_download_args(&request, &ToolPaths::default());

        let expected: Vec<String> = [
            "--sleep-interval",
            "7",
            "--max-sleep-interval",
            "15",
            "--retries",
            "5",
            "--fragment-retries",
            "5",
            "--file-access-retries",
            "3",
            "--extractor-retries",
            "3",
            "--continue",
            "--no-part",
            "--progress",
            "--ignore-errors",
            "--skip-unavailable-fragments",
            "--no-abort-on-error",
            "--verbose",
            "--no-quiet",
            "--user-agent",
            USER_AGENT,
            "--encoding",
            "utf-8",
            "--match-filter",
            "!is_live & availability!=premium_only & availability!=subscriber_only",
            "--proxy",
            "http://proxy:8080",
            "--cookies",
            "/tmp/cookies.txt",
            "-o",
            "/media/ytdl/%(uploader)s/%(title)s.%(ext)s",
            "https://www.youtube.com/watch?v=abc",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(args, expected);
    }
}
