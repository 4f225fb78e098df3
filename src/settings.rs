use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::paths::{default_download_dir, make_absolute_path, settings_file_path};

// settings.properties に保存する既定値。コマンドライン引数が指定された場合はそちらが優先される。
#[derive(Clone, Debug)]
pub struct SettingsData {
    pub download_dir: String,
    pub proxy: String,
    pub cookies_file: String,
}

impl SettingsData {
    pub fn load() -> Self {
        let props = read_properties_from_path(&settings_file_path()).unwrap_or_default();
        Self::from_properties(&props)
    }

    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let download_dir = props
            .get("download.dir")
            .map(|value| normalize_dir(value))
            .unwrap_or_else(default_download_dir)
            .to_string_lossy()
            .to_string();
        let proxy = props
            .get("network.proxy")
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        let cookies_file = props
            .get("cookies.file")
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        Self {
            download_dir,
            proxy,
            cookies_file,
        }
    }

    pub fn save(&self) -> Result<(), String> {
        let path = settings_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        fs::write(path, self.to_properties_string()).map_err(|err| err.to_string())
    }

    fn to_properties_string(&self) -> String {
        let mut lines = Vec::new();
        let download_dir = self.download_dir.trim();
        lines.push(format!("download.dir={download_dir}"));
        lines.push(format!("network.proxy={}", self.proxy.trim()));
        lines.push(format!("cookies.file={}", self.cookies_file.trim()));
        lines.join("\n")
    }
}

fn read_properties_from_path(path: &Path) -> Option<HashMap<String, String>> {
    let mut props = HashMap::new();
    let contents = fs::read_to_string(path).ok()?;

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let mut split = line.splitn(2, |c| c == '=' || c == ':');
        let key = split.next().unwrap_or("").trim();
        let value = split.next().unwrap_or("").trim();
        if !key.is_empty() {
            props.insert(key.to_string(), value.to_string());
        }
    }
    Some(props)
}

fn normalize_dir(value: &str) -> std::path::PathBuf {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return default_download_dir();
    }
    make_absolute_path(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_properties_with_comments_and_colons() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.properties");
        fs::write(
            &path,
            "# コメント行\n! これも無視\ndownload.dir = /tmp/media \nnetwork.proxy: socks5://127.0.0.1:9050\n\ncookies.file=\n",
        )
        .expect("write settings");

        let props = read_properties_from_path(&path).expect("read properties");
        assert_eq!(
            props.get("download.dir").map(String::as_str),
            Some("/tmp/media")
        );
        assert_eq!(
            props.get("network.proxy").map(String::as_str),
            Some("socks5://127.0.0.1:9050")
        );
        assert_eq!(props.get("cookies.file").map(String::as_str), Some(""));
    }

    #[test]
    fn missing_file_yields_no_properties() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nothing.properties");
        assert!(read_properties_from_path(&missing).is_none());
    }

    #[test]
    fn empty_properties_fall_back_to_defaults() {
        let data = SettingsData::from_properties(&HashMap::new());
        assert_eq!(
            data.download_dir,
            default_download_dir().to_string_lossy().to_string()
        );
        assert!(data.proxy.is_empty());
        assert!(data.cookies_file.is_empty());
    }

    #[test]
    fn blank_download_dir_uses_default() {
        let mut props = HashMap::new();
        props.insert("download.dir".to_string(), "   ".to_string());
        let data = SettingsData::from_properties(&props);
        assert_eq!(
            data.download_dir,
            default_download_dir().to_string_lossy().to_string()
        );
    }

    #[test]
    fn round_trips_through_properties_string() {
        let data = SettingsData {
            download_dir: "/media/ytdl".to_string(),
            proxy: "http://proxy:8080".to_string(),
            cookies_file: "/tmp/cookies.txt".to_string(),
        };

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.properties");
        fs::write(&path, data.to_properties_string()).expect("write settings");

        let props = read_properties_from_path(&path).expect("read properties");
        let reloaded = SettingsData::from_properties(&props);
        assert_eq!(reloaded.download_dir, data.download_dir);
        assert_eq!(reloaded.proxy, data.proxy);
        assert_eq!(reloaded.cookies_file, data.cookies_file);
    }
}
