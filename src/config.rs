//! Command-line host configuration / 命令行配置
//!
//! The binary reads one table definition from a JSON file:
//!
//! ```json
//! {
//!   "options": { "aws_access_key": "...", "aws_secret_key": "...", "bucket": "b", "filename": "f.csv" },
//!   "columns": ["id", "name"],
//!   "log_filter": "s3csv_fdw=debug"
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_LOG_FILTER: &str = "s3csv_fdw=info";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Table options, same names as the host passes / 表选项
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Declared column names / 列名
    #[serde(default)]
    pub columns: Vec<String>,
    /// Used when `RUST_LOG` is not set / 日志过滤
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path(arg: Option<&str>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE),
    }
}

/// Load configuration from file / 加载配置文件
pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;

    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))?;

    if config.columns.is_empty() {
        return Err(format!("Config file {:?} declares no columns", path));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = write_config(
            r#"{"options": {"bucket": "b", "filename": "f.csv"}, "columns": ["id", "name"]}"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.options.get("bucket").map(String::as_str), Some("b"));
        assert_eq!(config.columns, vec!["id", "name"]);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_load_config_errors() {
        let file = write_config(r#"{"options": {}, "columns": []}"#);
        assert!(load_config(file.path()).unwrap_err().contains("no columns"));

        let file = write_config("not json");
        assert!(load_config(file.path()).unwrap_err().contains("Failed to parse"));

        assert!(load_config(Path::new("/nonexistent/config.json"))
            .unwrap_err()
            .contains("Failed to read"));
    }

    #[test]
    fn test_config_path() {
        assert_eq!(get_config_path(Some("table.json")), PathBuf::from("table.json"));
        assert!(get_config_path(None).ends_with(DEFAULT_CONFIG_FILE));
    }
}
