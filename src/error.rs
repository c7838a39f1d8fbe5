//! Error taxonomy / 错误类型
//!
//! Every fatal failure of the wrapper is one of these variants. Width mismatches are
//! warnings and are carried by [`WidthMismatch`], never returned as an error.

use std::fmt;

use thiserror::Error;

/// Wrapper error / 外部表错误
#[derive(Debug, Error)]
pub enum FdwError {
    /// Required option missing, empty or invalid / 配置缺失或无效
    #[error("configuration error: option `{key}`: {reason}")]
    Configuration { key: String, reason: String },

    /// Object-store client could not be built / 客户端创建失败
    #[error("failed to create S3 client: {0}")]
    ClientInit(String),

    /// Download failed / 下载失败
    #[error("failed to download file {key} from bucket {bucket}: {cause}")]
    ObjectFetch {
        bucket: String,
        key: String,
        cause: String,
    },

    /// Buffer is not UTF-8 or a record could not be tokenized / 解码失败
    #[error("error reading CSV data: {0}")]
    Decode(String),
}

impl FdwError {
    pub fn missing(key: &str) -> Self {
        FdwError::Configuration {
            key: key.to_string(),
            reason: "missing required option".to_string(),
        }
    }

    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        FdwError::Configuration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fetch(bucket: &str, key: &str, cause: impl fmt::Display) -> Self {
        FdwError::ObjectFetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FdwError>;

/// Field count of the first data record vs. declared schema width / 列数不匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthMismatch {
    /// Record has this many more fields than the schema
    Excess(usize),
    /// Record has this many fewer fields than the schema
    Deficit(usize),
}

impl WidthMismatch {
    /// Compare a record width against the schema width; `None` when they agree.
    pub fn check(fields: usize, schema_width: usize) -> Option<Self> {
        if fields > schema_width {
            Some(WidthMismatch::Excess(fields - schema_width))
        } else if fields < schema_width {
            Some(WidthMismatch::Deficit(schema_width - fields))
        } else {
            None
        }
    }
}

impl fmt::Display for WidthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidthMismatch::Excess(n) => write!(
                f,
                "CSV file has more columns than defined in the table ({} extra)",
                n
            ),
            WidthMismatch::Deficit(n) => write!(
                f,
                "CSV file has fewer columns than defined in the table ({} missing)",
                n
            ),
        }
    }
}
