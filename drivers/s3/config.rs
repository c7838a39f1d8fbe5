//! S3 CSV 表配置
//!
//! Resolves the loose `name -> value` option map handed over by the host into a validated
//! [`Settings`]. Nothing here touches the network.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FdwError, Result};

pub const OPT_ACCESS_KEY: &str = "aws_access_key";
pub const OPT_SECRET_KEY: &str = "aws_secret_key";
pub const OPT_BUCKET: &str = "bucket";
pub const OPT_BUCKET_ALIAS: &str = "bucketname";
pub const OPT_FILENAME: &str = "filename";
pub const OPT_ENDPOINT: &str = "endpoint";
pub const OPT_REGION: &str = "region";
pub const OPT_VERIFY_SSL: &str = "verify_ssl";
pub const OPT_SIGNATURE_VERSION: &str = "signature_version";
pub const OPT_ADDRESSING_STYLE: &str = "addressing_style";
pub const OPT_DELIMITER: &str = "delimiter";
pub const OPT_QUOTECHAR: &str = "quotechar";
pub const OPT_QUOTE_ALIAS: &str = "quote";
pub const OPT_SKIP_HEADER: &str = "skip_header";
pub const OPT_HEADER: &str = "header";

pub const DEFAULT_SIGNATURE_VERSION: &str = "s3v4";

/// Access key pair / 访问凭证
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// 寻址风格：路径风格 / 虚拟主机风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingStyle {
    #[default]
    Path,
    Virtual,
}

impl FromStr for AddressingStyle {
    type Err = FdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(AddressingStyle::Path),
            "virtual" => Ok(AddressingStyle::Virtual),
            other => Err(FdwError::invalid(
                OPT_ADDRESSING_STYLE,
                format!("expected `path` or `virtual`, got `{}`", other),
            )),
        }
    }
}

/// CSV 方言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

/// Resolved table settings / 表配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub credentials: Credentials,
    pub bucket: String,
    /// Object key of the CSV file / 文件对象键
    pub key: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub verify_ssl: bool,
    pub signature_version: String,
    pub addressing_style: AddressingStyle,
    pub dialect: CsvDialect,
    /// Number of leading records to drop / 跳过的起始行数
    pub skip_header: usize,
}

impl Settings {
    /// Validate and normalize the host's option map / 校验并解析配置
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let access_key = required(options, &[OPT_ACCESS_KEY])?;
        let secret_key = required(options, &[OPT_SECRET_KEY])?;
        let bucket = required(options, &[OPT_BUCKET, OPT_BUCKET_ALIAS])?;
        let key = required(options, &[OPT_FILENAME])?;

        let addressing_style = match non_empty(options, OPT_ADDRESSING_STYLE) {
            Some(v) => v.parse()?,
            None => AddressingStyle::default(),
        };

        let defaults = CsvDialect::default();
        let delimiter = match options.get(OPT_DELIMITER) {
            Some(v) => single_byte(OPT_DELIMITER, v)?,
            None => defaults.delimiter,
        };
        let quote = match options
            .get(OPT_QUOTECHAR)
            .map(|v| (OPT_QUOTECHAR, v))
            .or_else(|| options.get(OPT_QUOTE_ALIAS).map(|v| (OPT_QUOTE_ALIAS, v)))
        {
            Some((name, v)) => single_byte(name, v)?,
            None => defaults.quote,
        };

        Ok(Self {
            credentials: Credentials {
                access_key,
                secret_key,
            },
            bucket,
            key,
            endpoint: non_empty(options, OPT_ENDPOINT),
            region: non_empty(options, OPT_REGION),
            verify_ssl: options
                .get(OPT_VERIFY_SSL)
                .map(|v| parse_bool(v))
                .unwrap_or(true),
            signature_version: non_empty(options, OPT_SIGNATURE_VERSION)
                .unwrap_or_else(|| DEFAULT_SIGNATURE_VERSION.to_string()),
            addressing_style,
            dialect: CsvDialect { delimiter, quote },
            skip_header: parse_skip_header(options)?,
        })
    }
}

/// Boolean-like option values / 布尔型选项
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// `skip_header` wins over `header`; both absent means no skipping.
pub fn parse_skip_header(options: &HashMap<String, String>) -> Result<usize> {
    if let Some(raw) = options.get(OPT_SKIP_HEADER) {
        return raw.trim().parse::<usize>().map_err(|_| {
            FdwError::invalid(
                OPT_SKIP_HEADER,
                format!("expected a non-negative integer, got `{}`", raw),
            )
        });
    }
    if let Some(raw) = options.get(OPT_HEADER) {
        return Ok(if parse_bool(raw) { 1 } else { 0 });
    }
    Ok(0)
}

/// First non-empty value among `names`; error names the primary key.
fn required(options: &HashMap<String, String>, names: &[&str]) -> Result<String> {
    names
        .iter()
        .find_map(|name| non_empty(options, name))
        .ok_or_else(|| FdwError::missing(names[0]))
}

fn non_empty(options: &HashMap<String, String>, name: &str) -> Option<String> {
    options
        .get(name)
        .filter(|v| !v.is_empty())
        .cloned()
}

fn single_byte(name: &str, value: &str) -> Result<u8> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(FdwError::invalid(
            name,
            format!("expected a single ASCII character, got `{}`", value),
        )),
    }
}
