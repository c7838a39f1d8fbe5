//! S3 客户端
//!
//! `rust-s3` provides credentials, region/endpoint, addressing style and SigV4 signing. The
//! download itself is a presigned GET sent through a `reqwest` client whose TLS config carries
//! the hostname correction from [`super::tls`].

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;

use super::config::{AddressingStyle, Settings};
use super::tls;
use crate::error::{FdwError, Result};
use crate::storage::ObjectSource;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Lifetime of the presigned download URL
const PRESIGN_EXPIRE_SECS: u32 = 3600;

const SUPPORTED_SIGNATURE_VERSIONS: &[&str] = &["s3v4", "v4"];

/// One configured connection to the object store / S3 客户端句柄
pub struct S3Client {
    bucket_name: String,
    bucket: Box<Bucket>,
    http: reqwest::Client,
}

impl S3Client {
    /// 创建客户端
    pub fn new(settings: &Settings) -> Result<Self> {
        let bucket = Self::create_bucket(settings).map_err(|e| FdwError::ClientInit(e.to_string()))?;
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls::client_tls_config(settings.verify_ssl))
            .build()
            .map_err(|e| FdwError::ClientInit(format!("创建HTTP客户端失败: {}", e)))?;

        tracing::debug!(
            "S3 client ready: bucket={}, endpoint={}, path_style={}, verify_ssl={}",
            settings.bucket,
            settings.endpoint.as_deref().unwrap_or("aws"),
            settings.addressing_style == AddressingStyle::Path,
            settings.verify_ssl
        );

        Ok(Self {
            bucket_name: settings.bucket.clone(),
            bucket,
            http,
        })
    }

    /// 创建S3 Bucket客户端
    fn create_bucket(settings: &Settings) -> anyhow::Result<Box<Bucket>> {
        let signature = settings.signature_version.to_ascii_lowercase();
        if !SUPPORTED_SIGNATURE_VERSIONS.contains(&signature.as_str()) {
            return Err(anyhow!(
                "unsupported signature version `{}` (supported: s3v4)",
                settings.signature_version
            ));
        }

        let credentials = Credentials::new(
            Some(&settings.credentials.access_key),
            Some(&settings.credentials.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| anyhow!("创建S3凭证失败: {}", e))?;

        let region_name = settings
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = match &settings.endpoint {
            Some(endpoint) => {
                let url = url::Url::parse(endpoint)
                    .map_err(|e| anyhow!("invalid endpoint `{}`: {}", endpoint, e))?;
                if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                    return Err(anyhow!("invalid endpoint `{}`: expected http(s)://host", endpoint));
                }
                endpoint.trim_end_matches('/').to_string()
            }
            None => format!("https://s3.{}.amazonaws.com", region_name),
        };
        let region = Region::Custom {
            region: region_name,
            endpoint,
        };

        let bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| anyhow!("创建S3 Bucket失败: {}", e))?;

        let bucket = match settings.addressing_style {
            AddressingStyle::Path => bucket.with_path_style(),
            AddressingStyle::Virtual => bucket,
        };

        Ok(bucket)
    }

    /// Signed GET URL for `key` / 生成预签名URL
    pub async fn presigned_url(&self, key: &str) -> Result<String> {
        self.bucket
            .presign_get(key, PRESIGN_EXPIRE_SECS, None)
            .await
            .map_err(|e| FdwError::fetch(&self.bucket_name, key, format!("生成预签名URL失败: {}", e)))
    }
}

#[async_trait]
impl ObjectSource for S3Client {
    async fn fetch(&self, key: &str) -> Result<Bytes> {
        let url = self.presigned_url(key).await?;
        let fail = |cause: String| FdwError::fetch(&self.bucket_name, key, cause);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let cause = match s3_error_code(&body) {
                Some(code) => format!("HTTP {} ({})", status, code),
                None => format!("HTTP {}", status),
            };
            return Err(fail(cause));
        }

        // 流式读取到内存
        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fail(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
        }

        tracing::debug!("S3 object downloaded: bucket={}, key={}, size={}", self.bucket_name, key, buffer.len());
        Ok(buffer.freeze())
    }
}

/// `<Code>` element of an S3 XML error body
fn s3_error_code(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut in_code = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => in_code = e.local_name().as_ref() == b"Code",
            Ok(Event::Text(e)) if in_code => return e.unescape().ok().map(|text| text.into_owned()),
            Ok(Event::End(_)) => in_code = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}
