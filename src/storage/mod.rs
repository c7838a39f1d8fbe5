use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::drivers::s3::Settings;
use crate::error::Result;

/// Configuration item definition / 配置项定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigItem {
    pub name: String,
    /// Alternative option names accepted for the same setting / 别名
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub aliases: Vec<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ConfigItem {
    pub fn new(name: &str, item_type: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            item_type: item_type.to_string(),
            default: None,
            options: None,
            required: false,
            help: None,
        }
    }

    pub fn alias(mut self, val: &str) -> Self {
        self.aliases.push(val.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, val: &str) -> Self {
        self.default = Some(val.to_string());
        self
    }

    pub fn help(mut self, val: &str) -> Self {
        self.help = Some(val.to_string());
        self
    }

    pub fn options(mut self, val: &str) -> Self {
        self.options = Some(val.to_string());
        self
    }
}

/// A fetched object source (one per scan) / 对象读取源
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Download the whole object into memory / 下载整个对象到内存
    ///
    /// Failures are `FdwError::ObjectFetch` carrying the bucket, key and cause.
    async fn fetch(&self, key: &str) -> Result<Bytes>;
}

/// Source factory trait / 读取源工厂 trait
pub trait SourceFactory: Send + Sync {
    /// Source type name / 类型名称
    fn source_type(&self) -> &'static str;

    /// Build a fresh client handle for one scan / 为一次扫描创建客户端
    fn create_source(&self, settings: &Settings) -> Result<Box<dyn ObjectSource>>;

    /// Options accepted by this source / 支持的配置项
    fn option_items(&self) -> Vec<ConfigItem>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::FdwError;

    /// Objects served from memory; counts how many client handles were built
    #[derive(Default)]
    pub struct MemorySourceFactory {
        pub objects: HashMap<String, Bytes>,
        pub fail_init: bool,
        pub created: AtomicUsize,
    }

    impl MemorySourceFactory {
        pub fn with_object(key: &str, content: &str) -> Self {
            let mut factory = Self::default();
            factory
                .objects
                .insert(key.to_string(), Bytes::from(content.to_string()));
            factory
        }

        pub fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    struct MemorySource {
        bucket: String,
        objects: HashMap<String, Bytes>,
    }

    #[async_trait]
    impl ObjectSource for MemorySource {
        async fn fetch(&self, key: &str) -> Result<Bytes> {
            self.objects
                .get(key)
                .cloned()
                .ok_or_else(|| FdwError::fetch(&self.bucket, key, "HTTP 404 Not Found (NoSuchKey)"))
        }
    }

    impl SourceFactory for MemorySourceFactory {
        fn source_type(&self) -> &'static str {
            "memory"
        }

        fn create_source(&self, settings: &Settings) -> Result<Box<dyn ObjectSource>> {
            if self.fail_init {
                return Err(FdwError::ClientInit("invalid credentials".to_string()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemorySource {
                bucket: settings.bucket.clone(),
                objects: self.objects.clone(),
            }))
        }

        fn option_items(&self) -> Vec<ConfigItem> {
            Vec::new()
        }
    }
}
