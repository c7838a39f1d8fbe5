//! S3驱动工厂

use super::client::{S3Client, DEFAULT_REGION};
use super::config::{self, Settings, DEFAULT_SIGNATURE_VERSION};
use crate::error::Result;
use crate::storage::{ConfigItem, ObjectSource, SourceFactory};

/// S3 CSV 读取源工厂
pub struct S3SourceFactory;

impl SourceFactory for S3SourceFactory {
    fn source_type(&self) -> &'static str {
        "s3"
    }

    fn create_source(&self, settings: &Settings) -> Result<Box<dyn ObjectSource>> {
        Ok(Box::new(S3Client::new(settings)?))
    }

    fn option_items(&self) -> Vec<ConfigItem> {
        vec![
            ConfigItem::new(config::OPT_ACCESS_KEY, "string")
                .help("Access Key ID")
                .required(),
            ConfigItem::new(config::OPT_SECRET_KEY, "password")
                .help("Secret Access Key")
                .required(),
            ConfigItem::new(config::OPT_BUCKET, "string")
                .alias(config::OPT_BUCKET_ALIAS)
                .help("S3 bucket name")
                .required(),
            ConfigItem::new(config::OPT_FILENAME, "string")
                .help("Object key of the CSV file")
                .required(),
            ConfigItem::new(config::OPT_ENDPOINT, "string")
                .help("Custom endpoint URL (MinIO: http://localhost:9000)"),
            ConfigItem::new(config::OPT_REGION, "string")
                .help(&format!("S3 region, {} when empty", DEFAULT_REGION)),
            ConfigItem::new(config::OPT_VERIFY_SSL, "bool")
                .default("true")
                .help("Verify the server certificate"),
            ConfigItem::new(config::OPT_SIGNATURE_VERSION, "select")
                .options(DEFAULT_SIGNATURE_VERSION)
                .default(DEFAULT_SIGNATURE_VERSION),
            ConfigItem::new(config::OPT_ADDRESSING_STYLE, "select")
                .options("path,virtual")
                .default("path"),
            ConfigItem::new(config::OPT_DELIMITER, "string")
                .default(","),
            ConfigItem::new(config::OPT_QUOTECHAR, "string")
                .alias(config::OPT_QUOTE_ALIAS)
                .default("\""),
            ConfigItem::new(config::OPT_SKIP_HEADER, "number")
                .help("Number of leading lines to skip; overrides `header`"),
            ConfigItem::new(config::OPT_HEADER, "bool")
                .default("false")
                .help("Skip one header line"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_items_required() {
        let items = S3SourceFactory.option_items();
        let required: Vec<&str> = items
            .iter()
            .filter(|i| i.required)
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(required, vec!["aws_access_key", "aws_secret_key", "bucket", "filename"]);

        let bucket = items.iter().find(|i| i.name == "bucket").unwrap();
        assert_eq!(bucket.aliases, vec!["bucketname"]);
    }
}
