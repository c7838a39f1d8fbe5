//! S3 CSV 读取驱动

pub mod client;
pub mod config;
pub mod factory;
pub mod tls;

pub use client::S3Client;
pub use config::{AddressingStyle, Credentials, CsvDialect, Settings};
pub use factory::S3SourceFactory;
