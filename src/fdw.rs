//! Foreign-table wrapper / 外部表包装器
//!
//! Entry point used by the host: build once per table definition, then call
//! [`S3CsvFdw::execute`] for every scan.

use std::collections::HashMap;
use std::sync::Arc;

use crate::drivers::s3::{S3SourceFactory, Settings};
use crate::error::Result;
use crate::reporter::{ReportLevel, SharedReporter, TracingReporter};
use crate::scan::RowProducer;
use crate::storage::SourceFactory;

/// Predicate handed down by the host; accepted but never applied / 查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qual {
    pub field_name: String,
    pub operator: String,
    pub value: Option<String>,
}

/// S3 CSV foreign table
pub struct S3CsvFdw {
    settings: Arc<Settings>,
    columns: Vec<String>,
    factory: Arc<dyn SourceFactory>,
    reporter: SharedReporter,
}

impl S3CsvFdw {
    /// Build with the S3 source and `tracing` reporting
    pub fn new(options: &HashMap<String, String>, columns: Vec<String>) -> Result<Self> {
        Self::with_components(
            options,
            columns,
            Arc::new(S3SourceFactory),
            Arc::new(TracingReporter),
        )
    }

    pub fn with_reporter(
        options: &HashMap<String, String>,
        columns: Vec<String>,
        reporter: SharedReporter,
    ) -> Result<Self> {
        Self::with_components(options, columns, Arc::new(S3SourceFactory), reporter)
    }

    /// 校验配置并创建实例；配置错误时上报并返回错误
    pub fn with_components(
        options: &HashMap<String, String>,
        columns: Vec<String>,
        factory: Arc<dyn SourceFactory>,
        reporter: SharedReporter,
    ) -> Result<Self> {
        let settings = match Settings::from_options(options) {
            Ok(settings) => settings,
            Err(e) => {
                reporter.report(ReportLevel::Error, &e.to_string());
                return Err(e);
            }
        };

        tracing::info!(
            "Foreign table ready: source={}, bucket={}, key={}, columns={}",
            factory.source_type(),
            settings.bucket,
            settings.key,
            columns.len()
        );

        Ok(Self {
            settings: Arc::new(settings),
            columns,
            factory,
            reporter,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Declared column schema / 列定义
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Start a scan / 开始一次扫描
    ///
    /// `quals` and `columns` are not pushed down: every record is returned, truncated to the
    /// declared schema width. Nothing is downloaded until the first row is pulled.
    pub fn execute(&self, quals: &[Qual], columns: &[String]) -> RowProducer {
        if !quals.is_empty() {
            self.reporter.report(
                ReportLevel::Debug,
                &format!("{} qual(s) ignored, scanning all rows", quals.len()),
            );
        }
        tracing::debug!(
            "Scan requested: {} of {} column(s)",
            columns.len(),
            self.columns.len()
        );
        RowProducer::new(
            self.settings.clone(),
            self.columns.len(),
            self.factory.clone(),
            self.reporter.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FdwError;
    use crate::reporter::testing::RecordingReporter;
    use crate::scan::Row;
    use crate::storage::testing::MemorySourceFactory;
    use futures::TryStreamExt;

    fn options(extra: &[(&str, &str)]) -> HashMap<String, String> {
        [
            ("aws_access_key", "AKIA"),
            ("aws_secret_key", "secret"),
            ("bucket", "my-bucket"),
            ("filename", "data.csv"),
        ]
        .iter()
        .chain(extra.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn columns(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{}", i)).collect()
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    async fn scan(fdw: &S3CsvFdw) -> Result<Vec<Row>> {
        fdw.execute(&[], fdw.columns()).into_stream().try_collect().await
    }

    #[test]
    fn test_construction_fails_without_required_options() {
        for missing in ["aws_access_key", "aws_secret_key", "bucket", "filename"] {
            let mut opts = options(&[]);
            opts.remove(missing);
            let reporter = Arc::new(RecordingReporter::default());
            let factory = Arc::new(MemorySourceFactory::default());
            let result = S3CsvFdw::with_components(&opts, columns(2), factory.clone(), reporter.clone());

            assert!(matches!(result, Err(FdwError::Configuration { .. })));
            assert_eq!(reporter.count(ReportLevel::Error), 1);
            assert!(reporter.messages(ReportLevel::Error)[0].contains(missing));
            assert_eq!(factory.created(), 0);
        }
    }

    #[tokio::test]
    async fn test_end_to_end_header_skip() {
        let content = "a,b,c\n1,,3\n4,5,6\n";

        let factory = Arc::new(MemorySourceFactory::with_object("data.csv", content));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(&options(&[("header", "true")]), columns(3), factory, reporter).unwrap();
        assert_eq!(
            scan(&fdw).await.unwrap(),
            vec![vec![s("1"), None, s("3")], vec![s("4"), s("5"), s("6")]]
        );

        let factory = Arc::new(MemorySourceFactory::with_object("data.csv", content));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(&options(&[("skip_header", "2")]), columns(3), factory, reporter).unwrap();
        assert_eq!(scan(&fdw).await.unwrap(), vec![vec![s("4"), s("5"), s("6")]]);
    }

    #[tokio::test]
    async fn test_end_to_end_semicolon_dialect() {
        let factory = Arc::new(MemorySourceFactory::with_object("data.csv", "x;y\n\"a;b\";c\n"));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(
            &options(&[("delimiter", ";"), ("quotechar", "\"")]),
            columns(2),
            factory,
            reporter,
        )
        .unwrap();
        assert_eq!(
            scan(&fdw).await.unwrap(),
            vec![vec![s("x"), s("y")], vec![s("a;b"), s("c")]]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_missing_object() {
        let factory = Arc::new(MemorySourceFactory::with_object("other.csv", "1,2\n"));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(&options(&[]), columns(2), factory, reporter.clone()).unwrap();

        let mut producer = fdw.execute(&[], fdw.columns());
        assert!(matches!(producer.next_row().await, Err(FdwError::ObjectFetch { .. })));
        assert_eq!(reporter.count(ReportLevel::Error), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_wide_records() {
        let factory = Arc::new(MemorySourceFactory::with_object("data.csv", "1,2,3,4\n5,6,7,8\n"));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(&options(&[]), columns(2), factory, reporter.clone()).unwrap();

        assert_eq!(
            scan(&fdw).await.unwrap(),
            vec![vec![s("1"), s("2")], vec![s("5"), s("6")]]
        );
        assert_eq!(reporter.count(ReportLevel::Warning), 1);
    }

    #[tokio::test]
    async fn test_each_scan_builds_own_client() {
        let factory = Arc::new(MemorySourceFactory::with_object("data.csv", "1,2\n"));
        let reporter = Arc::new(RecordingReporter::default());
        let fdw = S3CsvFdw::with_components(&options(&[]), columns(2), factory.clone(), reporter.clone()).unwrap();

        let quals = vec![Qual {
            field_name: "c0".to_string(),
            operator: "=".to_string(),
            value: Some("9".to_string()),
        }];
        // Quals are not applied
        let rows: Vec<Row> = fdw.execute(&quals, &[]).into_stream().try_collect().await.unwrap();
        assert_eq!(rows, vec![vec![s("1"), s("2")]]);
        assert_eq!(scan(&fdw).await.unwrap().len(), 1);
        assert_eq!(factory.created(), 2);
        assert_eq!(reporter.count(ReportLevel::Debug), 1);
    }
}
