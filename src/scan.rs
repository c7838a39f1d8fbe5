//! Streaming row producer / 流式行读取
//!
//! One scan = download the whole object, then hand out rows one at a time:
//!
//! `Init -> Downloading -> Parsing -> Done`, with `Failed` reachable from downloading or
//! parsing. A finished or failed producer keeps returning end-of-rows; a new scan needs a new
//! producer.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;

use crate::drivers::s3::{CsvDialect, Settings};
use crate::error::{FdwError, Result, WidthMismatch};
use crate::reporter::{ReportLevel, SharedReporter};
use crate::storage::SourceFactory;

/// Output row: one nullable string per column / 输出行
pub type Row = Vec<Option<String>>;

/// Parse phase over an in-memory buffer / 解析阶段
///
/// Skips the first `skip_header` lines, checks the width of the first surviving line once,
/// truncates every row to the schema width and turns empty fields into `None`. A blank line is
/// a line too: it counts toward the skip and comes out as an empty row.
pub struct RowReader {
    buffer: Bytes,
    records: csv::StringRecordsIntoIter<Cursor<Bytes>>,
    /// Blank lines found before `pending`
    blank_lines: usize,
    pending: Option<csv::StringRecord>,
    seen_record: bool,
    finished: bool,
    index: usize,
    skip_header: usize,
    width: usize,
    checked: bool,
    reporter: SharedReporter,
}

impl RowReader {
    pub fn new(
        buffer: Bytes,
        dialect: CsvDialect,
        skip_header: usize,
        width: usize,
        reporter: SharedReporter,
    ) -> Result<Self> {
        if let Err(e) = std::str::from_utf8(&buffer) {
            return Err(FdwError::Decode(format!(
                "invalid UTF-8 at byte {}",
                e.valid_up_to()
            )));
        }

        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(dialect.delimiter)
            .quote(dialect.quote)
            .from_reader(Cursor::new(buffer.clone()))
            .into_records();

        Ok(Self {
            buffer,
            records,
            blank_lines: 0,
            pending: None,
            seen_record: false,
            finished: false,
            index: 0,
            skip_header,
            width,
            checked: false,
            reporter,
        })
    }

    /// Pull the next record from the tokenizer, counting the blank lines it skipped over
    fn advance(&mut self) -> Result<()> {
        let content_start = match self.records.next() {
            Some(Ok(record)) => {
                let from = record.position().map_or(0, |p| p.byte() as usize);
                let start = from
                    + self.buffer[from..]
                        .iter()
                        .take_while(|b| matches!(b, b'\r' | b'\n'))
                        .count();
                self.pending = Some(record);
                start
            }
            Some(Err(e)) => return Err(FdwError::Decode(e.to_string())),
            None => {
                self.finished = true;
                self.buffer.len()
            }
        };
        self.blank_lines = blank_lines_before(&self.buffer, content_start, self.seen_record);
        self.seen_record |= self.pending.is_some();
        Ok(())
    }

    /// Header skip and one-time width check; `true` if the line is emitted
    fn admit(&mut self, len: usize) -> bool {
        let index = self.index;
        self.index += 1;
        if index < self.skip_header {
            return false;
        }
        if !self.checked {
            self.checked = true;
            if let Some(mismatch) = WidthMismatch::check(len, self.width) {
                self.reporter.report(ReportLevel::Warning, &mismatch.to_string());
            }
        }
        true
    }
}

/// Number of empty lines in the run of line breaks that ends at `end`
///
/// `\r\n`, `\r` and `\n` each end one line. After a record the first break is that record's
/// own terminator.
fn blank_lines_before(buffer: &[u8], end: usize, after_record: bool) -> usize {
    let run_start = buffer[..end]
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |i| i + 1);

    let run = &buffer[run_start..end];
    let mut breaks: usize = 0;
    let mut i = 0;
    while i < run.len() {
        i += if run[i] == b'\r' && run.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
        breaks += 1;
    }

    if after_record {
        breaks.saturating_sub(1)
    } else {
        breaks
    }
}

impl Iterator for RowReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.blank_lines > 0 {
                self.blank_lines -= 1;
                if self.admit(0) {
                    return Some(Ok(Vec::new()));
                }
                continue;
            }

            if let Some(record) = self.pending.take() {
                if !self.admit(record.len()) {
                    continue;
                }
                let row = record
                    .iter()
                    .take(self.width)
                    .map(|field| {
                        if field.is_empty() {
                            None
                        } else {
                            Some(field.to_string())
                        }
                    })
                    .collect();
                return Some(Ok(row));
            }

            if self.finished {
                return None;
            }
            if let Err(e) = self.advance() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

/// Observable scan phase / 扫描阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Init,
    Downloading,
    Parsing,
    Done,
    Failed,
}

enum ScanState {
    Init,
    Downloading,
    Parsing(RowReader),
    Done,
    Failed,
}

/// Single-use lazy row sequence for one scan / 单次扫描的行序列
pub struct RowProducer {
    settings: Arc<Settings>,
    width: usize,
    factory: Arc<dyn SourceFactory>,
    reporter: SharedReporter,
    state: ScanState,
}

impl RowProducer {
    pub fn new(
        settings: Arc<Settings>,
        width: usize,
        factory: Arc<dyn SourceFactory>,
        reporter: SharedReporter,
    ) -> Self {
        Self {
            settings,
            width,
            factory,
            reporter,
            state: ScanState::Init,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        match self.state {
            ScanState::Init => ScanPhase::Init,
            ScanState::Downloading => ScanPhase::Downloading,
            ScanState::Parsing(_) => ScanPhase::Parsing,
            ScanState::Done => ScanPhase::Done,
            ScanState::Failed => ScanPhase::Failed,
        }
    }

    /// Next row, `Ok(None)` at the end / 获取下一行
    ///
    /// The first call downloads the object. Errors are reported to the host and returned; the
    /// producer then stays failed.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            match &mut self.state {
                // A download whose future was dropped starts over
                ScanState::Init | ScanState::Downloading => {
                    self.state = ScanState::Downloading;
                    match self.download().await {
                        Ok(reader) => self.state = ScanState::Parsing(reader),
                        Err(e) => return Err(self.fail(e)),
                    }
                }
                ScanState::Parsing(reader) => match reader.next() {
                    Some(Ok(row)) => return Ok(Some(row)),
                    Some(Err(e)) => return Err(self.fail(e)),
                    None => {
                        tracing::debug!(
                            "Scan finished: bucket={}, key={}",
                            self.settings.bucket,
                            self.settings.key
                        );
                        self.state = ScanState::Done;
                        return Ok(None);
                    }
                },
                ScanState::Done | ScanState::Failed => return Ok(None),
            }
        }
    }

    /// Consume the producer as a `Stream`; ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> {
        futures::stream::try_unfold(self, |mut producer| async move {
            Ok(producer.next_row().await?.map(|row| (row, producer)))
        })
    }

    async fn download(&self) -> Result<RowReader> {
        let source = self.factory.create_source(&self.settings)?;
        tracing::debug!(
            "Downloading s3 object: bucket={}, key={}",
            self.settings.bucket,
            self.settings.key
        );
        let buffer = source.fetch(&self.settings.key).await?;
        RowReader::new(
            buffer,
            self.settings.dialect,
            self.settings.skip_header,
            self.width,
            self.reporter.clone(),
        )
    }

    fn fail(&mut self, error: FdwError) -> FdwError {
        self.state = ScanState::Failed;
        self.reporter.report(ReportLevel::Error, &error.to_string());
        error
    }
}
