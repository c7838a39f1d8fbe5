pub mod config;
pub mod error;
pub mod fdw;
pub mod reporter;
pub mod scan;
pub mod storage;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use error::{FdwError, Result, WidthMismatch};
pub use fdw::{Qual, S3CsvFdw};
pub use scan::{Row, RowProducer, RowReader, ScanPhase};
