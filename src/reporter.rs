//! Host reporting / 宿主日志上报
//!
//! The host framework decides how errors and warnings reach the user. The wrapper only
//! talks to a [`Reporter`]; by default that is [`TracingReporter`].

use std::sync::Arc;

/// Report severity / 上报级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Debug,
    Warning,
    Error,
}

/// Sink for messages addressed to the host / 宿主消息接收方
pub trait Reporter: Send + Sync {
    fn report(&self, level: ReportLevel, message: &str);
}

pub type SharedReporter = Arc<dyn Reporter>;

/// Forwards reports to `tracing` / 转发到 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: ReportLevel, message: &str) {
        match level {
            ReportLevel::Debug => tracing::debug!("{}", message),
            ReportLevel::Warning => tracing::warn!("{}", message),
            ReportLevel::Error => tracing::error!("{}", message),
        }
    }
}
