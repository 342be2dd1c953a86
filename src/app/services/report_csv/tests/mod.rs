//! Test utilities for the report CSV pipeline
//!
//! Fixture builders for report text, gzip payloads and a recording sink.

use crate::app::models::{AccountId, DateRangeKind, MappedRecord, ReportJob, ReportType};
use crate::app::services::persistence::RecordSink;
use crate::{Error, Result};
use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::sync::Mutex;


pub const ACCOUNT_HEADER: &str = "Day,Account,Cost,Clicks,Impressions,CTR,Device,Network";

/// Sink recording the size of every flush
pub struct RecordingSink<R> {
    pub flushes: Mutex<Vec<Vec<MappedRecord<R>>>>,
    pub fail_on_flush: Option<usize>,
}

impl<R> RecordingSink<R> {
    pub fn new() -> Self {
        Self {
            flushes: Mutex::new(Vec::new()),
            fail_on_flush: None,
        }
    }

    /// Fail the flush with this zero-based index
    pub fn failing_at(flush_index: usize) -> Self {
        Self {
            flushes: Mutex::new(Vec::new()),
            fail_on_flush: Some(flush_index),
        }
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.flushes.lock().unwrap().iter().map(Vec::len).collect()
    }
}

impl<R: Send + Sync> RecordSink<R> for RecordingSink<R> {
    fn flush(&self, records: Vec<MappedRecord<R>>) -> Result<()> {
        let mut flushes = self.flushes.lock().unwrap();
        if self.fail_on_flush == Some(flushes.len()) {
            return Err(Error::persistence("store unavailable"));
        }
        flushes.push(records);
        Ok(())
    }
}

pub fn account_job(account: u64) -> ReportJob {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    ReportJob::new(
        AccountId(account),
        ReportType::AccountPerformance,
        DateRangeKind::LastMonth,
        start,
        end,
        vec![],
    )
    .unwrap()
}

/// Account performance report with `rows` data rows and an optional trailer
pub fn account_report(rows: usize, trailer: bool) -> String {
    let mut text = String::from(ACCOUNT_HEADER);
    text.push('\n');
    for i in 0..rows {
        text.push_str(&format!(
            "2024-01-{:02},Test Account,{},{},{},1.5%,Computers,Search Network\n",
            (i % 28) + 1,
            (i + 1) * 1_000_000,
            i + 1,
            (i + 1) * 10
        ));
    }
    if trailer {
        text.push_str(&format!("Total,--,{},{},{},--,--,--\n", 1, 2, 3));
    }
    text
}

pub fn gzip(text: &str) -> Vec<u8> {
    gzip_bytes(text.as_bytes())
}

pub fn gzip_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}
