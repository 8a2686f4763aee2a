//! File sinks: Graphite-line and CSV variants of `--flush-file` /
//! `--flush-file-csv`. Grounded on `navdoon.destination.stream.Stream`
//! generalized from a stream handle to an append-mode file.

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::SinkError;
use crate::shelf::Snapshot;

use super::Sink;

pub struct FileSink {
    path: String,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<String>) -> Self {
        FileSink {
            path: path.into(),
            file: None,
        }
    }

    async fn file(&mut self) -> Result<&mut File, SinkError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| SinkError::Io {
                    sink: self.path.clone(),
                    source: e,
                })?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("file opened above"))
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.path
    }

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError> {
        let path = self.path.clone();
        let mut buf = String::new();
        for record in &batch.records {
            buf.push_str(&format!("{} {} {}\n", record.name, record.value, record.timestamp));
        }
        let file = self.file().await?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| SinkError::Io { sink: path.clone(), source: e })?;
        file.flush().await.map_err(|e| SinkError::Io { sink: path, source: e })
    }
}

/// CSV variant: one row per record, columns `name,value,timestamp`.
pub struct FileCsvSink {
    path: String,
    file: Option<File>,
    header_written: bool,
}

impl FileCsvSink {
    pub fn new(path: impl Into<String>) -> Self {
        FileCsvSink {
            path: path.into(),
            file: None,
            header_written: false,
        }
    }

    async fn file(&mut self) -> Result<&mut File, SinkError> {
        if self.file.is_none() {
            let existed = tokio::fs::metadata(&self.path).await.is_ok();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| SinkError::Io {
                    sink: self.path.clone(),
                    source: e,
                })?;
            self.header_written = existed;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("file opened above"))
    }
}

#[async_trait]
impl Sink for FileCsvSink {
    fn name(&self) -> &str {
        &self.path
    }

    async fn flush(&mut self, batch: &Snapshot) -> Result<(), SinkError> {
        let path = self.path.clone();
        self.file().await?; // establishes header_written from the file's pre-existence
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if !self.header_written {
            writer
                .write_record(["name", "value", "timestamp"])
                .map_err(|e| SinkError::Other {
                    sink: path.clone(),
                    message: e.to_string(),
                })?;
        }
        for record in &batch.records {
            writer
                .write_record(&[
                    record.name.clone(),
                    record.value.to_string(),
                    record.timestamp.to_string(),
                ])
                .map_err(|e| SinkError::Other {
                    sink: path.clone(),
                    message: e.to_string(),
                })?;
        }
        let bytes = writer.into_inner().map_err(|e| SinkError::Other {
            sink: path.clone(),
            message: e.to_string(),
        })?;
        self.header_written = true;

        let file = self.file().await?;
        file.write_all(&bytes)
            .await
            .map_err(|e| SinkError::Io { sink: path.clone(), source: e })?;
        file.flush().await.map_err(|e| SinkError::Io { sink: path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shelf::Record;

    fn batch(records: &[(&str, f64, f64)]) -> Snapshot {
        Snapshot {
            records: records
                .iter()
                .map(|(name, value, timestamp)| Record {
                    name: name.to_string(),
                    value: *value,
                    timestamp: *timestamp,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn file_sink_appends_graphite_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.txt");
        let mut sink = FileSink::new(path.to_str().unwrap());

        sink.flush(&batch(&[("event", 3.0, 1.0)])).await.unwrap();
        sink.flush(&batch(&[("process.count", 1.0, 2.0)])).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "event 3 1\nprocess.count 1 2\n");
    }

    #[tokio::test]
    async fn file_csv_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let mut sink = FileCsvSink::new(path.to_str().unwrap());

        sink.flush(&batch(&[("event", 3.0, 1.0)])).await.unwrap();
        sink.flush(&batch(&[("event", 4.0, 2.0)])).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("name,value,timestamp"));
        assert_eq!(lines.next(), Some("event,3,1"));
        assert_eq!(lines.next(), Some("event,4,2"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn file_csv_sink_does_not_repeat_header_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut first = FileCsvSink::new(path.to_str().unwrap());
        first.flush(&batch(&[("event", 1.0, 1.0)])).await.unwrap();

        let mut second = FileCsvSink::new(path.to_str().unwrap());
        second.flush(&batch(&[("event", 2.0, 2.0)])).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("name,value,timestamp").count(), 1);
    }
}
