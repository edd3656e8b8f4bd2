//! Output writers invoked by emission instructions.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::EmissionMode;
use crate::types::Value;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("table '{table}' was started with columns [{expected}], got [{found}]")]
    ColumnMismatch {
        table: String,
        expected: String,
        found: String,
    },
    #[error("cannot serialize process-mining record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Identifiers of a process-mining record: process, process instance and
/// (for events) event id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XesIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piid: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eid: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XesValue {
    pub key: String,
    #[serde(rename = "type")]
    pub xes_type: String,
    pub value: Value,
}

pub trait OutputSink {
    fn write_csv_row(&mut self, table: &str, columns: &[(String, Value)]) -> Result<(), SinkError>;
    fn write_log_line(&mut self, values: &[Value]) -> Result<(), SinkError>;
    fn write_xes_event(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError>;
    fn write_xes_trace(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

// ── Recording sink ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    CsvRow {
        table: String,
        columns: Vec<(String, Value)>,
    },
    LogLine(Vec<Value>),
    XesEvent {
        ids: XesIds,
        attributes: Vec<XesValue>,
    },
    XesTrace {
        ids: XesIds,
        attributes: Vec<XesValue>,
    },
}

/// Keeps every record in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub records: Vec<Record>,
    pub flushes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn csv_rows(&self, table: &str) -> Vec<&[(String, Value)]> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::CsvRow { table: t, columns } if t == table => Some(columns.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn log_lines(&self) -> Vec<&[Value]> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::LogLine(values) => Some(values.as_slice()),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn write_csv_row(&mut self, table: &str, columns: &[(String, Value)]) -> Result<(), SinkError> {
        self.records.push(Record::CsvRow {
            table: table.to_string(),
            columns: columns.to_vec(),
        });
        Ok(())
    }

    fn write_log_line(&mut self, values: &[Value]) -> Result<(), SinkError> {
        self.records.push(Record::LogLine(values.to_vec()));
        Ok(())
    }

    fn write_xes_event(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError> {
        self.records.push(Record::XesEvent {
            ids: ids.clone(),
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    fn write_xes_trace(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError> {
        self.records.push(Record::XesTrace {
            ids: ids.clone(),
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }
}

// ── Folder sink ─────────────────────────────────────────────────────────

pub const LOG_FILE: &str = "log.txt";
pub const XES_FILE: &str = "xes.jsonl";

struct CsvTable {
    header: Vec<String>,
    writer: BufWriter<File>,
    path: PathBuf,
}

/// Writes `<table>.csv` per table, `log.txt` and `xes.jsonl` into a folder.
/// In streaming mode every record is flushed as it is written.
pub struct FolderSink {
    folder: PathBuf,
    mode: EmissionMode,
    tables: HashMap<String, CsvTable>,
    log: Option<BufWriter<File>>,
    xes: Option<BufWriter<File>>,
}

impl FolderSink {
    pub fn new(folder: &Path, mode: EmissionMode) -> Result<Self, SinkError> {
        fs::create_dir_all(folder).map_err(|e| io_error(folder, e))?;
        Ok(Self {
            folder: folder.to_path_buf(),
            mode,
            tables: HashMap::new(),
            log: None,
            xes: None,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn open(&self, name: &str) -> Result<BufWriter<File>, SinkError> {
        let path = self.folder.join(name);
        let file = File::create(&path).map_err(|e| io_error(&path, e))?;
        Ok(BufWriter::new(file))
    }

    fn after_write(&mut self) -> Result<(), SinkError> {
        match self.mode {
            EmissionMode::Streaming => self.flush(),
            EmissionMode::Batch => Ok(()),
        }
    }

    fn write_xes(&mut self, kind: &str, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError> {
        if self.xes.is_none() {
            self.xes = Some(self.open(XES_FILE)?);
        }
        let line = serde_json::to_string(&XesLine {
            kind,
            ids,
            attributes,
        })?;
        let path = self.folder.join(XES_FILE);
        if let Some(w) = self.xes.as_mut() {
            writeln!(w, "{}", line).map_err(|e| io_error(&path, e))?;
        }
        self.after_write()
    }
}

#[derive(Serialize)]
struct XesLine<'a> {
    kind: &'a str,
    #[serde(flatten)]
    ids: &'a XesIds,
    attributes: &'a [XesValue],
}

impl OutputSink for FolderSink {
    fn write_csv_row(&mut self, table: &str, columns: &[(String, Value)]) -> Result<(), SinkError> {
        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        if !self.tables.contains_key(table) {
            let path = self.folder.join(format!("{}.csv", table));
            let mut writer = self.open(&format!("{}.csv", table))?;
            writeln!(writer, "{}", csv_line(names.iter().map(String::as_str)))
                .map_err(|e| io_error(&path, e))?;
            self.tables.insert(
                table.to_string(),
                CsvTable {
                    header: names.clone(),
                    writer,
                    path,
                },
            );
        }

        if let Some(entry) = self.tables.get_mut(table) {
            if entry.header != names {
                return Err(SinkError::ColumnMismatch {
                    table: table.to_string(),
                    expected: entry.header.join(", "),
                    found: names.join(", "),
                });
            }
            let cells: Vec<String> = columns.iter().map(|(_, v)| v.to_string()).collect();
            writeln!(entry.writer, "{}", csv_line(cells.iter().map(String::as_str)))
                .map_err(|e| io_error(&entry.path, e))?;
        }
        self.after_write()
    }

    fn write_log_line(&mut self, values: &[Value]) -> Result<(), SinkError> {
        if self.log.is_none() {
            self.log = Some(self.open(LOG_FILE)?);
        }
        let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let path = self.folder.join(LOG_FILE);
        if let Some(w) = self.log.as_mut() {
            writeln!(w, "{}", line.join(" ")).map_err(|e| io_error(&path, e))?;
        }
        self.after_write()
    }

    fn write_xes_event(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError> {
        self.write_xes("event", ids, attributes)
    }

    fn write_xes_trace(&mut self, ids: &XesIds, attributes: &[XesValue]) -> Result<(), SinkError> {
        self.write_xes("trace", ids, attributes)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        for table in self.tables.values_mut() {
            table.writer.flush().map_err(|e| io_error(&table.path, e))?;
        }
        if let Some(w) = self.log.as_mut() {
            w.flush().map_err(|e| io_error(&self.folder.join(LOG_FILE), e))?;
        }
        if let Some(w) = self.xes.as_mut() {
            w.flush().map_err(|e| io_error(&self.folder.join(XES_FILE), e))?;
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Quotes cells containing separators, quotes or line breaks.
pub fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .map(|cell| {
            if cell.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
