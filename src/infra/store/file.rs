//! File-backed job store using a JSON-lines journal.
//!
//! Every create, update and log append is written as one journal line
//! before it becomes visible in memory. Opening the store replays the
//! journal, so job state survives a process restart.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::memory::Tables;
use crate::core::job::{JobRecord, JobUpdate, LogEntry, NewJob};
use crate::core::{JobStore, StoreError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JournalRecord {
    Created(JobRecord),
    Updated {
        process_id: String,
        update: JobUpdate,
    },
    Logged(LogEntry),
}

struct Journal {
    tables: Tables,
    file: File,
}

impl Journal {
    fn write(&mut self, record: &JournalRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}

#[derive(Default)]
struct Replayed {
    tables: Tables,
    /// Byte length of the journal up to the last complete record.
    good_len: u64,
    torn: bool,
    missing_newline: bool,
}

impl Replayed {
    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Created(record) => {
                self.tables.jobs.insert(record.process_id.clone(), record);
            }
            JournalRecord::Updated { process_id, update } => {
                self.tables.update(&process_id, &update);
            }
            JournalRecord::Logged(entry) => {
                if let Err(e) = self.tables.append_log(entry) {
                    tracing::warn!("skipping orphaned journal log line: {e}");
                }
            }
        }
    }
}

/// Journal-backed store. One mutex covers both the journal append and the
/// in-memory index, which is what makes get-or-create atomic.
///
/// Journal appends are blocking writes made while that mutex is held, so a
/// write occupies the calling runtime worker until the line is flushed.
/// Each call appends a single short line; callers with slow disks should
/// run a multi-thread runtime or place the store behind
/// `tokio::task::spawn_blocking`.
pub struct FileJobStore {
    path: PathBuf,
    journal: Mutex<Journal>,
}

impl FileJobStore {
    /// Open (or create) the journal `<dir>/<stream>.jsonl` and replay it.
    ///
    /// A final line that does not parse is the remains of a write cut short
    /// by a crash. It is dropped and the file truncated back to the last
    /// complete record. A bad line anywhere else fails the open.
    pub fn open(dir: impl AsRef<Path>, stream: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        let path = dir.join(format!("{stream}.jsonl"));
        let replayed = Self::replay(&path)?;
        if replayed.torn {
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(replayed.good_len)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if replayed.missing_newline {
            writeln!(file)?;
            file.flush()?;
        }
        tracing::debug!(
            path = %path.display(),
            jobs = replayed.tables.jobs.len(),
            "job journal opened"
        );
        Ok(Self {
            path,
            journal: Mutex::new(Journal {
                tables: replayed.tables,
                file,
            }),
        })
    }

    fn replay(path: &Path) -> Result<Replayed, StoreError> {
        let mut replayed = Replayed::default();
        if !path.exists() {
            return Ok(replayed);
        }
        let bytes = std::fs::read(path)?;
        let lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
        let mut offset = 0;
        for (idx, line) in lines.iter().enumerate() {
            let end = offset + line.len();
            let next = if end < bytes.len() { end + 1 } else { end };
            if line.iter().all(u8::is_ascii_whitespace) {
                offset = next;
                continue;
            }
            match serde_json::from_slice::<JournalRecord>(line) {
                Ok(record) => {
                    replayed.apply(record);
                    replayed.good_len = next as u64;
                    replayed.missing_newline = next == end;
                }
                Err(e) => {
                    let is_tail = lines[idx + 1..]
                        .iter()
                        .all(|rest| rest.iter().all(u8::is_ascii_whitespace));
                    if !is_tail {
                        return Err(e.into());
                    }
                    tracing::warn!(
                        path = %path.display(),
                        offset,
                        error = %e,
                        "dropping torn record at the end of the job journal"
                    );
                    replayed.torn = true;
                    replayed.missing_newline = false;
                    break;
                }
            }
            offset = next;
        }
        Ok(replayed)
    }

    /// Journal location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the journal as one `Created` line per job followed by its logs.
    pub fn compact(&self) -> Result<(), StoreError> {
        let mut journal = self.journal.lock();
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut out = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            for record in journal.tables.jobs.values() {
                let line = serde_json::to_string(&JournalRecord::Created(record.clone()))?;
                writeln!(out, "{line}")?;
                for entry in journal.tables.logs.get(&record.process_id).into_iter().flatten() {
                    let line = serde_json::to_string(&JournalRecord::Logged(entry.clone()))?;
                    writeln!(out, "{line}")?;
                }
            }
            out.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        journal.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn get_or_create(&self, job: NewJob) -> Result<(JobRecord, bool), StoreError> {
        let mut journal = self.journal.lock();
        if let Some(existing) = journal.tables.jobs.get(&job.process_id) {
            return Ok((existing.clone(), false));
        }
        let record = JobRecord::create(job);
        journal.write(&JournalRecord::Created(record.clone()))?;
        journal
            .tables
            .jobs
            .insert(record.process_id.clone(), record.clone());
        Ok((record, true))
    }

    async fn update(
        &self,
        process_id: &str,
        update: JobUpdate,
    ) -> Result<Option<(JobRecord, bool)>, StoreError> {
        let mut journal = self.journal.lock();
        let Some(current) = journal.tables.jobs.get(process_id) else {
            return Ok(None);
        };
        let mut next = current.clone();
        if !next.apply(&update) {
            return Ok(Some((next, false)));
        }
        journal.write(&JournalRecord::Updated {
            process_id: process_id.to_string(),
            update,
        })?;
        journal.tables.jobs.insert(process_id.to_string(), next.clone());
        Ok(Some((next, true)))
    }

    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        let mut journal = self.journal.lock();
        if !journal.tables.jobs.contains_key(&entry.process_id) {
            return Err(StoreError::MissingJob(entry.process_id));
        }
        journal.write(&JournalRecord::Logged(entry.clone()))?;
        journal.tables.append_log(entry)
    }

    async fn get(&self, process_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.journal.lock().tables.jobs.get(process_id).cloned())
    }

    async fn logs(&self, process_id: &str) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self
            .journal
            .lock()
            .tables
            .logs
            .get(process_id)
            .cloned()
            .unwrap_or_default())
    }
}
