//! Batched reading of the complaints CSV.
//!
//! Two access patterns over the same file: a lazy sequence of fixed-size
//! batches covering the whole file in order, and a single page addressed by
//! (page, page_size) for the caller-driven batch mode. Reading is the only
//! thing this module does; rows stay untyped until the normalizer runs.

use std::fs::File;
use std::path::Path;

use crate::config::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::error::{IngestError, Result};
use crate::record::RawRow;

/// One bounded, ordered slice of the source file. `first_line` is the CSV
/// line number of the first row (the header is line 1, data starts at 2).
#[derive(Debug)]
pub struct Batch {
    pub rows: Vec<RawRow>,
    pub first_line: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn check_batch_size(size: usize) -> Result<()> {
    if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&size) {
        return Err(IngestError::InvalidBatchSize(size));
    }
    Ok(())
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|_| IngestError::SourceUnavailable {
        path: path.to_path_buf(),
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file))
}

/// Lazy batched reader over the complaints CSV. Restartable: opening a new
/// reader starts from the top of the file again.
pub struct BatchReader {
    rows: csv::DeserializeRecordsIntoIter<File, RawRow>,
    batch_size: usize,
    next_line: usize,
}

impl BatchReader {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        check_batch_size(batch_size)?;
        let reader = open_csv(path)?;
        Ok(Self {
            rows: reader.into_deserialize(),
            batch_size,
            next_line: 2,
        })
    }

    /// Next batch in file order, `None` once the file is exhausted. The
    /// final batch may be smaller than the nominal size.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        let first_line = self.next_line;
        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            match self.rows.next() {
                Some(Ok(row)) => {
                    rows.push(row);
                    self.next_line += 1;
                }
                Some(Err(e)) => {
                    return Err(IngestError::MalformedRecord {
                        line: self.next_line,
                        reason: e.to_string(),
                    });
                }
                None => break,
            }
        }
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Batch { rows, first_line }))
        }
    }
}

/// Read exactly one page: skip `page * page_size` rows, take `page_size`.
/// A page past the end of the file yields an empty batch. A row the CSV
/// layer cannot read surfaces with its line number whether it falls inside
/// the requested page or in the skipped region before it.
pub fn read_page(path: &Path, page: usize, page_size: usize) -> Result<Batch> {
    check_batch_size(page_size)?;
    let reader = open_csv(path)?;
    let skip = page * page_size;
    let first_line = 2 + skip;

    let mut iter = reader.into_deserialize::<RawRow>();
    for line in 2..first_line {
        match iter.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(IngestError::MalformedRecord {
                    line,
                    reason: e.to_string(),
                });
            }
            None => {
                return Ok(Batch {
                    rows: Vec::new(),
                    first_line,
                });
            }
        }
    }

    let mut rows = Vec::with_capacity(page_size);
    while rows.len() < page_size {
        match iter.next() {
            Some(Ok(row)) => rows.push(row),
            Some(Err(e)) => {
                return Err(IngestError::MalformedRecord {
                    line: first_line + rows.len(),
                    reason: e.to_string(),
                });
            }
            None => break,
        }
    }
    Ok(Batch { rows, first_line })
}
