//! Storage layout of the sample index
//!
//! Every index entry belongs to a genomic chunk: the `batch_size`-wide window of
//! positions on one chromosome that contains the variant. Entries are keyed by
//! (sample, chromosome, batch start) and hold a small set of named byte columns.
//!
//! ## Row key
//!
//! ```text
//! ┌──────────────┬────────────┬─────┬──────────────────────┐
//! │ sample (u32) │ chromosome │ '_' │ batch start (ASCII)  │
//! └──────────────┴────────────┴─────┴──────────────────────┘
//! ```
//!
//! ## Columns
//!
//! | Qualifier      | Content                                              |
//! |----------------|------------------------------------------------------|
//! | `{gt}`         | variants called with genotype `gt`                   |
//! | `_C_{gt}`      | number of variants called with `gt` (i32)            |
//! | `_A_{gt}`      | annotation summary byte per variant                  |
//! | `_AC_{gt}`     | per summary bit, number of variants with it (8 i32)  |
//! | `_BT_{gt}`     | biotype mask per genic variant                       |
//! | `_CT_{gt}`     | consequence type mask per genic variant (u16)        |
//! | `_CB_{gt}`     | consequence type / biotype matrix rows               |
//! | `_PF_{gt}`     | population frequency codes, 2 bits per population    |
//! | `_CL_{gt}`     | clinical significance mask per clinical variant      |
//! | `_P_{gt}`      | parent genotype codes per variant (father, mother)   |
//! | `_ME`          | Mendelian errors                                     |
//! | `_DC`          | number of discrepant variants (i32)                  |
//!
//! Integers are big-endian. Alleles and genotypes in `{gt}` and `_ME` are
//! prefixed with their byte length as a u32.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use auto_impl::auto_impl;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{ColumnError, OrderError, Result, Variant};

pub const GENOTYPE_COUNT_PREFIX: &str = "_C_";
pub const ANNOTATION_SUMMARY_PREFIX: &str = "_A_";
pub const ANNOTATION_COUNT_PREFIX: &str = "_AC_";
pub const BIOTYPE_PREFIX: &str = "_BT_";
pub const CONSEQUENCE_TYPE_PREFIX: &str = "_CT_";
pub const CT_BT_PREFIX: &str = "_CB_";
pub const POP_FREQ_PREFIX: &str = "_PF_";
pub const CLINICAL_PREFIX: &str = "_CL_";
pub const PARENTS_PREFIX: &str = "_P_";
pub const MENDELIAN_ERROR_COLUMN: &str = "_ME";
pub const DISCREPANCY_COLUMN: &str = "_DC";

const ROW_KEY_SEPARATOR: u8 = b'_';

/// First position of the chunk containing `position`
#[inline]
#[must_use]
pub fn batch_start(position: u32, batch_size: u32) -> u32 {
    (position / batch_size) * batch_size
}

#[must_use]
pub fn genotype_column(gt: &str) -> String {
    gt.to_string()
}

#[must_use]
pub fn prefixed_column(prefix: &str, gt: &str) -> String {
    let mut column = String::with_capacity(prefix.len() + gt.len());
    column.push_str(prefix);
    column.push_str(gt);
    column
}

/// Builds the row key of a (sample, chromosome, batch start) entry
#[must_use]
pub fn row_key(sample_id: u32, chromosome: &str, batch_start: u32) -> Vec<u8> {
    let mut printer = itoa::Buffer::new();
    let start = printer.format(batch_start);
    let mut key = Vec::with_capacity(4 + chromosome.len() + 1 + start.len());
    key.extend_from_slice(&sample_id.to_be_bytes());
    key.extend_from_slice(chromosome.as_bytes());
    key.push(ROW_KEY_SEPARATOR);
    key.extend_from_slice(start.as_bytes());
    key
}

/// Inverse of [`row_key`]
pub fn parse_row_key(key: &[u8]) -> Result<IndexKey> {
    let malformed = |position| ColumnError::Malformed {
        column: "row key".to_string(),
        position,
    };
    if key.len() < 4 {
        return Err(ColumnError::Truncated("row key".to_string()).into());
    }
    let mut cursor = Cursor::new(key);
    let sample_id = cursor.read_u32::<BigEndian>()?;
    let rest = &key[4..];
    let sep = rest
        .iter()
        .rposition(|&b| b == ROW_KEY_SEPARATOR)
        .ok_or_else(|| malformed(4))?;
    let chromosome = std::str::from_utf8(&rest[..sep])?.to_string();
    let batch_start = std::str::from_utf8(&rest[sep + 1..])?
        .parse()
        .map_err(|_| malformed(4 + sep + 1))?;
    Ok(IndexKey {
        id: sample_id,
        chromosome,
        batch_start,
    })
}

/// A (chromosome, batch start) window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicChunk {
    pub chromosome: String,
    pub batch_start: u32,
}

/// Follows the position of an ordered variant stream and reports chunk changes
///
/// Positions must be non-decreasing within a chromosome and a chromosome may not
/// be resumed once the stream has moved on to another one.
#[derive(Debug, Clone)]
pub struct ChunkTracker {
    batch_size: u32,
    current: Option<GenomicChunk>,
    last_position: u32,
    finished: HashSet<String>,
}

impl ChunkTracker {
    #[must_use]
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_size,
            current: None,
            last_position: 0,
            finished: HashSet::new(),
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    #[must_use]
    pub fn current(&self) -> Option<&GenomicChunk> {
        self.current.as_ref()
    }

    /// Moves to the chunk holding `position` and returns the chunk it closed, if any
    ///
    /// # Errors
    ///
    /// * [`OrderError::Unsorted`] if `position` is before the previous position
    /// * [`OrderError::ChromosomeRevisited`] if `chromosome` was already closed
    pub fn advance(&mut self, chromosome: &str, position: u32) -> Result<Option<GenomicChunk>> {
        let start = batch_start(position, self.batch_size);
        let Some(current) = self.current.as_mut() else {
            if self.finished.contains(chromosome) {
                return Err(OrderError::ChromosomeRevisited(chromosome.to_string()).into());
            }
            self.open(chromosome, start, position);
            return Ok(None);
        };

        if current.chromosome == chromosome {
            if position < self.last_position {
                return Err(OrderError::Unsorted {
                    chromosome: chromosome.to_string(),
                    previous: self.last_position,
                    position,
                }
                .into());
            }
            self.last_position = position;
            if current.batch_start == start {
                return Ok(None);
            }
            let closed = std::mem::replace(&mut current.batch_start, start);
            return Ok(Some(GenomicChunk {
                chromosome: chromosome.to_string(),
                batch_start: closed,
            }));
        }

        if self.finished.contains(chromosome) {
            return Err(OrderError::ChromosomeRevisited(chromosome.to_string()).into());
        }
        let closed = self.close();
        self.open(chromosome, start, position);
        Ok(closed)
    }

    /// Closes the open chunk, if any
    pub fn close(&mut self) -> Option<GenomicChunk> {
        let closed = self.current.take()?;
        self.finished.insert(closed.chromosome.clone());
        Some(closed)
    }

    fn open(&mut self, chromosome: &str, batch_start: u32, position: u32) {
        self.current = Some(GenomicChunk {
            chromosome: chromosome.to_string(),
            batch_start,
        });
        self.last_position = position;
    }
}

/// Identifies an index entry: sample (or child) id and genomic chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub id: u32,
    pub chromosome: String,
    pub batch_start: u32,
}

impl IndexKey {
    #[must_use]
    pub fn new(id: u32, chunk: &GenomicChunk) -> Self {
        Self {
            id,
            chromosome: chunk.chromosome.clone(),
            batch_start: chunk.batch_start,
        }
    }

    #[must_use]
    pub fn row_key(&self) -> Vec<u8> {
        row_key(self.id, &self.chromosome, self.batch_start)
    }
}

/// A write batch: named byte columns of one index row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPut {
    key: IndexKey,
    columns: Vec<(String, Vec<u8>)>,
}

impl IndexPut {
    #[must_use]
    pub fn new(key: IndexKey) -> Self {
        Self {
            key,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    #[must_use]
    pub fn row_key(&self) -> Vec<u8> {
        self.key.row_key()
    }

    /// Appends a column, replacing any previous value with the same qualifier
    pub fn add_column(&mut self, qualifier: impl Into<String>, value: Vec<u8>) {
        let qualifier = qualifier.into();
        if let Some(slot) = self.columns.iter_mut().find(|(q, _)| *q == qualifier) {
            slot.1 = value;
        } else {
            self.columns.push((qualifier, value));
        }
    }

    #[must_use]
    pub fn get(&self, qualifier: &str) -> Option<&[u8]> {
        self.columns
            .iter()
            .find(|(q, _)| q == qualifier)
            .map(|(_, v)| v.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.columns.iter().map(|(q, v)| (q.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Destination of finalized index rows
///
/// Implemented by storage adaptors and fed by
/// [`IndexPipeline::index_into`](crate::IndexPipeline::index_into). Errors from the storage layer are reported
/// through [`Error::AnyhowError`](crate::Error::AnyhowError).
#[auto_impl(&mut, Box)]
pub trait IndexSink {
    fn write(&mut self, put: IndexPut) -> Result<()>;

    /// Called once the stream is drained
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl IndexSink for Vec<IndexPut> {
    fn write(&mut self, put: IndexPut) -> Result<()> {
        self.push(put);
        Ok(())
    }
}

/// Big-endian i32 value of a count column
#[must_use]
pub fn encode_count(count: u32) -> Vec<u8> {
    (count as i32).to_be_bytes().to_vec()
}

pub fn decode_count(bytes: &[u8]) -> Result<u32> {
    let value = Cursor::new(bytes).read_i32::<BigEndian>()?;
    Ok(value as u32)
}

/// Appends a variant: offset from the batch start, then length-prefixed alleles
pub fn write_variant(buffer: &mut Vec<u8>, variant: &Variant, batch_start: u32) -> Result<()> {
    buffer.write_u32::<BigEndian>(variant.start - batch_start)?;
    write_str(buffer, &variant.reference)?;
    write_str(buffer, &variant.alternate)?;
    Ok(())
}

/// Appends a string with a u32 length prefix
pub(crate) fn write_str(buffer: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u32::try_from(value.len()).map_err(|_| ColumnError::ValueTooLong(value.len()))?;
    buffer.write_u32::<BigEndian>(len)?;
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

pub(crate) fn read_str(cursor: &mut Cursor<&[u8]>, column: &str) -> Result<String> {
    let len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| ColumnError::Truncated(column.to_string()))? as usize;
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(ColumnError::Truncated(column.to_string()).into());
    }
    let mut bytes = vec![0; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| ColumnError::Truncated(column.to_string()))?;
    Ok(std::str::from_utf8(&bytes)?.to_string())
}

pub(crate) fn read_variant(
    cursor: &mut Cursor<&[u8]>,
    column: &str,
    chromosome: &str,
    batch_start: u32,
) -> Result<Variant> {
    let offset = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| ColumnError::Truncated(column.to_string()))?;
    let reference = read_str(cursor, column)?;
    let alternate = read_str(cursor, column)?;
    Ok(Variant::new(chromosome, batch_start + offset, reference, alternate))
}

/// Decodes a genotype column written with [`write_variant`]
pub fn read_variants(bytes: &[u8], chromosome: &str, batch_start: u32) -> Result<Vec<Variant>> {
    let mut cursor = Cursor::new(bytes);
    let mut variants = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        variants.push(read_variant(&mut cursor, "genotype", chromosome, batch_start)?);
    }
    Ok(variants)
}
