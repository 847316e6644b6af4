use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::genotype::parent_code;
use crate::{
    bit::{BitInputStream, BitOutputStream},
    schema::{
        encode_count, prefixed_column, read_str, read_variant, write_str, write_variant,
        GenomicChunk, IndexKey, IndexPut, DISCREPANCY_COLUMN, GENOTYPE_COUNT_PREFIX,
        MENDELIAN_ERROR_COLUMN, PARENTS_PREFIX,
    },
    ColumnError, Result, Variant,
};

/// A child call that breaks the inheritance rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MendelianErrorRecord {
    pub variant: Variant,
    /// Child genotype, exactly as called
    pub genotype: String,
    /// Occurrence of `genotype` in the chunk the call belongs to
    pub occurrence: u32,
    pub code: u8,
}

impl MendelianErrorRecord {
    fn write(&self, buffer: &mut Vec<u8>, batch_start: u32) -> Result<()> {
        write_variant(buffer, &self.variant, batch_start)?;
        write_str(buffer, &self.genotype)?;
        buffer.write_u32::<BigEndian>(self.occurrence)?;
        buffer.write_u8(self.code)?;
        Ok(())
    }
}

/// Decodes a `_ME` column
pub fn read_mendelian_errors(
    bytes: &[u8],
    chromosome: &str,
    batch_start: u32,
) -> Result<Vec<MendelianErrorRecord>> {
    let truncated = || ColumnError::Truncated(MENDELIAN_ERROR_COLUMN.to_string());
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let variant = read_variant(&mut cursor, MENDELIAN_ERROR_COLUMN, chromosome, batch_start)?;
        let genotype = read_str(&mut cursor, MENDELIAN_ERROR_COLUMN)?;
        let occurrence = cursor.read_u32::<BigEndian>().map_err(|_| truncated())?;
        let code = cursor.read_u8().map_err(|_| truncated())?;
        records.push(MendelianErrorRecord {
            variant,
            genotype,
            occurrence,
            code,
        });
    }
    Ok(records)
}

/// Accumulates the family index of one child over one chunk
///
/// Parent codes are kept per child genotype, one byte per occurrence: the
/// father's code in the low nibble and the mother's in the high nibble.
#[derive(Debug, Clone)]
pub struct FamilyIndexBuilder {
    child: u32,
    parents: BTreeMap<String, BitOutputStream>,
    occurrences: BTreeMap<String, u32>,
    mendelian_errors: Vec<MendelianErrorRecord>,
    discrepancies: u32,
}

impl FamilyIndexBuilder {
    #[must_use]
    pub fn new(child: u32) -> Self {
        Self {
            child,
            parents: BTreeMap::new(),
            occurrences: BTreeMap::new(),
            mendelian_errors: Vec::new(),
            discrepancies: 0,
        }
    }

    #[must_use]
    pub fn child(&self) -> u32 {
        self.child
    }

    /// Nothing was recorded since the last reset
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty() && self.mendelian_errors.is_empty() && self.discrepancies == 0
    }

    fn next_occurrence(&mut self, gt: &str) -> u32 {
        let count = self.occurrences.entry(gt.to_string()).or_insert(0);
        let occurrence = *count;
        *count += 1;
        occurrence
    }

    /// Records the parent codes of a child call and returns its occurrence index
    pub fn add_parents(&mut self, gt: &str, father: u8, mother: u8) -> Result<u32> {
        let occurrence = self.next_occurrence(gt);
        let stream = self.parents.entry(gt.to_string()).or_default();
        stream.write_byte(father, parent_code::BITS)?;
        stream.write_byte(mother, parent_code::BITS)?;
        Ok(occurrence)
    }

    /// Counts a child call that is not stored in the index and returns its occurrence index
    pub fn add_unindexed(&mut self, gt: &str) -> u32 {
        self.next_occurrence(gt)
    }

    pub fn add_mendelian_error(&mut self, variant: &Variant, gt: &str, occurrence: u32, code: u8) {
        self.mendelian_errors.push(MendelianErrorRecord {
            variant: variant.clone(),
            genotype: gt.to_string(),
            occurrence,
            code,
        });
    }

    pub fn add_discrepancy(&mut self) {
        self.discrepancies += 1;
    }

    /// Finalizes the chunk and resets the builder, `None` if nothing was recorded
    pub fn build(&mut self, chunk: &GenomicChunk) -> Option<FamilyIndexEntry> {
        if self.is_empty() {
            return None;
        }
        let parents: BTreeMap<String, Vec<u8>> = std::mem::take(&mut self.parents)
            .into_iter()
            .map(|(gt, stream)| (gt, stream.to_byte_array()))
            .collect();
        let genotype_counts = std::mem::take(&mut self.occurrences)
            .into_iter()
            .filter(|(gt, _)| parents.contains_key(gt))
            .collect();
        let entry = FamilyIndexEntry {
            child: self.child,
            chunk: chunk.clone(),
            parents,
            genotype_counts,
            mendelian_errors: std::mem::take(&mut self.mendelian_errors),
            discrepancies: self.discrepancies,
        };
        self.reset();
        Some(entry)
    }

    pub fn reset(&mut self) {
        self.parents.clear();
        self.occurrences.clear();
        self.mendelian_errors.clear();
        self.discrepancies = 0;
    }
}

/// Finalized family index of one child over one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyIndexEntry {
    pub child: u32,
    pub chunk: GenomicChunk,
    /// Packed parent codes per indexed child genotype
    pub parents: BTreeMap<String, Vec<u8>>,
    /// Occurrences of every indexed child genotype
    pub genotype_counts: BTreeMap<String, u32>,
    pub mendelian_errors: Vec<MendelianErrorRecord>,
    /// Variants where a trio member had conflicting calls
    pub discrepancies: u32,
}

impl FamilyIndexEntry {
    #[must_use]
    pub fn key(&self) -> IndexKey {
        IndexKey::new(self.child, &self.chunk)
    }

    /// (father, mother) codes of every occurrence of `gt`
    pub fn parent_codes(&self, gt: &str) -> Result<Vec<(u8, u8)>> {
        let Some(bytes) = self.parents.get(gt) else {
            return Ok(Vec::new());
        };
        let occurrences = self.genotype_counts.get(gt).copied().unwrap_or(0) as usize;
        let mut stream = BitInputStream::new(bytes);
        let mut codes = Vec::with_capacity(occurrences);
        for _ in 0..occurrences {
            let father = stream.read_byte(parent_code::BITS)?;
            let mother = stream.read_byte(parent_code::BITS)?;
            codes.push((father, mother));
        }
        Ok(codes)
    }

    /// Converts the entry into its index row
    pub fn to_put(&self) -> Result<IndexPut> {
        let mut put = IndexPut::new(self.key());
        for (gt, codes) in &self.parents {
            put.add_column(prefixed_column(PARENTS_PREFIX, gt), codes.clone());
        }
        for (gt, count) in &self.genotype_counts {
            put.add_column(prefixed_column(GENOTYPE_COUNT_PREFIX, gt), encode_count(*count));
        }
        if !self.mendelian_errors.is_empty() {
            let mut column = Vec::new();
            for record in &self.mendelian_errors {
                record.write(&mut column, self.chunk.batch_start)?;
            }
            put.add_column(MENDELIAN_ERROR_COLUMN, column);
        }
        if self.discrepancies > 0 {
            put.add_column(DISCREPANCY_COLUMN, encode_count(self.discrepancies));
        }
        Ok(put)
    }
}
