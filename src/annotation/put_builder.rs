use byteorder::{BigEndian, WriteBytesExt};

use super::{AnnotationIndexEntry, CLINICAL_MASK, POP_FREQ_BITS, SUMMARY_BITS};
use crate::{
    bit::{BitBuffer, BitOutputStream},
    schema::{
        prefixed_column, IndexPut, ANNOTATION_COUNT_PREFIX, ANNOTATION_SUMMARY_PREFIX,
        BIOTYPE_PREFIX, CLINICAL_PREFIX, CONSEQUENCE_TYPE_PREFIX, CT_BT_PREFIX, POP_FREQ_PREFIX,
    },
    Result,
};

/// Accumulates the annotation entries of one (sample, genotype) group into columns
///
/// * `A`: the summary byte of every entry
/// * `BT`: the biotype mask of every genic entry
/// * `CT`: the consequence type mask of every genic entry, as big-endian `u16`
/// * `CB`: the matrix rows of every genic entry, `num_cts` bytes each
/// * `PF`: the frequency codes of every entry, 2 bits per population, packed
///   back to back regardless of byte boundaries
/// * `CL`: the clinical significance mask of every entry flagged as clinical
/// * `AC`: for each summary bit, the number of entries with the bit set
///
/// [`build_and_reset`](Self::build_and_reset) writes the columns and starts over.
#[derive(Debug, Clone)]
pub struct AnnotationIndexPutBuilder {
    population_count: usize,
    summary: Vec<u8>,
    biotypes: Vec<u8>,
    consequence_types: Vec<u8>,
    ct_bt: Vec<u8>,
    pop_freq: BitOutputStream,
    clinical: Vec<u8>,
    counts: [u32; SUMMARY_BITS],
}

impl AnnotationIndexPutBuilder {
    #[must_use]
    pub fn new(population_count: usize) -> Self {
        Self {
            population_count,
            summary: Vec::new(),
            biotypes: Vec::new(),
            consequence_types: Vec::new(),
            ct_bt: Vec::new(),
            pop_freq: BitOutputStream::new(),
            clinical: Vec::new(),
            counts: [0; SUMMARY_BITS],
        }
    }

    /// Number of entries added since the last build
    #[must_use]
    pub fn len(&self) -> usize {
        self.summary.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Number of genic entries added since the last build
    #[must_use]
    pub fn genic_count(&self) -> usize {
        self.biotypes.len()
    }

    pub fn add(&mut self, entry: &AnnotationIndexEntry) -> Result<()> {
        let summary = entry.summary_index();
        self.summary.push(summary);
        for (bit, count) in self.counts.iter_mut().enumerate() {
            if summary & (1 << bit) != 0 {
                *count += 1;
            }
        }

        if entry.is_genic() {
            self.biotypes.push(entry.biotype_index());
            self.consequence_types
                .write_u16::<BigEndian>(entry.consequence_type_index())?;
            self.ct_bt.extend_from_slice(entry.ct_bt_matrix());
        }

        if entry.has_flag(CLINICAL_MASK) {
            self.clinical.push(entry.clinical_index());
        }

        let bits = self.population_count * POP_FREQ_BITS;
        if entry.has_pop_freq_index() {
            self.pop_freq.write_buffer(&entry.pop_freq_index().get_bit_buffer(0, bits)?)?;
        } else {
            self.pop_freq.write_buffer(&BitBuffer::new(bits))?;
        }
        Ok(())
    }

    /// Appends the columns of the accumulated entries to `put` and clears the builder
    ///
    /// Column qualifiers are suffixed with `gt`. Nothing is written if no entry was added.
    pub fn build_and_reset(&mut self, put: &mut IndexPut, gt: &str) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut counts = Vec::with_capacity(SUMMARY_BITS * 4);
        for count in &self.counts {
            counts.write_i32::<BigEndian>(*count as i32)?;
        }

        put.add_column(prefixed_column(ANNOTATION_SUMMARY_PREFIX, gt), std::mem::take(&mut self.summary));
        put.add_column(prefixed_column(BIOTYPE_PREFIX, gt), std::mem::take(&mut self.biotypes));
        put.add_column(
            prefixed_column(CONSEQUENCE_TYPE_PREFIX, gt),
            std::mem::take(&mut self.consequence_types),
        );
        put.add_column(prefixed_column(CT_BT_PREFIX, gt), std::mem::take(&mut self.ct_bt));
        put.add_column(prefixed_column(POP_FREQ_PREFIX, gt), self.pop_freq.to_byte_array());
        put.add_column(prefixed_column(CLINICAL_PREFIX, gt), std::mem::take(&mut self.clinical));
        put.add_column(prefixed_column(ANNOTATION_COUNT_PREFIX, gt), counts);

        self.reset();
        Ok(())
    }

    /// Drops every accumulated entry
    pub fn reset(&mut self) {
        self.summary.clear();
        self.biotypes.clear();
        self.consequence_types.clear();
        self.ct_bt.clear();
        self.pop_freq.reset();
        self.clinical.clear();
        self.counts = [0; SUMMARY_BITS];
    }
}
