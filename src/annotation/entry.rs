use super::{ConsequenceTypeIndex, PopulationFrequencyIndex, INTERGENIC_MASK};
use crate::bit::BitBuffer;

/// Annotation summary of one variant
///
/// Built once per variant by the [`AnnotationIndexConverter`](super::AnnotationIndexConverter)
/// and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationIndexEntry {
    summary_index: u8,
    has_summary_index: bool,
    biotype_index: u8,
    consequence_type_index: u16,
    ct_bt_matrix: Vec<u8>,
    pop_freq_index: BitBuffer,
    has_pop_freq_index: bool,
    clinical_index: u8,
}

impl AnnotationIndexEntry {
    pub(crate) fn new(ct: ConsequenceTypeIndex, pop_freq: PopulationFrequencyIndex, extra: u8) -> Self {
        Self {
            summary_index: ct.summary | extra,
            has_summary_index: true,
            biotype_index: ct.biotypes,
            consequence_type_index: ct.consequence_types,
            ct_bt_matrix: ct.matrix,
            pop_freq_index: pop_freq.codes,
            has_pop_freq_index: true,
            clinical_index: 0,
        }
    }

    pub(crate) fn with_clinical_index(mut self, clinical_index: u8) -> Self {
        self.clinical_index = clinical_index;
        self
    }

    /// Entry of a variant without annotation
    ///
    /// Every flag is unset and the frequency codes are zero.
    #[must_use]
    pub fn empty(pop_freq_bits: usize) -> Self {
        Self {
            summary_index: 0,
            has_summary_index: false,
            biotype_index: 0,
            consequence_type_index: 0,
            ct_bt_matrix: Vec::new(),
            pop_freq_index: BitBuffer::new(pop_freq_bits),
            has_pop_freq_index: false,
            clinical_index: 0,
        }
    }

    #[must_use]
    pub fn summary_index(&self) -> u8 {
        self.summary_index
    }

    #[must_use]
    pub fn has_summary_index(&self) -> bool {
        self.has_summary_index
    }

    #[must_use]
    pub fn intergenic(&self) -> bool {
        self.summary_index & INTERGENIC_MASK != 0
    }

    /// Whether any summary flag in `mask` is set
    #[must_use]
    pub fn has_flag(&self, mask: u8) -> bool {
        self.summary_index & mask != 0
    }

    #[must_use]
    pub fn biotype_index(&self) -> u8 {
        self.biotype_index
    }

    #[must_use]
    pub fn consequence_type_index(&self) -> u16 {
        self.consequence_type_index
    }

    #[must_use]
    pub fn ct_bt_matrix(&self) -> &[u8] {
        &self.ct_bt_matrix
    }

    #[must_use]
    pub fn num_cts(&self) -> usize {
        self.ct_bt_matrix.len()
    }

    #[must_use]
    pub fn num_bts(&self) -> usize {
        self.biotype_index.count_ones() as usize
    }

    /// Genic entries carry biotype and consequence type columns
    #[must_use]
    pub fn is_genic(&self) -> bool {
        self.num_cts() > 0
    }

    #[must_use]
    pub fn pop_freq_index(&self) -> &BitBuffer {
        &self.pop_freq_index
    }

    #[must_use]
    pub fn has_pop_freq_index(&self) -> bool {
        self.has_pop_freq_index
    }

    /// Clinical significance categories, meaningful when the clinical flag is set
    #[must_use]
    pub fn clinical_index(&self) -> u8 {
        self.clinical_index
    }
}
