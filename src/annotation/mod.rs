//! # Annotation index
//!
//! Each annotated variant is reduced to an [`AnnotationIndexEntry`]:
//!
//! * a summary byte of boolean flags,
//! * a biotype mask and a consequence type mask,
//! * a consequence type / biotype co-occurrence matrix,
//! * one 2-bit frequency range code per tracked population,
//! * a clinical significance category mask.
//!
//! The [`AnnotationIndexPutBuilder`] packs the entries of one (sample, genotype)
//! group into column arrays.
//!
//! ## Summary byte
//!
//! | Bit | Flag                   |
//! |-----|------------------------|
//! | 0   | [`PROTEIN_CODING_MASK`]    |
//! | 1   | [`LOF_MASK`]               |
//! | 2   | [`LOF_EXTENDED_MASK`]      |
//! | 3   | [`POP_FREQ_ANY_RARE_MASK`] |
//! | 4   | [`LOFE_PROTEIN_CODING_MASK`] |
//! | 5   | [`INTERGENIC_MASK`]        |
//! | 6   | [`MISSENSE_VARIANT_MASK`]  |
//! | 7   | [`CLINICAL_MASK`]          |

mod converter;
mod ct_bt;
mod entry;
mod pop_freq;
mod put_builder;

pub use converter::AnnotationIndexConverter;
pub use ct_bt::{ConsequenceTypeIndex, ConsequenceTypeIndexer};
pub use entry::AnnotationIndexEntry;
pub use pop_freq::{PopulationFrequencyIndex, PopulationFrequencyIndexer, POP_FREQ_BITS};
pub use put_builder::AnnotationIndexPutBuilder;

pub const PROTEIN_CODING_MASK: u8 = 1 << 0;
pub const LOF_MASK: u8 = 1 << 1;
pub const LOF_EXTENDED_MASK: u8 = 1 << 2;
pub const POP_FREQ_ANY_RARE_MASK: u8 = 1 << 3;
pub const LOFE_PROTEIN_CODING_MASK: u8 = 1 << 4;
pub const INTERGENIC_MASK: u8 = 1 << 5;
pub const MISSENSE_VARIANT_MASK: u8 = 1 << 6;
pub const CLINICAL_MASK: u8 = 1 << 7;

/// Number of flags in the summary byte
pub const SUMMARY_BITS: usize = 8;
