//! Family (trio) index
//!
//! For every child of a configured trio the index records, per genomic chunk:
//!
//! * the genotype codes of both parents for every indexed child call (`_P_{gt}`)
//! * the number of indexed child calls per genotype (`_C_{gt}`)
//! * the Mendelian errors of the chunk (`_ME`)
//! * the number of variants where a trio member had conflicting calls (`_DC`)
//!
//! Calls are indexed when they carry an alternate allele. Parent codes of one
//! genotype are laid out in the same order as the child's genotype column of the
//! sample index, so the `n`-th byte of `_P_{gt}` describes the `n`-th variant
//! called `gt`.

mod builder;
mod genotype;
mod indexer;
mod mendelian;
mod trio;

pub use builder::{read_mendelian_errors, FamilyIndexBuilder, FamilyIndexEntry, MendelianErrorRecord};
pub use genotype::{is_indexed_genotype, parent_code, Genotype, Zygosity};
pub use indexer::FamilyIndexer;
pub use mendelian::{mendelian_error, CopyState, COMPATIBLE};
pub use trio::{SampleRegistry, Trio, TrioDefinition};
