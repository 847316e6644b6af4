//! # varindex
//!
//! Bit-packed secondary indexes over a stream of genotyped, annotated variants.
//!
//! * [`SampleIndexer`] builds, per sample and genomic chunk, the list of variants
//!   called with every alternate genotype together with their annotation index.
//! * [`FamilyIndexer`] builds, per child of a trio, the genotype codes of both
//!   parents and the Mendelian errors of the chunk.
//!
//! Both consume ordered [`VariantRecord`]s and produce keyed rows of named byte
//! columns, see [`schema`]. Configuration is supplied once through an
//! [`IndexConfiguration`].

pub mod annotation;
pub mod bit;
pub mod config;
mod error;
pub mod family;
pub mod parallel;
pub mod sample;
pub mod schema;
mod variant;

pub use annotation::{AnnotationIndexConverter, AnnotationIndexEntry, AnnotationIndexPutBuilder};
pub use bit::{BitBuffer, BitInputStream, BitOutputStream};
pub use config::{AnnotationIndexConfiguration, IndexConfiguration, Population, PopulationFrequencyRanges};
pub use error::{BitError, ColumnError, ConfigError, Error, GenotypeError, OrderError, Result};
pub use family::{FamilyIndexEntry, FamilyIndexer, Trio, TrioDefinition};
pub use parallel::{process_partitions, IndexPipeline, PartitionProcessor};
pub use sample::SampleIndexer;
pub use schema::{IndexKey, IndexPut, IndexSink};
pub use variant::{
    ConsequenceType, FileGenotypes, PopulationFrequency, SampleGenotypes, Variant,
    VariantAnnotation, VariantRecord,
};
