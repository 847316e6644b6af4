//! Input records
//!
//! The indexers consume already-parsed variant records: coordinates, the genotype
//! calls of every contributing file and the structured annotation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Genomic coordinates and alleles of a variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub chromosome: String,
    pub start: u32,
    pub reference: String,
    pub alternate: String,
}

impl Variant {
    pub fn new(
        chromosome: impl Into<String>,
        start: u32,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.start, self.reference, self.alternate
        )
    }
}

/// Effect of a variant on one transcript (or regulatory feature)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceType {
    pub gene_id: Option<String>,
    pub biotype: Option<String>,
    /// Sequence ontology terms, e.g. `missense_variant`
    pub terms: Vec<String>,
}

impl ConsequenceType {
    /// A transcript with a single consequence term
    pub fn new(term: impl Into<String>, biotype: impl Into<String>) -> Self {
        Self {
            gene_id: None,
            biotype: Some(biotype.into()),
            terms: vec![term.into()],
        }
    }

    /// A consequence with no biotype, typical of regulatory or intergenic terms
    pub fn without_biotype(term: impl Into<String>) -> Self {
        Self {
            terms: vec![term.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_gene(mut self, gene_id: impl Into<String>) -> Self {
        self.gene_id = Some(gene_id.into());
        self
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.terms.push(term.into());
        self
    }
}

/// Alternate allele frequency of a variant in one reference population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationFrequency {
    pub study: String,
    pub population: String,
    pub alt_allele_freq: f64,
}

impl PopulationFrequency {
    pub fn new(study: impl Into<String>, population: impl Into<String>, alt_allele_freq: f64) -> Self {
        Self {
            study: study.into(),
            population: population.into(),
            alt_allele_freq,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantAnnotation {
    pub consequence_types: Vec<ConsequenceType>,
    pub population_frequencies: Vec<PopulationFrequency>,
    pub clinical_significance: Vec<String>,
}

/// Genotype calls of one file, grouped by genotype string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGenotypes {
    pub file_id: u32,
    pub genotypes: Vec<(String, Vec<u32>)>,
}

impl FileGenotypes {
    #[must_use]
    pub fn new(file_id: u32) -> Self {
        Self {
            file_id,
            genotypes: Vec::new(),
        }
    }

    /// Adds a genotype group
    #[must_use]
    pub fn with_genotype(mut self, genotype: impl Into<String>, samples: &[u32]) -> Self {
        self.genotypes.push((genotype.into(), samples.to_vec()));
        self
    }
}

/// One element of the input stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant: Variant,
    pub files: Vec<FileGenotypes>,
    pub annotation: Option<VariantAnnotation>,
}

impl VariantRecord {
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            files: Vec::new(),
            annotation: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: FileGenotypes) -> Self {
        self.files.push(file);
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: VariantAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }
}

/// Per-sample genotypes of a single variant, merged across files
///
/// A sample called with different genotypes by different files keeps every
/// distinct call and is reported as discrepant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleGenotypes {
    calls: BTreeMap<u32, BTreeSet<String>>,
}

impl SampleGenotypes {
    #[must_use]
    pub fn from_record(record: &VariantRecord) -> Self {
        let mut calls: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        for file in &record.files {
            for (genotype, samples) in &file.genotypes {
                for sample in samples {
                    calls.entry(*sample).or_default().insert(genotype.clone());
                }
            }
        }
        Self { calls }
    }

    /// All distinct calls of a sample
    #[must_use]
    pub fn get(&self, sample: u32) -> Option<&BTreeSet<String>> {
        self.calls.get(&sample)
    }

    #[must_use]
    pub fn is_discrepant(&self, sample: u32) -> bool {
        self.calls.get(&sample).is_some_and(|gts| gts.len() > 1)
    }

    /// Samples with more than one distinct call
    pub fn discrepancies(&self) -> impl Iterator<Item = (u32, &BTreeSet<String>)> {
        self.calls
            .iter()
            .filter(|(_, gts)| gts.len() > 1)
            .map(|(sample, gts)| (*sample, gts))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BTreeSet<String>)> {
        self.calls.iter().map(|(sample, gts)| (*sample, gts))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
