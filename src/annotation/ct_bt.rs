use std::collections::{HashMap, HashSet};

use super::{
    INTERGENIC_MASK, LOFE_PROTEIN_CODING_MASK, LOF_EXTENDED_MASK, LOF_MASK, MISSENSE_VARIANT_MASK,
    PROTEIN_CODING_MASK,
};
use crate::{
    config::{AnnotationIndexConfiguration, MISSENSE_VARIANT, PROTEIN_CODING},
    ConsequenceType, Result,
};

/// Consequence-derived part of an annotation index entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsequenceTypeIndex {
    /// Summary flags derived from consequence types
    pub summary: u8,
    /// Bit `i` set if tracked biotype `i` is present
    pub biotypes: u8,
    /// Bit `i` set if tracked consequence type `i` is present
    pub consequence_types: u16,
    /// One row per distinct genic term, in discovery order
    ///
    /// Bit `j` of a row is set if the term occurs on a transcript of the `j`-th
    /// present tracked biotype.
    pub matrix: Vec<u8>,
}

impl ConsequenceTypeIndex {
    #[must_use]
    pub fn intergenic(&self) -> bool {
        self.summary & INTERGENIC_MASK != 0
    }

    /// Number of distinct genic consequence terms
    #[must_use]
    pub fn num_cts(&self) -> usize {
        self.matrix.len()
    }

    /// Number of distinct tracked biotypes
    #[must_use]
    pub fn num_bts(&self) -> usize {
        self.biotypes.count_ones() as usize
    }
}

/// Lookup tables of the consequence type and biotype columns
#[derive(Debug, Clone)]
pub struct ConsequenceTypeIndexer {
    lof: HashSet<String>,
    lof_extended: HashSet<String>,
    intergenic: HashSet<String>,
    biotypes: HashMap<String, u8>,
    consequence_types: HashMap<String, u8>,
}

impl ConsequenceTypeIndexer {
    /// Validates the configuration and builds the lookup tables
    ///
    /// Biotypes listed in the mapping of a tracked biotype share its bit. A
    /// tracked biotype always keeps its own bit.
    pub fn new(config: &AnnotationIndexConfiguration) -> Result<Self> {
        config.validate()?;
        let positions = |values: &[String]| {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (v.clone(), i as u8))
                .collect::<HashMap<_, _>>()
        };
        let mut biotypes = positions(&config.biotypes);
        for (target, sources) in &config.biotype_mapping {
            let Some(pos) = biotypes.get(target).copied() else {
                continue;
            };
            for source in sources {
                biotypes.entry(source.clone()).or_insert(pos);
            }
        }
        Ok(Self {
            lof: config.lof.iter().cloned().collect(),
            lof_extended: config.lof_extended.iter().cloned().collect(),
            intergenic: config.intergenic.iter().cloned().collect(),
            biotypes,
            consequence_types: positions(&config.consequence_types),
        })
    }

    /// Bit position of a biotype, or `None` if it is neither tracked nor mapped
    #[must_use]
    pub fn biotype_position(&self, biotype: &str) -> Option<u8> {
        self.biotypes.get(biotype).copied()
    }

    #[must_use]
    pub fn is_intergenic_term(&self, term: &str) -> bool {
        self.intergenic.contains(term)
    }

    /// Encodes the consequence types of one variant
    ///
    /// A variant with no consequence types, or only intergenic ones, is intergenic
    /// and has an empty matrix.
    #[must_use]
    pub fn encode(&self, consequence_types: &[ConsequenceType]) -> ConsequenceTypeIndex {
        let mut index = ConsequenceTypeIndex::default();

        // biotype position of every transcript, resolved once
        let positions: Vec<Option<u8>> = consequence_types
            .iter()
            .map(|ct| ct.biotype.as_deref().and_then(|b| self.biotype_position(b)))
            .collect();

        let mut terms: Vec<&str> = Vec::new();
        let mut co_occurrence: Vec<u8> = Vec::new();

        for (ct, position) in consequence_types.iter().zip(&positions) {
            let protein_coding = ct.biotype.as_deref() == Some(PROTEIN_CODING);
            if protein_coding {
                index.summary |= PROTEIN_CODING_MASK;
            }
            if let Some(pos) = position {
                index.biotypes |= 1 << *pos;
            }
            for term in &ct.terms {
                if self.lof.contains(term) {
                    index.summary |= LOF_MASK;
                }
                if self.lof_extended.contains(term) {
                    index.summary |= LOF_EXTENDED_MASK;
                    if protein_coding {
                        index.summary |= LOFE_PROTEIN_CODING_MASK;
                    }
                }
                if term == MISSENSE_VARIANT {
                    index.summary |= MISSENSE_VARIANT_MASK;
                }
                if let Some(pos) = self.consequence_types.get(term) {
                    index.consequence_types |= 1 << *pos;
                }
                if self.intergenic.contains(term) {
                    continue;
                }
                let row = match terms.iter().position(|t| *t == term.as_str()) {
                    Some(row) => row,
                    None => {
                        terms.push(term);
                        co_occurrence.push(0);
                        terms.len() - 1
                    }
                };
                // raw biotype bits for now, compacted once all biotypes are known
                if let Some(pos) = position {
                    co_occurrence[row] |= 1 << *pos;
                }
            }
        }

        if terms.is_empty() {
            index.summary |= INTERGENIC_MASK;
        }
        index.matrix = co_occurrence
            .into_iter()
            .map(|raw| compact(raw, index.biotypes))
            .collect();
        index
    }
}

/// Re-indexes the bits of `raw` by their rank among the bits of `present`
fn compact(raw: u8, present: u8) -> u8 {
    let mut row = 0u8;
    let mut rank = 0;
    for bit in 0..8 {
        if present & (1 << bit) == 0 {
            continue;
        }
        if raw & (1 << bit) != 0 {
            row |= 1 << rank;
        }
        rank += 1;
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{ConfigError, Error};

    fn indexer() -> ConsequenceTypeIndexer {
        ConsequenceTypeIndexer::new(&AnnotationIndexConfiguration::default())
            .expect("default configuration is valid")
    }

    #[test]
    fn test_stop_lost_alone() {
        let index = indexer().encode(&[ConsequenceType::without_biotype("stop_lost")]);
        assert_eq!(index.summary, LOF_MASK | LOF_EXTENDED_MASK);
        assert_eq!(index.num_cts(), 1);
        assert!(!index.intergenic());
    }

    #[test]
    fn test_missense_alone() {
        let index = indexer().encode(&[ConsequenceType::without_biotype("missense_variant")]);
        assert_eq!(index.summary, LOF_EXTENDED_MASK | MISSENSE_VARIANT_MASK);
        assert_eq!(index.consequence_types, 1);
    }

    #[test]
    fn test_stop_lost_protein_coding() {
        let index = indexer().encode(&[ConsequenceType::new("stop_lost", "protein_coding")]);
        assert_eq!(
            index.summary,
            LOF_MASK | LOF_EXTENDED_MASK | LOFE_PROTEIN_CODING_MASK | PROTEIN_CODING_MASK
        );
        // protein_coding is the last default biotype
        assert_eq!(index.biotypes, 1 << 7);
        assert_eq!(index.matrix, vec![0b1]);
    }

    #[test]
    fn test_intergenic() {
        let indexer = indexer();
        assert_eq!(indexer.encode(&[]).summary, INTERGENIC_MASK);
        let index = indexer.encode(&[
            ConsequenceType::without_biotype("intergenic_variant"),
            ConsequenceType::without_biotype("regulatory_region_variant"),
        ]);
        assert_eq!(index.summary, INTERGENIC_MASK);
        assert_eq!(index.num_cts(), 0);
    }

    #[test]
    fn test_matrix_reflects_transcript_co_occurrence() -> super::Result<()> {
        let config = AnnotationIndexConfiguration {
            biotypes: vec!["pseudogene".to_string()],
            ..AnnotationIndexConfiguration::default()
        };
        let index = ConsequenceTypeIndexer::new(&config)?.encode(&[
            ConsequenceType::new("missense_variant", "protein_coding"),
            ConsequenceType::new("missense_variant", "protein_coding"),
            ConsequenceType {
                biotype: Some("pseudogene".to_string()),
                ..ConsequenceType::default()
            },
        ]);
        assert_eq!(index.num_cts(), 1);
        assert_eq!(index.num_bts(), 1);
        assert_eq!(index.matrix, vec![0]);
        Ok(())
    }

    #[test]
    fn test_matrix_rows_in_discovery_order() {
        let index = indexer().encode(&[
            ConsequenceType::new("intron_variant", "retained_intron")
                .with_term("splice_region_variant"),
            ConsequenceType::new("missense_variant", "protein_coding"),
            ConsequenceType::new("intron_variant", "nonsense_mediated_decay"),
            ConsequenceType::new("upstream_gene_variant", "unprocessed_pseudogene"),
            ConsequenceType::without_biotype("regulatory_region_variant"),
        ]);
        // nonsense_mediated_decay (0), retained_intron (3), protein_coding (7)
        assert_eq!(index.biotypes, 0b1000_1001);
        assert_eq!(index.num_bts(), 3);
        // intron, splice_region, missense, upstream; the regulatory term is not a row
        assert_eq!(index.matrix, vec![0b011, 0b010, 0b100, 0b000]);
        assert!(!index.intergenic());
        assert_eq!(index.summary & LOF_MASK, 0);
    }

    #[test]
    fn test_biotype_buckets() {
        let indexer = indexer();
        for biotype in ["lincRNA", "lncRNA", "antisense", "sense_intronic", "3prime_overlapping_ncRNA"] {
            assert_eq!(indexer.biotype_position(biotype), Some(1), "{biotype}");
        }
        for biotype in ["other_non_pseudo_gene", "processed_transcript", "misc_RNA", "IG_V_gene"] {
            assert_eq!(indexer.biotype_position(biotype), Some(6), "{biotype}");
        }
        assert_eq!(indexer.biotype_position("protein_coding"), Some(7));
        // neither tracked nor mapped
        assert_eq!(indexer.biotype_position("processed_pseudogene"), None);
        assert_eq!(indexer.biotype_position("TEC"), None);
    }

    #[test]
    fn test_tracked_biotype_keeps_its_bit() -> super::Result<()> {
        let mut config = AnnotationIndexConfiguration {
            biotypes: vec!["lincRNA".to_string(), "antisense".to_string()],
            ..AnnotationIndexConfiguration::default()
        };
        let indexer = ConsequenceTypeIndexer::new(&config)?;
        assert_eq!(indexer.biotype_position("antisense"), Some(1));
        assert_eq!(indexer.biotype_position("lncRNA"), Some(0));
        // the other_non_pseudo_gene group is not tracked
        assert_eq!(indexer.biotype_position("misc_RNA"), None);

        config.biotype_mapping.clear();
        assert_eq!(ConsequenceTypeIndexer::new(&config)?.biotype_position("lncRNA"), None);
        Ok(())
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = AnnotationIndexConfiguration::default();
        config.biotypes.push("pseudogene".to_string());
        assert!(matches!(
            ConsequenceTypeIndexer::new(&config),
            Err(Error::ConfigError(ConfigError::TooManyBiotypes(9)))
        ));
    }

    #[test]
    fn test_compact() {
        assert_eq!(compact(0b1000_0001, 0b1000_1001), 0b101);
        assert_eq!(compact(0, 0b1111), 0);
        assert_eq!(compact(0b1000, 0b1000), 0b1);
    }
}
