use super::{
    AnnotationIndexEntry, ConsequenceTypeIndexer, PopulationFrequencyIndexer, CLINICAL_MASK,
    POP_FREQ_ANY_RARE_MASK,
};
use crate::{config::AnnotationIndexConfiguration, Result, VariantAnnotation};

/// Converts variant annotations into [`AnnotationIndexEntry`] values
///
/// Holds the lookup tables derived from the configuration, built once.
#[derive(Debug, Clone)]
pub struct AnnotationIndexConverter {
    pop_freq: PopulationFrequencyIndexer,
    consequence_types: ConsequenceTypeIndexer,
    clinical_significance: Vec<String>,
}

impl AnnotationIndexConverter {
    /// Validates the configuration and builds the lookup tables
    pub fn new(config: &AnnotationIndexConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pop_freq: PopulationFrequencyIndexer::new(config)?,
            consequence_types: ConsequenceTypeIndexer::new(config)?,
            clinical_significance: config.clinical_significance.clone(),
        })
    }

    #[must_use]
    pub fn population_count(&self) -> usize {
        self.pop_freq.population_count()
    }

    #[must_use]
    pub fn pop_freq_indexer(&self) -> &PopulationFrequencyIndexer {
        &self.pop_freq
    }

    #[must_use]
    pub fn consequence_type_indexer(&self) -> &ConsequenceTypeIndexer {
        &self.consequence_types
    }

    /// Bit `i` set if the `i`-th configured category is among `significances`
    ///
    /// Matching is exact. Unknown categories set no bit.
    #[must_use]
    pub fn clinical_index(&self, significances: &[String]) -> u8 {
        significances
            .iter()
            .filter_map(|s| self.clinical_significance.iter().position(|c| c == s))
            .fold(0, |mask, pos| mask | (1u8 << pos))
    }

    /// Builds the entry of one variant
    ///
    /// A missing annotation yields an [`empty`](AnnotationIndexEntry::empty) entry.
    /// An annotation without consequence types is intergenic.
    pub fn convert(&self, annotation: Option<&VariantAnnotation>) -> Result<AnnotationIndexEntry> {
        let Some(annotation) = annotation else {
            return Ok(AnnotationIndexEntry::empty(self.pop_freq.bit_length()));
        };
        let pop_freq = self.pop_freq.encode(&annotation.population_frequencies)?;
        let ct = self.consequence_types.encode(&annotation.consequence_types);

        let mut extra = 0;
        if pop_freq.any_rare {
            extra |= POP_FREQ_ANY_RARE_MASK;
        }
        if !annotation.clinical_significance.is_empty() {
            extra |= CLINICAL_MASK;
        }
        let clinical = self.clinical_index(&annotation.clinical_significance);
        Ok(AnnotationIndexEntry::new(ct, pop_freq, extra).with_clinical_index(clinical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{
        INTERGENIC_MASK, LOFE_PROTEIN_CODING_MASK, LOF_EXTENDED_MASK, LOF_MASK,
        MISSENSE_VARIANT_MASK, PROTEIN_CODING_MASK,
    };
    use crate::{ConsequenceType, PopulationFrequency};

    fn annotation(cts: Vec<ConsequenceType>) -> VariantAnnotation {
        VariantAnnotation {
            consequence_types: cts,
            ..VariantAnnotation::default()
        }
    }

    fn converter() -> super::Result<AnnotationIndexConverter> {
        AnnotationIndexConverter::new(&AnnotationIndexConfiguration::default())
    }

    #[test]
    fn test_summary_stop_lost() -> super::Result<()> {
        let entry = converter()?.convert(Some(&annotation(vec![ConsequenceType::without_biotype(
            "stop_lost",
        )])))?;
        assert_eq!(
            entry.summary_index(),
            LOF_MASK | LOF_EXTENDED_MASK | POP_FREQ_ANY_RARE_MASK
        );
        assert!(!entry.has_flag(PROTEIN_CODING_MASK));
        Ok(())
    }

    #[test]
    fn test_summary_missense() -> super::Result<()> {
        let entry = converter()?.convert(Some(&annotation(vec![ConsequenceType::without_biotype(
            "missense_variant",
        )])))?;
        assert_eq!(
            entry.summary_index(),
            LOF_EXTENDED_MASK | MISSENSE_VARIANT_MASK | POP_FREQ_ANY_RARE_MASK
        );
        assert!(!entry.has_flag(LOF_MASK));
        Ok(())
    }

    #[test]
    fn test_summary_stop_lost_protein_coding() -> super::Result<()> {
        let entry = converter()?.convert(Some(&annotation(vec![ConsequenceType::new(
            "stop_lost",
            "protein_coding",
        )])))?;
        assert_eq!(
            entry.summary_index(),
            LOF_MASK
                | LOF_EXTENDED_MASK
                | LOFE_PROTEIN_CODING_MASK
                | PROTEIN_CODING_MASK
                | POP_FREQ_ANY_RARE_MASK
        );
        Ok(())
    }

    #[test]
    fn test_summary_intergenic() -> super::Result<()> {
        let converter = converter()?;
        let empty = converter.convert(Some(&annotation(vec![])))?;
        assert_eq!(empty.summary_index(), INTERGENIC_MASK | POP_FREQ_ANY_RARE_MASK);
        assert!(!empty.is_genic());

        let intergenic = converter.convert(Some(&annotation(vec![
            ConsequenceType::without_biotype("intergenic_variant"),
        ])))?;
        assert_eq!(
            intergenic.summary_index(),
            INTERGENIC_MASK | POP_FREQ_ANY_RARE_MASK
        );
        Ok(())
    }

    #[test]
    fn test_common_frequency_clears_rare_flag() -> super::Result<()> {
        let converter = converter()?;
        let mut common = annotation(vec![ConsequenceType::new("missense_variant", "protein_coding")]);
        common.population_frequencies = vec![
            PopulationFrequency::new("1kG_phase3", "ALL", 0.001),
            PopulationFrequency::new("GNOMAD_GENOMES", "ALL", 0.01),
        ];
        let entry = converter.convert(Some(&common))?;
        assert!(!entry.has_flag(POP_FREQ_ANY_RARE_MASK));
        assert_eq!(entry.pop_freq_index().to_int()?, 0b11_01);

        common.population_frequencies = vec![PopulationFrequency::new("GNOMAD_EXOMES", "ALL", 0.5)];
        let entry = converter.convert(Some(&common))?;
        assert!(entry.has_flag(POP_FREQ_ANY_RARE_MASK));
        Ok(())
    }

    #[test]
    fn test_missing_and_clinical_annotation() -> super::Result<()> {
        let converter = converter()?;
        let missing = converter.convert(None)?;
        assert!(!missing.has_summary_index());
        assert!(!missing.has_pop_freq_index());
        assert_eq!(missing.summary_index(), 0);
        assert_eq!(missing.pop_freq_index().bit_length(), 4);

        let mut clinical = annotation(vec![ConsequenceType::new("stop_gained", "protein_coding")]);
        clinical.clinical_significance = vec!["pathogenic".to_string()];
        let entry = converter.convert(Some(&clinical))?;
        assert!(entry.has_flag(CLINICAL_MASK));
        assert_eq!(entry.clinical_index(), 1 << 4);
        Ok(())
    }

    #[test]
    fn test_clinical_categories() -> super::Result<()> {
        let converter = converter()?;
        let significances = |values: &[&str]| values.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(converter.clinical_index(&significances(&["benign", "likely_pathogenic"])), 0b0_1001);
        assert_eq!(converter.clinical_index(&significances(&["uncertain_significance"])), 0b0_0100);
        assert_eq!(converter.clinical_index(&[]), 0);

        // flagged as clinical even when no category is tracked
        let mut other = annotation(vec![]);
        other.clinical_significance = significances(&["drug_response"]);
        let entry = converter.convert(Some(&other))?;
        assert!(entry.has_flag(CLINICAL_MASK));
        assert_eq!(entry.clinical_index(), 0);
        Ok(())
    }
}
