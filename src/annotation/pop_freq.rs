use crate::{
    bit::{BitBuffer, BitOutputStream},
    config::AnnotationIndexConfiguration,
    PopulationFrequency, PopulationFrequencyRanges, Result,
};

/// Width of the frequency range code of one population
pub const POP_FREQ_BITS: usize = 2;

/// Frequency codes of one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationFrequencyIndex {
    /// One code per tracked population, slot 0 in the lowest bits
    pub codes: BitBuffer,
    /// No tracked population reaches the rare threshold
    pub any_rare: bool,
}

/// Classifies allele frequencies of the tracked populations into range codes
#[derive(Debug, Clone)]
pub struct PopulationFrequencyIndexer {
    ranges: PopulationFrequencyRanges,
    rare_threshold: f64,
}

impl PopulationFrequencyIndexer {
    /// Validates the configuration and copies the tracked populations
    pub fn new(config: &AnnotationIndexConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ranges: config.population_frequency.clone(),
            rare_threshold: config.rare_threshold,
        })
    }

    /// Number of bits used per variant
    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.ranges.len() * POP_FREQ_BITS
    }

    #[must_use]
    pub fn population_count(&self) -> usize {
        self.ranges.len()
    }

    /// Range code of a frequency: the number of thresholds it reaches
    #[must_use]
    pub fn code(&self, frequency: f64) -> u8 {
        self.ranges
            .thresholds()
            .iter()
            .filter(|threshold| frequency >= **threshold)
            .count() as u8
    }

    /// Encodes the frequencies of one variant
    ///
    /// Populations without a frequency are encoded as frequency 0. Frequencies of
    /// untracked populations are ignored.
    pub fn encode(&self, frequencies: &[PopulationFrequency]) -> Result<PopulationFrequencyIndex> {
        let mut stream = BitOutputStream::with_capacity(self.bit_length().div_ceil(8));
        let mut any_rare = true;
        for population in self.ranges.populations() {
            let frequency = frequencies
                .iter()
                .find(|f| population.matches(&f.study, &f.population))
                .map_or(0.0, |f| f.alt_allele_freq);
            if frequency >= self.rare_threshold {
                any_rare = false;
            }
            stream.write_byte(self.code(frequency), POP_FREQ_BITS)?;
        }
        Ok(PopulationFrequencyIndex {
            codes: stream.to_bit_buffer()?,
            any_rare,
        })
    }

    /// Codes of a variant without frequency data
    pub fn empty(&self) -> PopulationFrequencyIndex {
        PopulationFrequencyIndex {
            codes: BitBuffer::new(self.bit_length()),
            any_rare: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer(populations: &[(&str, &str)]) -> super::Result<PopulationFrequencyIndexer> {
        let mut ranges = PopulationFrequencyRanges::new(vec![0.001, 0.005, 0.01])?;
        for (study, population) in populations {
            ranges = ranges.with_population(study, population)?;
        }
        let config = AnnotationIndexConfiguration {
            population_frequency: ranges,
            rare_threshold: 0.01,
            ..AnnotationIndexConfiguration::default()
        };
        PopulationFrequencyIndexer::new(&config)
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let config = AnnotationIndexConfiguration {
            rare_threshold: 0.0,
            ..AnnotationIndexConfiguration::default()
        };
        assert!(matches!(
            PopulationFrequencyIndexer::new(&config),
            Err(crate::Error::ConfigError(crate::ConfigError::InvalidThresholds(_)))
        ));
    }

    #[test]
    fn test_codes_are_monotonic() -> super::Result<()> {
        let indexer = indexer(&[("S", "ALL")])?;
        assert_eq!(indexer.code(0.0), 0);
        assert_eq!(indexer.code(0.000_99), 0);
        assert_eq!(indexer.code(0.001), 1);
        assert_eq!(indexer.code(0.007), 2);
        assert_eq!(indexer.code(0.01), 3);
        assert_eq!(indexer.code(0.5), 3);
        let mut previous = 0;
        for step in 0..=1000 {
            let code = indexer.code(f64::from(step) / 1000.0);
            assert!(code >= previous);
            previous = code;
        }
        Ok(())
    }

    #[test]
    fn test_packing_order() -> super::Result<()> {
        let indexer = indexer(&[("A", "ALL"), ("B", "ALL"), ("C", "ALL"), ("D", "ALL"), ("E", "ALL")])?;
        let index = indexer.encode(&[
            PopulationFrequency::new("B", "ALL", 0.002),
            PopulationFrequency::new("E", "ALL", 0.2),
            PopulationFrequency::new("D", "ALL", 0.006),
        ])?;
        assert_eq!(index.codes.bit_length(), 10);
        // slots 0..4 hold codes 0, 1, 0, 2 in the first byte
        assert_eq!(index.codes.get_byte(0)?, 0b10_00_01_00);
        assert_eq!(index.codes.get_byte_partial(8, 2)?, 3);
        // high bits of the partial byte stay zero
        assert_eq!(index.codes.to_byte_array(), vec![0b10_00_01_00, 0b11]);
        assert!(!index.any_rare);
        Ok(())
    }

    #[test]
    fn test_rare_flag() -> super::Result<()> {
        let indexer = indexer(&[("1kG_phase3", "ALL"), ("GNOMAD_GENOMES", "ALL")])?;
        assert!(indexer.encode(&[])?.any_rare);
        assert!(indexer.empty().any_rare);

        let rare = indexer.encode(&[
            PopulationFrequency::new("1kG_phase3", "ALL", 0.009_999),
            PopulationFrequency::new("GNOMAD_GENOMES", "ALL", 0.000_1),
        ])?;
        assert!(rare.any_rare);

        // exactly at the threshold is common
        let common = indexer.encode(&[PopulationFrequency::new("GNOMAD_GENOMES", "ALL", 0.01)])?;
        assert!(!common.any_rare);

        // untracked populations never matter
        let untracked = indexer.encode(&[
            PopulationFrequency::new("GNOMAD_EXOMES", "ALL", 0.9),
            PopulationFrequency::new("1kG_phase3", "AFR", 0.9),
        ])?;
        assert!(untracked.any_rare);
        assert_eq!(untracked.codes.to_int()?, 0);
        Ok(())
    }
}
