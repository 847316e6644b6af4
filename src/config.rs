//! Index configuration
//!
//! Everything that shapes the persisted bit layout lives here: the ordered list of
//! tracked populations and their frequency thresholds, the consequence-type term
//! sets, the tracked biotypes with the biotypes folded into them, the clinical
//! significance categories and the genomic batch size.
//!
//! A configuration is supplied once at startup and is read-only afterwards. It can
//! be built in code or loaded from TOML:
//!
//! ```toml
//! batch_size = 1000000
//!
//! [annotation]
//! rare_threshold = 0.01
//! biotypes = ["protein_coding", "lincRNA"]
//!
//! [annotation.biotype_mapping]
//! lincRNA = ["lncRNA", "antisense", "sense_intronic"]
//!
//! [annotation.population_frequency]
//! populations = ["1kG_phase3:ALL", "GNOMAD_GENOMES:ALL"]
//! thresholds = [0.001, 0.005, 0.01]
//!
//! [[trios]]
//! father = "NA12891"
//! mother = "NA12892"
//! child = "NA12878"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{family::TrioDefinition, ConfigError, Result};

/// Default genomic batch size
pub const DEFAULT_BATCH_SIZE: u32 = 1_000_000;

/// Maximum number of tracked biotypes (one byte per entry)
pub const MAX_BIOTYPES: usize = 8;

/// Maximum number of tracked consequence types (one short per entry)
pub const MAX_CONSEQUENCE_TYPES: usize = 16;

/// Maximum number of clinical significance categories (one byte per entry)
pub const MAX_CLINICAL_SIGNIFICANCES: usize = 8;

/// Frequency codes are 2 bits wide, so at most 3 thresholds split 4 ranges
pub const MAX_THRESHOLDS: usize = 3;

pub const MISSENSE_VARIANT: &str = "missense_variant";
pub const PROTEIN_CODING: &str = "protein_coding";

const DEFAULT_POPULATIONS: [&str; 2] = ["1kG_phase3:ALL", "GNOMAD_GENOMES:ALL"];
const DEFAULT_THRESHOLDS: [f64; 3] = [0.001, 0.005, 0.01];
const DEFAULT_RARE_THRESHOLD: f64 = 0.01;

const DEFAULT_LOF: [&str; 10] = [
    "transcript_ablation",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "stop_gained",
    "frameshift_variant",
    "stop_lost",
    "start_lost",
    "transcript_amplification",
    "inframe_insertion",
    "inframe_deletion",
];

const DEFAULT_INTERGENIC: [&str; 7] = [
    "intergenic_variant",
    "regulatory_region_variant",
    "regulatory_region_ablation",
    "regulatory_region_amplification",
    "TF_binding_site_variant",
    "TFBS_ablation",
    "TFBS_amplification",
];

const DEFAULT_BIOTYPES: [&str; 8] = [
    "nonsense_mediated_decay",
    LINCRNA,
    "miRNA",
    "retained_intron",
    "snRNA",
    "snoRNA",
    OTHER_NON_PSEUDO_GENE,
    PROTEIN_CODING,
];

const LINCRNA: &str = "lincRNA";
const OTHER_NON_PSEUDO_GENE: &str = "other_non_pseudo_gene";

const DEFAULT_LINCRNA_BIOTYPES: [&str; 9] = [
    "lncRNA",
    "non_coding",
    LINCRNA,
    "macro_lncRNA",
    "antisense",
    "sense_intronic",
    "sense_overlapping",
    "3prime_overlapping_ncRNA",
    "bidirectional_promoter_lncRNA",
];

const DEFAULT_OTHER_NON_PSEUDO_GENE_BIOTYPES: [&str; 20] = [
    "processed_transcript",
    "non_stop_decay",
    "misc_RNA",
    "rRNA",
    "Mt_rRNA",
    "Mt_tRNA",
    "IG_C_gene",
    "IG_D_gene",
    "IG_J_gene",
    "IG_V_gene",
    "TR_C_gene",
    "TR_D_gene",
    "TR_J_gene",
    "TR_V_gene",
    "NMD_transcript_variant",
    "transcribed_unprocessed_pseudogene",
    "ambiguous_orf",
    "known_ncrna",
    "retrotransposed",
    "LRG_gene",
];

const DEFAULT_CLINICAL_SIGNIFICANCE: [&str; 5] = [
    "benign",
    "likely_benign",
    "uncertain_significance",
    "likely_pathogenic",
    "pathogenic",
];

const DEFAULT_CONSEQUENCE_TYPES: [&str; 16] = [
    MISSENSE_VARIANT,
    "frameshift_variant",
    "inframe_deletion",
    "inframe_insertion",
    "start_lost",
    "stop_gained",
    "stop_lost",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "transcript_ablation",
    "transcript_amplification",
    "initiator_codon_variant",
    "splice_region_variant",
    "incomplete_terminal_codon_variant",
    "synonymous_variant",
    "mature_miRNA_variant",
];

fn to_strings<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// A reference population within a frequency study
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Population {
    pub study: String,
    pub population: String,
}

impl Population {
    pub fn new(study: impl Into<String>, population: impl Into<String>) -> Self {
        Self {
            study: study.into(),
            population: population.into(),
        }
    }

    /// Exact, case-sensitive match
    #[must_use]
    pub fn matches(&self, study: &str, population: &str) -> bool {
        self.study == study && self.population == population
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.study, self.population)
    }
}

impl FromStr for Population {
    type Err = ConfigError;

    /// Parses `study:population`, splitting at the last colon
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((study, population)) if !study.is_empty() && !population.is_empty() => {
                Ok(Self::new(study, population))
            }
            _ => Err(ConfigError::InvalidPopulation(s.to_string())),
        }
    }
}

impl TryFrom<String> for Population {
    type Error = ConfigError;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Population> for String {
    fn from(value: Population) -> Self {
        value.to_string()
    }
}

/// Ordered, de-duplicated populations and the thresholds splitting frequencies into codes
///
/// The position of a population in the list is its slot in the frequency column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationFrequencyRanges {
    populations: Vec<Population>,
    thresholds: Vec<f64>,
}

impl Default for PopulationFrequencyRanges {
    fn default() -> Self {
        Self {
            populations: DEFAULT_POPULATIONS
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

impl PopulationFrequencyRanges {
    /// Creates an empty population list with the given thresholds
    pub fn new(thresholds: Vec<f64>) -> Result<Self> {
        validate_thresholds(&thresholds)?;
        Ok(Self {
            populations: Vec::new(),
            thresholds,
        })
    }

    /// Registers a population in the next free slot
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicatedPopulation`] if the population is already tracked.
    pub fn add_population(&mut self, population: Population) -> Result<()> {
        if self.populations.contains(&population) {
            return Err(ConfigError::DuplicatedPopulation(population.to_string()).into());
        }
        self.populations.push(population);
        Ok(())
    }

    /// Builder-style [`add_population`](Self::add_population)
    pub fn with_population(mut self, study: &str, population: &str) -> Result<Self> {
        self.add_population(Population::new(study, population))?;
        Ok(self)
    }

    #[must_use]
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    #[must_use]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Number of tracked populations
    #[must_use]
    pub fn len(&self) -> usize {
        self.populations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    /// Slot of a population, if tracked
    #[must_use]
    pub fn position(&self, study: &str, population: &str) -> Option<usize> {
        self.populations
            .iter()
            .position(|p| p.matches(study, population))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.populations.len());
        for population in &self.populations {
            if !seen.insert(population) {
                return Err(ConfigError::DuplicatedPopulation(population.to_string()).into());
            }
        }
        validate_thresholds(&self.thresholds)
    }
}

fn validate_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.len() > MAX_THRESHOLDS {
        return Err(ConfigError::TooManyThresholds(thresholds.len()).into());
    }
    let in_range = thresholds.iter().all(|t| *t > 0.0 && *t <= 1.0);
    let ascending = thresholds.windows(2).all(|w| w[0] < w[1]);
    if !in_range || !ascending {
        return Err(ConfigError::InvalidThresholds(thresholds.to_vec()).into());
    }
    Ok(())
}

/// Term sets and tracked values used by the annotation index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationIndexConfiguration {
    /// Frequencies at or above this value are common and clear the rare flag
    pub rare_threshold: f64,

    /// Loss-of-function consequence types
    pub lof: Vec<String>,

    /// Extended loss-of-function consequence types, a superset of `lof`
    pub lof_extended: Vec<String>,

    /// Consequence types that are not gene-proximal
    pub intergenic: Vec<String>,

    /// Biotypes tracked individually, in bit order
    pub biotypes: Vec<String>,

    /// Consequence types tracked individually, in bit order
    pub consequence_types: Vec<String>,

    /// Clinical significance categories, in bit order
    pub clinical_significance: Vec<String>,

    /// Extra biotypes folded into a tracked biotype, keyed by the tracked one
    ///
    /// Entries keyed by an untracked biotype are ignored.
    pub biotype_mapping: BTreeMap<String, Vec<String>>,

    pub population_frequency: PopulationFrequencyRanges,
}

impl Default for AnnotationIndexConfiguration {
    fn default() -> Self {
        let lof = to_strings(DEFAULT_LOF);
        let mut lof_extended = lof.clone();
        lof_extended.push(MISSENSE_VARIANT.to_string());
        Self {
            rare_threshold: DEFAULT_RARE_THRESHOLD,
            lof,
            lof_extended,
            intergenic: to_strings(DEFAULT_INTERGENIC),
            biotypes: to_strings(DEFAULT_BIOTYPES),
            consequence_types: to_strings(DEFAULT_CONSEQUENCE_TYPES),
            clinical_significance: to_strings(DEFAULT_CLINICAL_SIGNIFICANCE),
            biotype_mapping: BTreeMap::from([
                (LINCRNA.to_string(), to_strings(DEFAULT_LINCRNA_BIOTYPES)),
                (
                    OTHER_NON_PSEUDO_GENE.to_string(),
                    to_strings(DEFAULT_OTHER_NON_PSEUDO_GENE_BIOTYPES),
                ),
            ]),
            population_frequency: PopulationFrequencyRanges::default(),
        }
    }
}

impl AnnotationIndexConfiguration {
    pub fn validate(&self) -> Result<()> {
        self.population_frequency.validate()?;
        if self.biotypes.len() > MAX_BIOTYPES {
            return Err(ConfigError::TooManyBiotypes(self.biotypes.len()).into());
        }
        if self.consequence_types.len() > MAX_CONSEQUENCE_TYPES {
            return Err(ConfigError::TooManyConsequenceTypes(self.consequence_types.len()).into());
        }
        if self.clinical_significance.len() > MAX_CLINICAL_SIGNIFICANCES {
            return Err(
                ConfigError::TooManyClinicalSignificances(self.clinical_significance.len()).into(),
            );
        }
        if !(self.rare_threshold > 0.0 && self.rare_threshold <= 1.0) {
            return Err(ConfigError::InvalidThresholds(vec![self.rare_threshold]).into());
        }
        Ok(())
    }
}

/// Top-level configuration of the index builders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfiguration {
    /// Width of a genomic chunk, in base pairs
    pub batch_size: u32,
    pub annotation: AnnotationIndexConfiguration,
    /// Trios of the family index
    pub trios: Vec<TrioDefinition>,
}

impl Default for IndexConfiguration {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            annotation: AnnotationIndexConfiguration::default(),
            trios: Vec::new(),
        }
    }
}

impl IndexConfiguration {
    /// Checks every invariant of the configuration
    ///
    /// # Errors
    ///
    /// * [`ConfigError::DuplicatedPopulation`] for a repeated `study:population`
    /// * [`ConfigError::TooManyBiotypes`], [`ConfigError::TooManyConsequenceTypes`]
    ///   or [`ConfigError::TooManyClinicalSignificances`] if a tracked list does not
    ///   fit its column
    /// * [`ConfigError::InvalidThresholds`] for non-ascending or out of range thresholds
    /// * [`ConfigError::InvalidBatchSize`] for a zero batch size
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size).into());
        }
        self.annotation.validate()
    }

    /// Parses and validates a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }
}
