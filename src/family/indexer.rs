use std::collections::{BTreeSet, HashSet};

use log::{debug, info, warn};

use super::{
    builder::{FamilyIndexBuilder, FamilyIndexEntry},
    genotype::{parent_code, Genotype},
    mendelian::{mendelian_error, COMPATIBLE},
    trio::{SampleRegistry, Trio},
};
use crate::{
    config::IndexConfiguration,
    schema::{ChunkTracker, GenomicChunk},
    ConfigError, Result, SampleGenotypes, Variant, VariantRecord,
};

/// Call assumed for a parent without a recorded genotype
const MISSING_PARENT_GENOTYPE: &str = "0/0";

/// Builds the family index of a set of trios over an ordered variant stream
///
/// One [`FamilyIndexBuilder`] is kept per child. Whenever a variant falls in a new
/// chunk, every non-empty builder is finalized for the chunk just closed.
#[derive(Debug, Clone)]
pub struct FamilyIndexer {
    trios: Vec<Trio>,
    builders: Vec<FamilyIndexBuilder>,
    tracker: ChunkTracker,
}

impl FamilyIndexer {
    /// # Errors
    ///
    /// * [`ConfigError::DuplicatedChild`] if a child appears in more than one trio
    /// * [`ConfigError::InvalidBatchSize`] for a zero batch size
    pub fn new(trios: Vec<Trio>, batch_size: u32) -> Result<Self> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(batch_size).into());
        }
        let mut children = HashSet::with_capacity(trios.len());
        for trio in &trios {
            if !children.insert(trio.child) {
                return Err(ConfigError::DuplicatedChild(trio.child.to_string()).into());
            }
        }
        let builders = trios
            .iter()
            .map(|trio| FamilyIndexBuilder::new(trio.child))
            .collect();
        info!(
            "Family indexer ready: {} trios, batch size {batch_size}",
            trios.len()
        );
        Ok(Self {
            trios,
            builders,
            tracker: ChunkTracker::new(batch_size),
        })
    }

    /// Resolves the configured trios against the known samples
    pub fn from_configuration(config: &IndexConfiguration, registry: &SampleRegistry) -> Result<Self> {
        config.validate()?;
        let trios = config
            .trios
            .iter()
            .map(|definition| registry.resolve(definition))
            .collect::<Result<Vec<_>>>()?;
        Self::new(trios, config.batch_size)
    }

    #[must_use]
    pub fn trios(&self) -> &[Trio] {
        &self.trios
    }

    /// Indexes one variant, appending the entries of any chunk it closes to `out`
    pub fn push(&mut self, record: &VariantRecord, out: &mut Vec<FamilyIndexEntry>) -> Result<()> {
        let variant = &record.variant;
        if let Some(closed) = self.tracker.advance(&variant.chromosome, variant.start)? {
            self.flush(&closed, out);
        }
        self.index_variant(record)
    }

    /// Indexes a batch of ordered variants and returns the entries it finalized
    pub fn apply(&mut self, records: &[VariantRecord]) -> Result<Vec<FamilyIndexEntry>> {
        let mut out = Vec::new();
        for record in records {
            self.push(record, &mut out)?;
        }
        Ok(out)
    }

    /// Finalizes the open chunk
    pub fn drain(&mut self) -> Vec<FamilyIndexEntry> {
        let mut out = Vec::new();
        if let Some(closed) = self.tracker.close() {
            self.flush(&closed, &mut out);
        }
        info!("Family indexer drained: {} entries", out.len());
        out
    }

    fn flush(&mut self, chunk: &GenomicChunk, out: &mut Vec<FamilyIndexEntry>) {
        let before = out.len();
        out.extend(self.builders.iter_mut().filter_map(|b| b.build(chunk)));
        debug!(
            "Flushed {} family entries for {}:{}",
            out.len() - before,
            chunk.chromosome,
            chunk.batch_start
        );
    }

    fn index_variant(&mut self, record: &VariantRecord) -> Result<()> {
        let genotypes = SampleGenotypes::from_record(record);
        let variant = &record.variant;
        for (trio, builder) in self.trios.iter().zip(self.builders.iter_mut()) {
            let Some(child_calls) = genotypes.get(trio.child) else {
                continue;
            };
            let unknown = trio.has_unknown_parent_genotypes;
            let fathers = parent_candidates(trio.father, &genotypes, unknown);
            let mothers = parent_candidates(trio.mother, &genotypes, unknown);
            if child_calls.len() > 1 || fathers.len() > 1 || mothers.len() > 1 {
                warn!("Discrepant calls in the trio of child {} at {variant}", trio.child);
                builder.add_discrepancy();
            }
            let father_code = candidates_code(&fathers);
            let mother_code = candidates_code(&mothers);

            for gt in child_calls {
                let child = match gt.parse::<Genotype>() {
                    Ok(child) => child,
                    Err(err) => {
                        warn!("Skipping child {} at {variant}: {err}", trio.child);
                        continue;
                    }
                };
                let occurrence = if child.has_alt() {
                    builder.add_parents(gt, father_code, mother_code)?
                } else {
                    builder.add_unindexed(gt)
                };
                for code in mendelian_codes(&fathers, &mothers, &child, variant) {
                    builder.add_mendelian_error(variant, gt, occurrence, code);
                }
            }
        }
        Ok(())
    }
}

/// Every call a parent may have at this variant, `None` standing for no information
fn parent_candidates<'a>(
    parent: Option<u32>,
    genotypes: &'a SampleGenotypes,
    has_unknown_parent_genotypes: bool,
) -> Vec<Option<&'a str>> {
    let Some(parent) = parent else {
        return vec![None];
    };
    match genotypes.get(parent) {
        Some(calls) => calls.iter().map(|gt| Some(gt.as_str())).collect(),
        None if has_unknown_parent_genotypes => vec![None],
        None => vec![Some(MISSING_PARENT_GENOTYPE)],
    }
}

fn candidates_code(candidates: &[Option<&str>]) -> u8 {
    match candidates {
        [single] => parent_code::encode(*single),
        _ => parent_code::DISCREPANCY,
    }
}

fn parse_parent(gt: Option<&str>, variant: &Variant) -> Option<Option<Genotype>> {
    match gt.map(str::parse::<Genotype>).transpose() {
        Ok(genotype) => Some(genotype),
        Err(err) => {
            warn!("Skipping parent call at {variant}: {err}");
            None
        }
    }
}

/// Distinct error codes over every combination of parent calls
fn mendelian_codes(
    fathers: &[Option<&str>],
    mothers: &[Option<&str>],
    child: &Genotype,
    variant: &Variant,
) -> BTreeSet<u8> {
    let mut codes = BTreeSet::new();
    for father in fathers {
        let Some(father) = parse_parent(*father, variant) else {
            continue;
        };
        for mother in mothers {
            let Some(mother) = parse_parent(*mother, variant) else {
                continue;
            };
            let code = mendelian_error(father.as_ref(), mother.as_ref(), child, &variant.chromosome);
            if code != COMPATIBLE {
                codes.insert(code);
            }
        }
    }
    codes
}
