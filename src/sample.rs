//! Sample index
//!
//! For every sample and every genotype carrying an alternate allele, the sample
//! index stores the variants called with that genotype in the chunk, their count
//! and the annotation columns of those variants. A sample with conflicting calls
//! from different files is counted in its `_DC` column.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};

use crate::{
    annotation::{AnnotationIndexConverter, AnnotationIndexEntry, AnnotationIndexPutBuilder},
    config::IndexConfiguration,
    family::is_indexed_genotype,
    schema::{
        batch_start, encode_count, genotype_column, prefixed_column, write_variant, ChunkTracker,
        GenomicChunk, IndexKey, IndexPut, DISCREPANCY_COLUMN, GENOTYPE_COUNT_PREFIX,
    },
    Result, SampleGenotypes, Variant, VariantRecord,
};

#[derive(Debug, Clone)]
struct GenotypeColumns {
    variants: Vec<u8>,
    count: u32,
    annotation: AnnotationIndexPutBuilder,
}

impl GenotypeColumns {
    fn new(population_count: usize) -> Self {
        Self {
            variants: Vec::new(),
            count: 0,
            annotation: AnnotationIndexPutBuilder::new(population_count),
        }
    }

    fn add(&mut self, variant: &Variant, batch_start: u32, entry: &AnnotationIndexEntry) -> Result<()> {
        write_variant(&mut self.variants, variant, batch_start)?;
        self.count += 1;
        self.annotation.add(entry)
    }
}

#[derive(Debug, Clone, Default)]
struct SampleChunk {
    genotypes: BTreeMap<String, GenotypeColumns>,
    discrepancies: u32,
}

/// Builds the sample index over an ordered variant stream
#[derive(Debug, Clone)]
pub struct SampleIndexer {
    converter: AnnotationIndexConverter,
    tracker: ChunkTracker,
    samples: Option<HashSet<u32>>,
    chunks: BTreeMap<u32, SampleChunk>,
}

impl SampleIndexer {
    pub fn new(config: &IndexConfiguration) -> Result<Self> {
        config.validate()?;
        let converter = AnnotationIndexConverter::new(&config.annotation)?;
        info!(
            "Sample indexer ready: {} tracked populations, batch size {}",
            converter.population_count(),
            config.batch_size
        );
        Ok(Self {
            converter,
            tracker: ChunkTracker::new(config.batch_size),
            samples: None,
            chunks: BTreeMap::new(),
        })
    }

    /// Restricts the index to the given samples
    #[must_use]
    pub fn with_samples(mut self, samples: impl IntoIterator<Item = u32>) -> Self {
        self.samples = Some(samples.into_iter().collect());
        self
    }

    #[must_use]
    pub fn converter(&self) -> &AnnotationIndexConverter {
        &self.converter
    }

    fn is_selected(&self, sample: u32) -> bool {
        self.samples.as_ref().map_or(true, |s| s.contains(&sample))
    }

    /// Indexes one variant, appending the rows of any chunk it closes to `out`
    pub fn push(&mut self, record: &VariantRecord, out: &mut Vec<IndexPut>) -> Result<()> {
        let variant = &record.variant;
        if let Some(closed) = self.tracker.advance(&variant.chromosome, variant.start)? {
            self.flush(&closed, out)?;
        }
        let start = batch_start(variant.start, self.tracker.batch_size());
        let entry = self.converter.convert(record.annotation.as_ref())?;
        let population_count = self.converter.population_count();

        let genotypes = SampleGenotypes::from_record(record);
        for (sample, calls) in genotypes.iter() {
            if !self.is_selected(sample) {
                continue;
            }
            let chunk = self.chunks.entry(sample).or_default();
            if calls.len() > 1 {
                warn!("Discrepant calls for sample {sample} at {variant}: {calls:?}");
                chunk.discrepancies += 1;
            }
            for gt in calls {
                match is_indexed_genotype(gt) {
                    Ok(true) => chunk
                        .genotypes
                        .entry(gt.clone())
                        .or_insert_with(|| GenotypeColumns::new(population_count))
                        .add(variant, start, &entry)?,
                    Ok(false) => {}
                    Err(err) => warn!("Skipping sample {sample} at {variant}: {err}"),
                }
            }
        }
        Ok(())
    }

    /// Indexes a batch of ordered variants and returns the rows it finalized
    pub fn apply(&mut self, records: &[VariantRecord]) -> Result<Vec<IndexPut>> {
        let mut out = Vec::new();
        for record in records {
            self.push(record, &mut out)?;
        }
        Ok(out)
    }

    /// Finalizes the open chunk
    pub fn drain(&mut self) -> Result<Vec<IndexPut>> {
        let mut out = Vec::new();
        if let Some(closed) = self.tracker.close() {
            self.flush(&closed, &mut out)?;
        }
        info!("Sample indexer drained: {} rows", out.len());
        Ok(out)
    }

    fn flush(&mut self, chunk: &GenomicChunk, out: &mut Vec<IndexPut>) -> Result<()> {
        let before = out.len();
        for (sample, mut data) in std::mem::take(&mut self.chunks) {
            let mut put = IndexPut::new(IndexKey::new(sample, chunk));
            for (gt, columns) in &mut data.genotypes {
                put.add_column(genotype_column(gt), std::mem::take(&mut columns.variants));
                put.add_column(
                    prefixed_column(GENOTYPE_COUNT_PREFIX, gt),
                    encode_count(columns.count),
                );
                columns.annotation.build_and_reset(&mut put, gt)?;
            }
            if data.discrepancies > 0 {
                put.add_column(DISCREPANCY_COLUMN, encode_count(data.discrepancies));
            }
            if !put.is_empty() {
                out.push(put);
            }
        }
        debug!(
            "Flushed {} sample rows for {}:{}",
            out.len() - before,
            chunk.chromosome,
            chunk.batch_start
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        annotation::{INTERGENIC_MASK, LOF_MASK},
        schema::{decode_count, read_variants},
        ConsequenceType, FileGenotypes, VariantAnnotation,
    };

    fn config(batch_size: u32) -> IndexConfiguration {
        IndexConfiguration {
            batch_size,
            ..IndexConfiguration::default()
        }
    }

    fn record(position: u32, groups: &[(&str, &[u32])]) -> VariantRecord {
        let mut file = FileGenotypes::new(1);
        for (gt, samples) in groups {
            file = file.with_genotype(*gt, samples);
        }
        VariantRecord::new(Variant::new("7", position, "G", "A")).with_file(file)
    }

    fn find<'a>(puts: &'a [IndexPut], sample: u32) -> Option<&'a IndexPut> {
        puts.iter().find(|p| p.key().id == sample)
    }

    #[test]
    fn test_sample_columns() -> super::Result<()> {
        let mut indexer = SampleIndexer::new(&config(1_000))?;
        let stop_gained = VariantAnnotation {
            consequence_types: vec![ConsequenceType::new("stop_gained", "protein_coding")],
            ..VariantAnnotation::default()
        };
        let records = vec![
            record(1_010, &[("0/1", &[1, 2]), ("0/0", &[3])]).with_annotation(stop_gained),
            record(1_020, &[("0/1", &[1]), ("1/1", &[2])]).with_annotation(VariantAnnotation::default()),
            // next chunk
            record(2_005, &[("0/1", &[1])]),
        ];
        let puts = indexer.apply(&records)?;
        assert_eq!(puts.len(), 2);

        let first = find(&puts, 1).ok_or(crate::ColumnError::Truncated("sample 1".into()))?;
        assert_eq!(first.key().batch_start, 1_000);
        let variants = read_variants(first.get("0/1").unwrap_or_default(), "7", 1_000)?;
        assert_eq!(
            variants.iter().map(|v| v.start).collect::<Vec<_>>(),
            vec![1_010, 1_020]
        );
        assert_eq!(first.get("_C_0/1").map(decode_count).transpose()?, Some(2));
        let summary = first.get("_A_0/1").unwrap_or_default();
        assert_eq!(summary.len(), 2);
        assert_ne!(summary[0] & LOF_MASK, 0);
        assert_ne!(summary[1] & INTERGENIC_MASK, 0);
        assert_eq!(first.get("_BT_0/1").map(<[u8]>::len), Some(1));

        let second = find(&puts, 2).ok_or(crate::ColumnError::Truncated("sample 2".into()))?;
        assert_eq!(second.get("_C_1/1").map(decode_count).transpose()?, Some(1));
        // homozygous reference calls are not indexed
        assert!(find(&puts, 3).is_none());

        let drained = indexer.drain()?;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].key().batch_start, 2_000);
        // no annotation: summary is empty, frequency codes are zero
        assert_eq!(drained[0].get("_A_0/1"), Some(&[0u8][..]));
        assert_eq!(drained[0].get("_PF_0/1"), Some(&[0u8][..]));
        Ok(())
    }

    #[test]
    fn test_discrepancies_and_invalid_calls() -> super::Result<()> {
        let mut indexer = SampleIndexer::new(&config(1_000))?;
        let record = VariantRecord::new(Variant::new("7", 10, "G", "A"))
            .with_file(FileGenotypes::new(1).with_genotype("0/1", &[5]).with_genotype("./.", &[6]))
            .with_file(FileGenotypes::new(2).with_genotype("1/1", &[5]).with_genotype("NA", &[6]));
        indexer.apply(&[record])?;
        let puts = indexer.drain()?;

        let discrepant = find(&puts, 5).ok_or(crate::ColumnError::Truncated("sample 5".into()))?;
        assert_eq!(discrepant.get("_DC").map(decode_count).transpose()?, Some(1));
        assert!(discrepant.get("0/1").is_some());
        assert!(discrepant.get("1/1").is_some());

        // only the discrepancy count is left for a sample without valid calls
        let invalid = find(&puts, 6).ok_or(crate::ColumnError::Truncated("sample 6".into()))?;
        assert_eq!(invalid.len(), 1);
        Ok(())
    }

    #[test]
    fn test_sample_filter() -> super::Result<()> {
        let mut indexer = SampleIndexer::new(&config(1_000))?.with_samples([2]);
        indexer.apply(&[record(1, &[("0/1", &[1, 2])])])?;
        let puts = indexer.drain()?;
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].key().id, 2);
        Ok(())
    }
}
