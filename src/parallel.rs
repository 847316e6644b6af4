//! Partitioned execution
//!
//! Indexers are ordered, single-threaded pipelines. Parallelism comes from
//! splitting the input into disjoint chromosome partitions and running one
//! independent pipeline per partition.

use std::sync::Arc;

use log::info;

use crate::{
    family::{FamilyIndexEntry, FamilyIndexer},
    sample::SampleIndexer,
    schema::{IndexPut, IndexSink},
    Result, VariantRecord,
};

/// Number of records handed to a pipeline at once
pub const RECORD_BATCH_SIZE: usize = 1024;

/// An ordered index pipeline: batches in, finalized entries out
pub trait IndexPipeline {
    type Output: Send;

    /// Indexes a batch of ordered records and returns the entries it finalized
    fn apply(&mut self, records: &[VariantRecord]) -> Result<Vec<Self::Output>>;

    /// Finalizes whatever is still open
    fn drain(&mut self) -> Result<Vec<Self::Output>>;

    /// Storage row of a finalized entry
    fn into_put(output: Self::Output) -> Result<IndexPut>;

    /// Indexes `records` to the end and writes every row to `sink`
    ///
    /// Records are applied in batches of [`RECORD_BATCH_SIZE`]. The sink is
    /// flushed once the pipeline is drained.
    fn index_into<S: IndexSink>(&mut self, records: &[VariantRecord], mut sink: S) -> Result<usize>
    where
        Self: Sized,
    {
        let mut written = 0;
        for batch in records.chunks(RECORD_BATCH_SIZE) {
            for output in self.apply(batch)? {
                sink.write(Self::into_put(output)?)?;
                written += 1;
            }
        }
        for output in self.drain()? {
            sink.write(Self::into_put(output)?)?;
            written += 1;
        }
        sink.flush()?;
        Ok(written)
    }
}

impl IndexPipeline for FamilyIndexer {
    type Output = FamilyIndexEntry;

    fn apply(&mut self, records: &[VariantRecord]) -> Result<Vec<Self::Output>> {
        FamilyIndexer::apply(self, records)
    }

    fn drain(&mut self) -> Result<Vec<Self::Output>> {
        Ok(FamilyIndexer::drain(self))
    }

    fn into_put(output: Self::Output) -> Result<IndexPut> {
        output.to_put()
    }
}

impl IndexPipeline for SampleIndexer {
    type Output = IndexPut;

    fn apply(&mut self, records: &[VariantRecord]) -> Result<Vec<Self::Output>> {
        SampleIndexer::apply(self, records)
    }

    fn drain(&mut self) -> Result<Vec<Self::Output>> {
        SampleIndexer::drain(self)
    }

    fn into_put(output: Self::Output) -> Result<IndexPut> {
        Ok(output)
    }
}

/// Consumer of the entries produced by the partition workers
///
/// Every worker owns a clone. Implementations that share state across workers
/// must synchronize it themselves.
pub trait PartitionProcessor<T>: Send + Clone {
    /// Process a single finalized entry
    fn process_output(&mut self, output: T) -> Result<()>;

    /// Called when a worker finishes a partition
    fn on_partition_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    #[allow(unused_variables)]
    fn set_tid(&mut self, tid: usize) {}

    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Groups records by chromosome, keeping the first-seen chromosome order and the
/// record order within each chromosome
#[must_use]
pub fn partition_by_chromosome(records: Vec<VariantRecord>) -> Vec<Vec<VariantRecord>> {
    let mut partitions: Vec<Vec<VariantRecord>> = Vec::new();
    for record in records {
        match partitions
            .iter_mut()
            .find(|p| p.first().is_some_and(|r| r.variant.chromosome == record.variant.chromosome))
        {
            Some(partition) => partition.push(record),
            None => partitions.push(vec![record]),
        }
    }
    partitions
}

/// Runs one pipeline per partition on up to `num_threads` workers
///
/// `num_threads == 0` uses every available core. Each worker builds its pipelines
/// with `factory` and feeds their entries to its own clone of `processor`.
pub fn process_partitions<I, F, P>(
    partitions: Vec<Vec<VariantRecord>>,
    factory: F,
    processor: P,
    num_threads: usize,
) -> Result<()>
where
    I: IndexPipeline + 'static,
    F: Fn() -> Result<I> + Send + Sync + 'static,
    P: PartitionProcessor<I::Output> + 'static,
{
    let num_threads = if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads.min(num_cpus::get())
    };
    if partitions.is_empty() {
        return Ok(());
    }
    let partitions_per_thread = partitions.len().div_ceil(num_threads);
    info!(
        "Indexing {} partitions on {num_threads} threads",
        partitions.len()
    );

    let partitions = Arc::new(partitions);
    let factory = Arc::new(factory);

    let mut handles = Vec::new();
    for tid in 0..num_threads {
        let mut processor = processor.clone();
        let partitions = partitions.clone();
        let factory = factory.clone();
        processor.set_tid(tid);

        let handle = std::thread::spawn(move || -> Result<()> {
            let start_idx = tid * partitions_per_thread;
            let end_idx = (start_idx + partitions_per_thread).min(partitions.len());
            for partition in partitions.get(start_idx..end_idx).unwrap_or_default() {
                let mut pipeline = factory()?;
                for batch in partition.chunks(RECORD_BATCH_SIZE) {
                    for output in pipeline.apply(batch)? {
                        processor.process_output(output)?;
                    }
                }
                for output in pipeline.drain()? {
                    processor.process_output(output)?;
                }
                processor.on_partition_complete()?;
            }
            Ok(())
        });
        handles.push(handle);
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("Partition worker panicked"))??;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        config::IndexConfiguration,
        family::Trio,
        FileGenotypes, Variant,
    };

    struct Collector<T> {
        outputs: Arc<Mutex<Vec<T>>>,
        partitions: Arc<Mutex<usize>>,
    }

    impl<T> Clone for Collector<T> {
        fn clone(&self) -> Self {
            Self {
                outputs: self.outputs.clone(),
                partitions: self.partitions.clone(),
            }
        }
    }

    impl<T> Default for Collector<T> {
        fn default() -> Self {
            Self {
                outputs: Arc::new(Mutex::new(Vec::new())),
                partitions: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl<T: Send> PartitionProcessor<T> for Collector<T> {
        fn process_output(&mut self, output: T) -> Result<()> {
            self.outputs.lock().push(output);
            Ok(())
        }

        fn on_partition_complete(&mut self) -> Result<()> {
            *self.partitions.lock() += 1;
            Ok(())
        }
    }

    fn records() -> Vec<VariantRecord> {
        let mut records = Vec::new();
        for position in (0..30_000).step_by(1_500) {
            for chromosome in ["1", "2", "X"] {
                let file = FileGenotypes::new(1)
                    .with_genotype("0/1", &[3])
                    .with_genotype("0/0", &[1, 2]);
                records.push(
                    VariantRecord::new(Variant::new(chromosome, position, "A", "T")).with_file(file),
                );
            }
        }
        records
    }

    fn config() -> IndexConfiguration {
        IndexConfiguration {
            batch_size: 10_000,
            ..IndexConfiguration::default()
        }
    }

    #[test]
    fn test_partition_by_chromosome() {
        let partitions = partition_by_chromosome(records());
        assert_eq!(partitions.len(), 3);
        for partition in &partitions {
            assert_eq!(partition.len(), 20);
            assert!(partition
                .windows(2)
                .all(|w| w[0].variant.start < w[1].variant.start));
        }
        assert_eq!(partitions[2][0].variant.chromosome, "X");
    }

    #[test]
    fn test_parallel_matches_sequential() -> super::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut sequential = Vec::new();
        for partition in partition_by_chromosome(records()) {
            let mut indexer = SampleIndexer::new(&config())?;
            sequential.extend(indexer.apply(&partition)?);
            sequential.extend(indexer.drain()?);
        }

        for num_threads in [0, 1, 2, 8] {
            let collector = Collector::default();
            process_partitions(
                partition_by_chromosome(records()),
                || SampleIndexer::new(&config()),
                collector.clone(),
                num_threads,
            )?;
            let keys: BTreeSet<Vec<u8>> = collector.outputs.lock().iter().map(IndexPut::row_key).collect();
            let expected: BTreeSet<Vec<u8>> = sequential.iter().map(IndexPut::row_key).collect();
            // 3 chromosomes, 3 chunks each, one sample
            assert_eq!(keys.len(), 9);
            assert_eq!(keys, expected);
            assert_eq!(*collector.partitions.lock(), 3);
        }
        Ok(())
    }

    #[test]
    fn test_family_partitions() -> super::Result<()> {
        let collector = Collector::default();
        process_partitions(
            partition_by_chromosome(records()),
            || FamilyIndexer::new(vec![Trio::new(Some(1), Some(2), 3)], 10_000),
            collector.clone(),
            2,
        )?;
        let entries = collector.outputs.lock();
        assert_eq!(entries.len(), 9);
        // de novo on the autosomes, no haploid calls on X so the autosomal rule applies
        assert!(entries
            .iter()
            .all(|e: &FamilyIndexEntry| e.mendelian_errors.iter().all(|r| r.code == 2)));
        assert_eq!(
            entries.iter().map(|e| e.mendelian_errors.len()).sum::<usize>(),
            60
        );
        Ok(())
    }

    /// Records rows and counts flushes
    #[derive(Default)]
    struct CountingSink {
        rows: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl IndexSink for CountingSink {
        fn write(&mut self, put: IndexPut) -> Result<()> {
            self.rows.push(put.row_key());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_index_into_sink() -> super::Result<()> {
        let records = partition_by_chromosome(records()).remove(0);

        let mut sink = CountingSink::default();
        let mut indexer = SampleIndexer::new(&config())?;
        let written = indexer.index_into(&records, &mut sink)?;
        assert_eq!(written, 3);
        assert_eq!(sink.rows.len(), 3);
        assert_eq!(sink.flushes, 1);

        let mut rows: Vec<IndexPut> = Vec::new();
        let mut families = FamilyIndexer::new(vec![Trio::new(Some(1), Some(2), 3)], 10_000)?;
        families.index_into(&records, Box::new(&mut rows))?;
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|put| put.key().id == 3 && put.get("_ME").is_some()));
        assert_eq!(
            rows.iter().map(IndexPut::row_key).collect::<Vec<_>>(),
            sink.rows
        );
        Ok(())
    }

    #[test]
    fn test_pipeline_errors_propagate() {
        let mut unordered = records();
        unordered.swap(0, 3);
        let result = process_partitions(
            partition_by_chromosome(unordered),
            || SampleIndexer::new(&config()),
            Collector::default(),
            2,
        );
        assert!(result.is_err());
    }
}
