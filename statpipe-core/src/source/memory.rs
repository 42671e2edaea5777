use super::{RecordIter, RecordSource};
use statpipe_common::{Record, Result};

/// In-memory snapshot of a key/value store. This is the adapter a host
/// program uses after pulling a remote cache's entries into process memory;
/// it is also the workhorse for tests.
#[derive(Debug, Clone)]
pub struct MemorySource {
    records: Vec<Record>,
    partition_count: usize,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        MemorySource {
            records,
            partition_count: 1,
        }
    }

    /// Request that `partitions()` split the snapshot into up to `n` chunks.
    pub fn with_partitions(mut self, n: usize) -> Self {
        self.partition_count = n.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemorySource {
    fn fetch_all(&self) -> Result<RecordIter> {
        // records are cloned out so downstream stages never alias the snapshot
        let records = self.records.clone();
        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn partition_hint(&self) -> usize {
        self.partition_count
    }

    fn partitions(&self) -> Result<Vec<RecordIter>> {
        if self.partition_count <= 1 || self.records.len() <= 1 {
            return Ok(vec![self.fetch_all()?]);
        }
        let chunk = self.records.len().div_ceil(self.partition_count);
        let iters = self
            .records
            .chunks(chunk)
            .map(|c| {
                let part: Vec<Record> = c.to_vec();
                Box::new(part.into_iter().map(Ok)) as RecordIter
            })
            .collect();
        Ok(iters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cities() -> Vec<Record> {
        vec![
            Record::new(1, 21.0, "London"),
            Record::new(2, 34.0, "Rome"),
            Record::new(3, 33.0, "Barcelona"),
            Record::new(4, 8.0, "Oslo"),
        ]
    }

    #[test]
    fn fetch_all_yields_every_record() {
        let src = MemorySource::new(cities());
        let got: Vec<Record> = src.fetch_all().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(got.len(), 4);
        assert_eq!(got[0].value.label, "London");
    }

    #[test]
    fn partitions_cover_all_records() {
        let src = MemorySource::new(cities()).with_partitions(3);
        let parts = src.partitions().unwrap();
        assert!(parts.len() > 1);
        let total: usize = parts.into_iter().map(|p| p.count()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn single_partition_by_default() {
        let src = MemorySource::new(cities());
        assert_eq!(src.partition_hint(), 1);
        assert_eq!(src.partitions().unwrap().len(), 1);
    }
}
