//! Ingest Pipeline.
//!
//! `drain` repeatedly pulls batches from a cursor and writes each
//! non-empty batch with the caller-supplied `writer`, stopping once the
//! cursor reports completion. `partition_time_range` splits a time window
//! into contiguous sub-ranges so the Sync Controller can fan a drain out
//! across several workers, each owning an isolated connection.

use crate::error::Result;
use crate::source::BatchCursor;
use crate::sink::UpsertStats;
use futures::future::BoxFuture;

/// Drains `cursor` to completion, calling `writer` on every non-empty
/// batch and accumulating its stats.
pub async fn drain<C, W>(cursor: &mut C, mut writer: W) -> Result<UpsertStats>
where
    C: BatchCursor,
    W: FnMut(Vec<C::Item>) -> BoxFuture<'static, Result<UpsertStats>>,
{
    let mut stats = UpsertStats::default();
    loop {
        let batch = cursor.next_batch().await?;
        if batch.is_empty() {
            break;
        }
        stats += writer(batch).await?;
        if cursor.is_complete() {
            break;
        }
    }
    Ok(stats)
}

/// Splits `[min_time, max_time)` into `worker_count` contiguous,
/// non-overlapping sub-ranges. The last range absorbs
/// any remainder so the partition always covers the full window exactly
/// once.
pub fn partition_time_range(min_time: i64, max_time: i64, worker_count: i64) -> Vec<(i64, i64)> {
    if worker_count <= 1 || max_time <= min_time {
        return vec![(min_time, max_time)];
    }

    let span = max_time - min_time;
    let chunk = span / worker_count;
    let mut ranges = Vec::with_capacity(worker_count as usize);
    let mut start = min_time;
    for i in 0..worker_count {
        let end = if i == worker_count - 1 {
            max_time
        } else {
            start + chunk
        };
        ranges.push((start, end));
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_the_full_range_exactly_once() {
        let ranges = partition_time_range(0, 100, 4);
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges.last().unwrap().1, 100);
        for window in ranges.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
    }

    #[test]
    fn single_worker_gets_the_whole_range() {
        assert_eq!(partition_time_range(10, 20, 1), vec![(10, 20)]);
    }

    #[test]
    fn empty_range_yields_a_single_empty_partition() {
        assert_eq!(partition_time_range(10, 10, 4), vec![(10, 10)]);
    }
}
