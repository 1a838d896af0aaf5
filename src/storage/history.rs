//! Scored Reading History
//!
//! Bounded in-memory buffer of `SensorRecord`s. Ids are assigned on insert
//! and increase monotonically from 1; when the buffer is full the oldest
//! inserted record is evicted. Queries order by `created_at` (node time),
//! which need not match insertion order.

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, FixedOffset};

use crate::types::{RiskEvaluation, RiskLevel, SensorReading, SensorRecord};

/// Which records a history query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Every retained record
    All,
    /// `created_at >= now - minutes`
    Window { minutes: u32 },
    /// `start <= created_at <= end`
    Range {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

impl HistoryQuery {
    /// Build from the optional HTTP parameters.
    ///
    /// A positive `minutes` wins; otherwise `start` and `end` are used only
    /// when both are present; anything else selects everything.
    pub fn from_params(
        minutes: Option<u32>,
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> Self {
        match (minutes, start, end) {
            (Some(m), _, _) if m > 0 => Self::Window { minutes: m },
            (_, Some(start), Some(end)) => Self::Range { start, end },
            _ => Self::All,
        }
    }

    fn matches(&self, created_at: &DateTime<FixedOffset>, now: &DateTime<FixedOffset>) -> bool {
        match self {
            Self::All => true,
            Self::Window { minutes } => {
                *created_at >= *now - Duration::minutes(i64::from(*minutes))
            }
            Self::Range { start, end } => start <= created_at && created_at <= end,
        }
    }
}

/// Result of [`ReadingHistory::insert`].
#[derive(Debug, Clone)]
pub struct Inserted {
    /// The stored record with its assigned id
    pub record: SensorRecord,
    /// Level of the record inserted just before this one, read under the same lock
    pub previous_level: Option<RiskLevel>,
}

#[derive(Debug)]
struct HistoryInner {
    records: VecDeque<SensorRecord>,
    next_id: u64,
}

/// Thread-safe bounded history.
#[derive(Debug)]
pub struct ReadingHistory {
    capacity: usize,
    inner: RwLock<HistoryInner>,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(HistoryInner {
                records: VecDeque::with_capacity(capacity.min(4096)),
                next_id: 1,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HistoryInner> {
        self.inner.read().unwrap_or_else(|e| {
            tracing::warn!("History RwLock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryInner> {
        self.inner.write().unwrap_or_else(|e| {
            tracing::warn!("History RwLock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Store a scored reading. Returns the record with its assigned id and
    /// the level of the previously inserted record.
    pub fn insert(&self, reading: &SensorReading, evaluation: &RiskEvaluation) -> Inserted {
        let mut inner = self.write();
        let previous_level = inner.records.back().map(|r| r.risk_level);
        let record = SensorRecord::new(inner.next_id, reading, evaluation);
        inner.next_id += 1;
        if inner.records.len() >= self.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(record.clone());
        Inserted {
            record,
            previous_level,
        }
    }

    /// Most recently inserted record.
    pub fn latest(&self) -> Option<SensorRecord> {
        self.read().records.back().cloned()
    }

    /// Matching records, newest `created_at` first (ties: higher id first),
    /// at most `limit` of them.
    pub fn query(
        &self,
        query: &HistoryQuery,
        now: DateTime<FixedOffset>,
        limit: usize,
    ) -> Vec<SensorRecord> {
        let mut selected: Vec<SensorRecord> = self
            .read()
            .records
            .iter()
            .filter(|r| query.matches(&r.created_at, &now))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        selected.truncate(limit);
        selected
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskScorer;
    use chrono::TimeZone;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2025, 11, 3, h, m, 0).unwrap()
    }

    fn reading(created_at: DateTime<FixedOffset>, moisture: f64) -> SensorReading {
        SensorReading {
            moisture,
            accel_x: 0.0,
            accel_y: 0.0,
            accel_z: 9.8,
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: 0.0,
            vibration_raw: 0.2,
            created_at,
        }
    }

    fn insert(history: &ReadingHistory, created_at: DateTime<FixedOffset>) -> SensorRecord {
        let r = reading(created_at, 900.0);
        let eval = RiskScorer::default().evaluate(&r).unwrap();
        history.insert(&r, &eval).record
    }

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let history = ReadingHistory::new(10);
        assert_eq!(insert(&history, at(10, 0)).id, 1);
        assert_eq!(insert(&history, at(10, 1)).id, 2);
        assert_eq!(history.latest().map(|r| r.id), Some(2));
    }

    #[test]
    fn test_insert_reports_previous_level() {
        let history = ReadingHistory::new(10);
        let quiet = reading(at(10, 0), 900.0);
        let dry = reading(at(10, 1), 700.0);
        let scorer = RiskScorer::default();

        let first = history.insert(&quiet, &scorer.evaluate(&quiet).unwrap());
        assert_eq!(first.previous_level, None);
        let second = history.insert(&dry, &scorer.evaluate(&dry).unwrap());
        assert_eq!(second.previous_level, Some(RiskLevel::Normal));
        assert_eq!(second.record.id, 2);
    }

    #[test]
    fn test_previous_level_is_consistent_under_concurrent_inserts() {
        let history = std::sync::Arc::new(ReadingHistory::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let history = std::sync::Arc::clone(&history);
                std::thread::spawn(move || {
                    let scorer = RiskScorer::default();
                    (0..50)
                        .map(|i| {
                            // Odd threads post dry readings, even threads quiet ones
                            let moisture = if t % 2 == 0 { 900.0 } else { 700.0 };
                            let r = reading(at(10, i % 60), moisture);
                            let inserted = history.insert(&r, &scorer.evaluate(&r).unwrap());
                            (inserted.record.id, inserted.previous_level)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut outcomes: Vec<(u64, Option<RiskLevel>)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        outcomes.sort_by_key(|(id, _)| *id);

        let stored: std::collections::HashMap<u64, RiskLevel> = history
            .query(&HistoryQuery::All, at(12, 0), 1000)
            .into_iter()
            .map(|r| (r.id, r.risk_level))
            .collect();
        for (id, previous) in outcomes {
            assert_eq!(previous, id.checked_sub(1).and_then(|p| stored.get(&p).copied()));
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let history = ReadingHistory::new(3);
        for m in 0..5 {
            insert(&history, at(10, m));
        }
        assert_eq!(history.len(), 3);
        let ids: Vec<u64> = history
            .query(&HistoryQuery::All, at(11, 0), 10)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_latest_is_last_inserted_not_newest_timestamp() {
        let history = ReadingHistory::new(10);
        insert(&history, at(12, 0));
        insert(&history, at(9, 0));
        assert_eq!(history.latest().map(|r| r.id), Some(2));
    }

    #[test]
    fn test_query_orders_by_created_at_desc() {
        let history = ReadingHistory::new(10);
        insert(&history, at(10, 5));
        insert(&history, at(10, 1));
        insert(&history, at(10, 9));
        let times: Vec<_> = history
            .query(&HistoryQuery::All, at(11, 0), 10)
            .iter()
            .map(|r| r.created_at)
            .collect();
        assert_eq!(times, vec![at(10, 9), at(10, 5), at(10, 1)]);
    }

    #[test]
    fn test_window_and_limit() {
        let history = ReadingHistory::new(100);
        for m in 0..30 {
            insert(&history, at(10, m));
        }
        let now = at(10, 29);
        let recent = history.query(&HistoryQuery::Window { minutes: 10 }, now, 100);
        assert_eq!(recent.len(), 11); // 10:19 ..= 10:29
        let limited = history.query(&HistoryQuery::Window { minutes: 10 }, now, 3);
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].created_at, at(10, 29));
    }

    #[test]
    fn test_range_is_inclusive() {
        let history = ReadingHistory::new(100);
        for m in 0..10 {
            insert(&history, at(10, m));
        }
        let q = HistoryQuery::Range {
            start: at(10, 2),
            end: at(10, 4),
        };
        assert_eq!(history.query(&q, at(12, 0), 100).len(), 3);
    }

    #[test]
    fn test_query_from_params_precedence() {
        assert_eq!(
            HistoryQuery::from_params(Some(5), Some(at(1, 0)), Some(at(2, 0))),
            HistoryQuery::Window { minutes: 5 }
        );
        assert_eq!(
            HistoryQuery::from_params(Some(0), Some(at(1, 0)), Some(at(2, 0))),
            HistoryQuery::Range {
                start: at(1, 0),
                end: at(2, 0)
            }
        );
        assert_eq!(HistoryQuery::from_params(None, Some(at(1, 0)), None), HistoryQuery::All);
    }
}
