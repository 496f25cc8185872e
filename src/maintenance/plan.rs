//! Desired vs. observed partitions for one table.

use chrono::{DateTime, Utc};

use crate::{
    catalog::{PartitionRecord, PartitionSet},
    config::{MAX_PREMAKE, TableTarget},
    period::{PartitionBoundary, RetentionWindow},
};

/// What one maintenance pass does to a table, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenancePlan {
    /// Ascending. Applied first.
    pub creations: Vec<PartitionBoundary>,
    /// Ascending. Applied after every creation.
    pub drops: Vec<PartitionRecord>,
    /// Desired boundaries already covered by the live set.
    pub satisfied: Vec<PartitionBoundary>,
    /// Desired boundaries whose name is taken by a partition at a lower
    /// boundary. Never created.
    pub conflicts: Vec<PartitionBoundary>,
}

impl MaintenancePlan {
    pub fn is_noop(&self) -> bool {
        self.creations.is_empty() && self.drops.is_empty()
    }
}

/// Diff the live partitions of `target` against what should exist at `now`.
///
/// Desired: `premake` periods starting with the one containing `now`, reaching
/// back to the highest live boundary when the table has fallen behind. Missed
/// periods that are already past retention are not recreated; the first new
/// partition absorbs them.
/// Expired: every live partition bounded at or below the retention cutoff,
/// never reaching into the current period.
pub fn plan_table(
    target: &TableTarget,
    observed: &PartitionSet,
    now: DateTime<Utc>,
) -> MaintenancePlan {
    let unit = target.period;
    let window = RetentionWindow::new(now, target.retention);
    let current = unit.boundary_containing(now);
    let premake = i32::try_from(target.premake.clamp(1, MAX_PREMAKE)).unwrap_or(i32::MAX);
    let horizon = unit.shift(current.start, premake);
    let highest = observed.highest_boundary();

    let from = match highest {
        Some(highest) if highest < current.start => highest.max(unit.period_start(window.cutoff)),
        _ => current.start,
    };

    let mut plan = MaintenancePlan::default();
    for boundary in unit.series(from, horizon) {
        if highest.is_some_and(|h| boundary.upper <= h) {
            plan.satisfied.push(boundary);
        } else if observed.contains_name(&boundary.name) {
            plan.conflicts.push(boundary);
        } else {
            plan.creations.push(boundary);
        }
    }

    plan.drops = observed
        .iter()
        .filter(|r| window.is_expired(r.upper) && r.upper <= current.start)
        .cloned()
        .collect();

    plan
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::period::{PeriodUnit, RetentionPeriod};

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn target(period: PeriodUnit, retention: RetentionPeriod, premake: u32) -> TableTarget {
        TableTarget {
            name: "history".into(),
            period,
            retention,
            premake,
        }
    }

    fn daily_partitions(from: DateTime<Utc>, until: DateTime<Utc>) -> PartitionSet {
        PartitionSet::new(
            PeriodUnit::Daily
                .series(from, until)
                .into_iter()
                .map(|b| PartitionRecord {
                    name: b.name,
                    upper: b.upper,
                })
                .collect(),
        )
    }

    fn names<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        items.into_iter().collect()
    }

    #[test]
    fn test_creates_premake_periods_from_now() {
        let observed = daily_partitions(day(2025, 1, 8), day(2025, 1, 10));
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(14), 3),
            &observed,
            day(2025, 1, 10),
        );

        assert_eq!(
            names(plan.creations.iter().map(|b| b.name.as_str())),
            ["p2025_01_10", "p2025_01_11", "p2025_01_12"]
        );
        let uppers: Vec<_> = plan.creations.iter().map(|b| b.upper).collect();
        assert_eq!(uppers, [day(2025, 1, 11), day(2025, 1, 12), day(2025, 1, 13)]);
        assert!(plan.drops.is_empty());
        assert!(plan.satisfied.is_empty());
    }

    #[test]
    fn test_drops_everything_at_or_below_cutoff() {
        // Boundaries 2025-01-01 ..= 2025-01-23
        let observed = daily_partitions(day(2024, 12, 31), day(2025, 1, 23));
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(14), 3),
            &observed,
            day(2025, 1, 20),
        );

        let dropped: Vec<_> = plan.drops.iter().map(|r| r.upper).collect();
        assert_eq!(dropped.len(), 6);
        assert_eq!(dropped.first(), Some(&day(2025, 1, 1)));
        assert_eq!(dropped.last(), Some(&day(2025, 1, 6)));
        assert!(plan.creations.is_empty());
        assert_eq!(plan.satisfied.len(), 3);
    }

    #[test]
    fn test_fills_gap_when_behind() {
        // Last partition ends 2025-01-05, now is 2025-01-10.
        let observed = daily_partitions(day(2025, 1, 3), day(2025, 1, 5));
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(30), 2),
            &observed,
            day(2025, 1, 10),
        );

        assert_eq!(plan.creations.first().map(|b| b.name.as_str()), Some("p2025_01_05"));
        assert_eq!(plan.creations.last().map(|b| b.name.as_str()), Some("p2025_01_11"));
        assert_eq!(plan.creations.len(), 7);
        assert!(plan.creations.windows(2).all(|w| w[0].upper == w[1].start));
    }

    #[test]
    fn test_gap_fill_skips_periods_past_retention() {
        // Only partition ends 2025-01-02; a week of retention at 2025-03-01.
        let observed = daily_partitions(day(2025, 1, 1), day(2025, 1, 2));
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(7), 3),
            &observed,
            day(2025, 3, 1),
        );

        let window = RetentionWindow::new(day(2025, 3, 1), RetentionPeriod::days(7));
        assert_eq!(plan.creations.first().map(|b| b.name.as_str()), Some("p2025_02_22"));
        assert_eq!(plan.creations.last().map(|b| b.name.as_str()), Some("p2025_03_03"));
        assert_eq!(plan.creations.len(), 10);
        assert!(plan.creations.iter().all(|b| !window.is_expired(b.upper)));
        assert_eq!(names(plan.drops.iter().map(|r| r.name.as_str())), ["p2025_01_01"]);
    }

    #[rstest]
    #[case::daily(PeriodUnit::Daily)]
    #[case::weekly(PeriodUnit::Weekly)]
    #[case::monthly(PeriodUnit::Monthly)]
    #[case::yearly(PeriodUnit::Yearly)]
    fn test_oversized_premake_is_capped(#[case] unit: PeriodUnit) {
        let plan = plan_table(
            &target(unit, RetentionPeriod::days(14), 1_000_000_000),
            &PartitionSet::default(),
            day(2025, 1, 10),
        );

        assert_eq!(plan.creations.len(), MAX_PREMAKE as usize);
        assert!(plan.creations.windows(2).all(|w| w[0].upper == w[1].start));
    }

    #[test]
    fn test_never_drops_current_or_future_periods() {
        let observed = daily_partitions(day(2025, 1, 1), day(2025, 1, 15));
        // Zero retention puts the cutoff at now.
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(0), 3),
            &observed,
            Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap(),
        );

        assert!(plan.drops.iter().all(|r| r.upper <= day(2025, 1, 10)));
        assert!(!plan.drops.iter().any(|r| r.name == "p2025_01_10"));
        assert_eq!(plan.drops.len(), 9);
    }

    #[test]
    fn test_name_taken_below_highest_boundary_is_a_conflict() {
        let observed = PartitionSet::new(vec![PartitionRecord {
            // Misnamed partition that ends before the current period.
            name: "p2025_01_11".into(),
            upper: day(2025, 1, 10),
        }]);
        let plan = plan_table(
            &target(PeriodUnit::Daily, RetentionPeriod::days(14), 3),
            &observed,
            day(2025, 1, 10),
        );

        assert_eq!(names(plan.conflicts.iter().map(|b| b.name.as_str())), ["p2025_01_11"]);
        assert_eq!(
            names(plan.creations.iter().map(|b| b.name.as_str())),
            ["p2025_01_10", "p2025_01_12"]
        );
    }

    #[test]
    fn test_monthly_plan_is_deterministic() {
        let observed = PartitionSet::new(vec![PartitionRecord {
            name: "p2024_12".into(),
            upper: day(2025, 1, 1),
        }]);
        let target = target(PeriodUnit::Monthly, "1y".parse().unwrap(), 2);
        let first = plan_table(&target, &observed, day(2025, 1, 31));
        let second = plan_table(&target, &observed, day(2025, 1, 31));

        assert_eq!(first, second);
        assert_eq!(
            names(first.creations.iter().map(|b| b.name.as_str())),
            ["p2025_01", "p2025_02"]
        );
    }
}
