mod common;

use chrono::Utc;
use common::strategies::*;
use proptest::prelude::*;
use uuid::Uuid;

use tasker_batch::models::{BatchOptions, BatchRecord};
use tasker_batch::state_machine::BatchEvent;

proptest! {
    /// Property: counters stay consistent under any event sequence, rejected events change nothing
    #[test]
    fn counters_stay_consistent(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut record = BatchRecord::new("prop", BatchOptions::default());
        for event in &events {
            let before = record.clone();
            match record.apply(event, Utc::now()) {
                Ok(_) => {}
                Err(_) => prop_assert_eq!(&record, &before),
            }
            prop_assert!(record.pending_jobs >= 0);
            prop_assert!(record.failed_jobs >= 0);
            prop_assert!(record.pending_jobs <= record.total_jobs);
            prop_assert!(record.failed_jobs <= record.total_jobs);
            prop_assert!(!(record.finished() && record.cancelled()), "finished and cancelled");
            if record.finished() {
                prop_assert_eq!(record.pending_jobs, 0);
            }
            if !record.dispatched() {
                prop_assert!(!record.finished() && !record.cancelled(), "settled before dispatch");
            }
        }
    }

    /// Property: one-shot transitions are observed at most once per batch
    #[test]
    fn transitions_fire_at_most_once(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut record = BatchRecord::new("prop", BatchOptions::default());
        let mut finished = 0;
        let mut cancelled = 0;
        for event in &events {
            if let Ok(transition) = record.apply(event, Utc::now()) {
                finished += usize::from(transition.finished);
                cancelled += usize::from(transition.cancelled);
            }
        }
        prop_assert!(finished <= 1);
        prop_assert!(cancelled <= 1);
        prop_assert_eq!(finished == 1, record.finished());
        prop_assert_eq!(cancelled == 1, record.cancelled());
    }

    /// Property: reporting every job of a batch drains it exactly once, in any order,
    /// whether the reports land before or after the dispatch closes
    #[test]
    fn reporting_every_job_drains_once(
        reports in reports_strategy(),
        allow_failures in any::<bool>(),
        dispatch_point in any::<prop::sample::Index>(),
    ) {
        let mut record = BatchRecord::new("prop", BatchOptions { allow_failures, ..Default::default() });
        let count = i32::try_from(reports.len()).unwrap();
        record.apply(&BatchEvent::JobsAdded(count), Utc::now()).unwrap();
        let dispatch_at = dispatch_point.index(reports.len() + 1);

        let mut drained = 0;
        let mut fired_before_dispatch = false;
        for (i, report) in reports.iter().enumerate() {
            if i == dispatch_at {
                drained += usize::from(record.apply(&BatchEvent::Dispatched, Utc::now()).unwrap().drained);
            }
            let event = match report {
                Report::Success => BatchEvent::JobSucceeded(Uuid::new_v4()),
                Report::Failure => BatchEvent::JobFailed { job_id: Uuid::new_v4(), cancel_batch: !allow_failures },
            };
            let transition = record.apply(&event, Utc::now()).unwrap();
            if i < dispatch_at {
                fired_before_dispatch |= transition.drained || transition.finished || transition.cancelled;
            }
            drained += usize::from(transition.drained);
        }
        if dispatch_at == reports.len() {
            drained += usize::from(record.apply(&BatchEvent::Dispatched, Utc::now()).unwrap().drained);
        }

        let failures = reports.iter().filter(|r| **r == Report::Failure).count();
        prop_assert!(!fired_before_dispatch);
        prop_assert_eq!(record.pending_jobs, 0);
        prop_assert_eq!(record.failed_jobs as usize, failures);
        prop_assert_eq!(record.failed_job_ids.len(), failures);
        prop_assert_eq!(drained, 1);
        prop_assert_eq!(record.cancelled(), failures > 0 && !allow_failures);
        prop_assert_eq!(record.finished(), !record.cancelled());
        prop_assert_eq!(record.progress(), if reports.is_empty() { 0 } else { 100 });
    }
}
