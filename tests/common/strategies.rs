use proptest::prelude::*;
use uuid::Uuid;

use tasker_batch::state_machine::BatchEvent;

/// A job outcome reported by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Success,
    Failure,
}

pub fn report_strategy() -> impl Strategy<Value = Report> {
    prop_oneof![3 => Just(Report::Success), 1 => Just(Report::Failure)]
}

/// A batch size and one report per job, in arbitrary order
pub fn reports_strategy() -> impl Strategy<Value = Vec<Report>> {
    prop::collection::vec(report_strategy(), 0..40)
}

/// Arbitrary events, including ones the guards must reject
pub fn event_strategy() -> impl Strategy<Value = BatchEvent> {
    prop_oneof![
        (0i32..5).prop_map(BatchEvent::JobsAdded),
        (0i32..3).prop_map(BatchEvent::JobsReleased),
        Just(BatchEvent::JobSucceeded(Uuid::new_v4())),
        any::<bool>().prop_map(|cancel_batch| BatchEvent::JobFailed {
            job_id: Uuid::new_v4(),
            cancel_batch,
        }),
        Just(BatchEvent::Dispatched),
        Just(BatchEvent::Cancel),
        Just(BatchEvent::FinishIfDrained),
    ]
}
