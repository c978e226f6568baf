use jobmesh_domain::JobResult;
use metrics::counter;

pub const JOBS_ENQUEUED: &str = "jobmesh_jobs_enqueued_total";
pub const JOBS_ASSIGNED: &str = "jobmesh_jobs_assigned_total";
pub const JOBS_REQUEUED: &str = "jobmesh_jobs_requeued_total";
pub const JOBS_REMOVED_BAD_REQUEST: &str = "jobmesh_jobs_removed_bad_request_total";
pub const DISPATCH_FAILURES: &str = "jobmesh_dispatch_failures_total";
pub const JOBS_FINISHED: &str = "jobmesh_jobs_finished_total";

pub fn record_finished(result: JobResult) {
    counter!(JOBS_FINISHED, "result" => result.as_str()).increment(1);
}

pub fn increment(name: &'static str, value: u64) {
    counter!(name).increment(value);
}
