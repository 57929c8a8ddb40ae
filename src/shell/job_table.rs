use std::fmt;
use std::process::ExitStatus;

use nix::unistd::Pid;

use crate::core::job::{Job, JobId};

/// Every job the shell has launched, in creation order.
///
/// Entries are never removed: completed jobs stay behind so `wait` can ask
/// whether everything ever started has finished.
#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    job_count: u32,
}

impl JobTable {
    pub fn next_job_id(&mut self) -> JobId {
        self.job_count += 1;
        JobId(self.job_count)
    }

    /// Appends `job`; existing entries keep their order.
    pub fn register(&mut self, job: Job) -> JobId {
        let job_id = job.id();
        debug!("registering job [{}]: {}", job_id, job.input());
        self.jobs.push(job);
        job_id
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Finds the unfinished job with process `pid`. Completed jobs are
    /// skipped, since the kernel may hand their pids out again.
    pub fn find_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|job| !job.is_completed() && job.process_id() == Some(pid))
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|job| !job.is_completed() && job.process_id() == Some(pid))
    }

    pub fn find_by_id(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == job_id)
    }

    pub fn find_by_id_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id() == job_id)
    }

    /// Returns `true` if every job ever registered has completed.
    pub fn all_completed(&self) -> bool {
        self.jobs.iter().all(Job::is_completed)
    }

    /// Returns `false` if no unfinished job has process `pid`.
    pub fn mark_completed(&mut self, pid: Pid, exit_status: ExitStatus) -> bool {
        self.update(pid, |job| job.mark_completed(exit_status))
    }

    /// Returns `false` if no unfinished job has process `pid`.
    pub fn mark_stopped(&mut self, pid: Pid) -> bool {
        self.update(pid, Job::mark_stopped)
    }

    /// Returns `false` if no unfinished job has process `pid`.
    pub fn mark_running(&mut self, pid: Pid) -> bool {
        self.update(pid, Job::mark_running)
    }

    /// Jobs that have not completed yet, oldest first.
    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|job| !job.is_completed())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.iter_mut()
    }

    fn update<F>(&mut self, pid: Pid, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        match self.find_by_pid_mut(pid) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} jobs\tjob_count: {}", self.jobs.len(), self.job_count)?;
        for job in &self.jobs {
            writeln!(f, "{}", job)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::core::parser::Command;
    use crate::util::PshExitStatusExt;

    fn add_job(table: &mut JobTable, pid: Option<i32>) -> JobId {
        let command = Command::new("prog", vec!["prog".to_string()]).unwrap();
        let mut job = Job::new(table.next_job_id(), command, PathBuf::from("/bin/prog"));
        if let Some(pid) = pid {
            job.set_process_id(Pid::from_raw(pid));
        }
        table.register(job)
    }

    #[test]
    fn test_register_keeps_creation_order() {
        let mut table = JobTable::default();
        assert!(table.is_empty());
        let ids: Vec<JobId> = (100..103).map(|pid| add_job(&mut table, Some(pid))).collect();
        assert_eq!(ids, vec![JobId(1), JobId(2), JobId(3)]);
        assert_eq!(table.len(), 3);

        let order: Vec<JobId> = table.active_jobs().map(Job::id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn test_find_by_pid() {
        let mut table = JobTable::default();
        add_job(&mut table, Some(100));
        add_job(&mut table, Some(200));

        assert_eq!(table.find_by_pid(Pid::from_raw(200)).map(Job::id), Some(JobId(2)));
        // the last entry is checked like any other
        assert!(table.find_by_pid(Pid::from_raw(999_999)).is_none());
        assert!(table.find_by_pid(Pid::from_raw(-1)).is_none());
    }

    #[test]
    fn test_mark_completed_reports_unknown_pid() {
        let mut table = JobTable::default();
        add_job(&mut table, Some(100));

        assert!(!table.mark_completed(Pid::from_raw(999_999), ExitStatus::from_success()));
        assert!(!table.all_completed());
        assert!(table.mark_completed(Pid::from_raw(100), ExitStatus::from_success()));
        assert!(table.all_completed());
    }

    #[test]
    fn test_all_completed_is_idempotent() {
        let mut table = JobTable::default();
        assert!(table.all_completed());

        add_job(&mut table, Some(100));
        add_job(&mut table, Some(200));
        table.mark_completed(Pid::from_raw(100), ExitStatus::from_success());
        assert!(!table.all_completed());
        table.mark_completed(Pid::from_raw(200), ExitStatus::from_failure());

        for _ in 0..5 {
            assert!(table.all_completed());
            table.mark_running(Pid::from_raw(200));
            table.mark_stopped(Pid::from_raw(100));
        }
        assert_eq!(table.active_jobs().count(), 0);
    }

    #[test]
    fn test_stop_and_continue() {
        let mut table = JobTable::default();
        add_job(&mut table, Some(100));

        assert!(table.mark_stopped(Pid::from_raw(100)));
        assert!(table.find_by_pid(Pid::from_raw(100)).unwrap().is_stopped());
        assert!(table.mark_running(Pid::from_raw(100)));
        assert!(!table.find_by_pid(Pid::from_raw(100)).unwrap().is_stopped());
    }

    #[test]
    fn test_reused_pid_resolves_to_unfinished_job() {
        let mut table = JobTable::default();
        let old = add_job(&mut table, Some(100));
        assert!(table.mark_completed(Pid::from_raw(100), ExitStatus::from_success()));
        let new = add_job(&mut table, Some(100));

        assert_eq!(table.find_by_pid(Pid::from_raw(100)).map(Job::id), Some(new));
        assert!(table.mark_stopped(Pid::from_raw(100)));
        assert!(table.find_by_id(new).unwrap().is_stopped());

        assert!(table.mark_completed(Pid::from_raw(100), ExitStatus::from_failure()));
        assert!(table.all_completed());
        assert!(table.find_by_id(old).unwrap().is_completed());
        assert!(table.find_by_pid(Pid::from_raw(100)).is_none());
    }
}
