//! Read-only derivations over table contents. Nothing here mutates a store;
//! every value is recomputed from scratch.

use crate::{
    broadcast::Subscription,
    model::{
        Application, ApplicationStatus, Job, JobStatus, Role, TableName, Tables, Timesheet,
        TimesheetStatus, User,
    },
    store::Store,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt::Debug,
    sync::{Arc, Mutex, Weak},
};
use tracing::trace;

/// Hourly rate used for earnings estimates when none is configured.
pub const DEFAULT_HOURLY_RATE: f64 = 15.0;

pub fn active_jobs(jobs: &[Job]) -> usize {
    jobs.iter().filter(|j| j.status == JobStatus::Active).count()
}

pub fn application_count(applications: &[Application]) -> usize {
    applications.len()
}

/// Number of distinct non-empty student ids, zero for an empty table.
pub fn distinct_students(applications: &[Application]) -> usize {
    applications
        .iter()
        .map(|a| a.student_id.as_str())
        .filter(|id| !id.is_empty())
        .unique()
        .count()
}

pub fn total_hours(timesheets: &[Timesheet]) -> f64 {
    timesheets.iter().map(|t| t.hours).sum()
}

pub fn hours_with_status(timesheets: &[Timesheet], status: TimesheetStatus) -> f64 {
    timesheets
        .iter()
        .filter(|t| t.status == status)
        .map(|t| t.hours)
        .sum()
}

pub fn estimated_earnings(hours: f64, rate: f64) -> f64 {
    hours * rate
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected
    }
}

pub fn application_status_counts(applications: &[Application]) -> StatusCounts {
    applications
        .iter()
        .fold(StatusCounts::default(), |mut acc, a| {
            match a.status {
                ApplicationStatus::Pending => acc.pending += 1,
                ApplicationStatus::Approved => acc.approved += 1,
                ApplicationStatus::Rejected => acc.rejected += 1,
            }
            acc
        })
}

pub fn timesheet_status_counts(timesheets: &[Timesheet]) -> StatusCounts {
    timesheets.iter().fold(StatusCounts::default(), |mut acc, t| {
        match t.status {
            TimesheetStatus::Pending => acc.pending += 1,
            TimesheetStatus::Approved => acc.approved += 1,
            TimesheetStatus::Rejected => acc.rejected += 1,
        }
        acc
    })
}

/// A record that can be found by free-text search and filtered by status.
pub trait Searchable {
    type Status: PartialEq + Copy;

    fn status(&self) -> Self::Status;

    /// Display fields the query is matched against.
    fn search_fields(&self) -> Vec<Cow<'_, str>>;

    fn search_text(&self) -> String {
        self.search_fields().join(" ").to_lowercase()
    }
}

impl Searchable for Job {
    type Status = JobStatus;

    fn status(&self) -> JobStatus {
        self.status
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![self.title.as_str().into(), self.dept.as_str().into()]
    }
}

impl Searchable for Application {
    type Status = ApplicationStatus;

    fn status(&self) -> ApplicationStatus {
        self.status
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![self.student_name.as_str().into(), self.job_title.as_str().into()]
    }
}

impl Searchable for Timesheet {
    type Status = TimesheetStatus;

    fn status(&self) -> TimesheetStatus {
        self.status
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            self.job_title.as_str().into(),
            self.date.to_string().into(),
            self.description.as_str().into(),
            self.feedback.as_str().into(),
        ]
    }
}

impl Searchable for User {
    type Status = Role;

    fn status(&self) -> Role {
        self.role
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![self.name.as_str().into(), self.email.as_str().into()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter<S> {
    All,
    Only(S),
}

impl<S: PartialEq> StatusFilter<S> {
    pub fn matches(&self, status: &S) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => s == status,
        }
    }
}

impl<S> From<Option<S>> for StatusFilter<S> {
    fn from(status: Option<S>) -> Self {
        status.map_or(StatusFilter::All, StatusFilter::Only)
    }
}

/// Records whose display fields contain `query` (case-insensitive, surrounding
/// whitespace ignored) and whose status passes `filter`, in table order.
pub fn search<T: Searchable + Clone>(
    records: &[T],
    query: &str,
    filter: StatusFilter<T::Status>,
) -> Vec<T> {
    let query = query.trim().to_lowercase();
    records
        .iter()
        .filter(|r| filter.matches(&r.status()))
        .filter(|r| query.is_empty() || r.search_text().contains(&query))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentStats {
    pub submitted: usize,
    pub active_positions: usize,
    pub hours_worked: f64,
    pub approved_hours: f64,
    pub pending_hours: f64,
    pub earnings: f64,
}

impl StudentStats {
    pub const TABLES: [TableName; 3] = [
        TableName::Jobs,
        TableName::Applications,
        TableName::Timesheets,
    ];

    pub fn compute(tables: &Tables, student_id: &str, rate: f64) -> Self {
        let applications: Vec<Application> = tables
            .applications
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        let timesheets: Vec<Timesheet> = tables
            .timesheets
            .iter()
            .filter(|t| t.student_id == student_id)
            .cloned()
            .collect();
        let hours_worked = total_hours(&timesheets);
        Self {
            submitted: application_count(&applications),
            active_positions: active_jobs(&tables.jobs),
            hours_worked,
            approved_hours: hours_with_status(&timesheets, TimesheetStatus::Approved),
            pending_hours: hours_with_status(&timesheets, TimesheetStatus::Pending),
            earnings: estimated_earnings(hours_worked, rate),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub active_jobs: usize,
    pub total_applications: usize,
    pub active_students: usize,
    pub hours_tracked: f64,
    pub applications: StatusCounts,
    pub timesheets: StatusCounts,
}

impl AdminStats {
    pub const TABLES: [TableName; 3] = StudentStats::TABLES;

    pub fn compute(tables: &Tables) -> Self {
        Self {
            active_jobs: active_jobs(&tables.jobs),
            total_applications: application_count(&tables.applications),
            active_students: distinct_students(&tables.applications),
            hours_tracked: total_hours(&tables.timesheets),
            applications: application_status_counts(&tables.applications),
            timesheets: timesheet_status_counts(&tables.timesheets),
        }
    }
}

/// A projection kept current by the change hub. It is computed once on
/// construction and again, from the latest durable state, every time one of
/// its tables changes in any context sharing the hub. Dropping it unsubscribes.
pub struct LiveProjection<P> {
    value: Arc<Mutex<P>>,
    subscription: Subscription,
}

impl<P> LiveProjection<P>
where
    P: Clone + Debug + Send + 'static,
{
    pub fn new<F>(store: &Arc<Store>, tables: &[TableName], compute: F) -> Self
    where
        F: Fn(&Tables) -> P + Send + Sync + 'static,
    {
        let value = Arc::new(Mutex::new(compute(&store.durable_snapshot())));
        let subscription = {
            let value = value.clone();
            let weak: Weak<Store> = Arc::downgrade(store);
            store.hub().subscribe(tables, move |change| {
                // the hub must not keep the store alive
                let Some(store) = weak.upgrade() else {
                    return;
                };
                let next = compute(&store.durable_snapshot());
                trace!(?change, value = ?next, "Recomputed projection");
                *value.lock().unwrap_or_else(|e| e.into_inner()) = next;
            })
        };
        Self {
            value,
            subscription,
        }
    }

    pub fn current(&self) -> P {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn close(&self) -> bool {
        self.subscription.unsubscribe()
    }
}

impl<P> Drop for LiveProjection<P> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
