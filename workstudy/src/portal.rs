use crate::{
    model::{
        Application, ApplicationStatus, Job, JobStatus, Record, Role, TableName, Timesheet,
        TimesheetStatus, User,
    },
    store::Store,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortalError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("no {table} record with id {id}")]
    NotFound { table: TableName, id: String },
    #[error("email {0} is already registered")]
    DuplicateEmail(String),
}

/// Collects every blank field instead of stopping at the first one.
fn require(fields: &[(&'static str, &str)]) -> Result<(), PortalError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PortalError::MissingFields(missing))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), PortalError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PortalError::Invalid {
            field,
            reason: format!("{} must be a non-negative number", value),
        })
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn find_mut<'a, T: Record>(records: &'a mut [T], id: &str) -> Result<&'a mut T, PortalError> {
    records
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or_else(|| PortalError::NotFound {
            table: T::TABLE,
            id: id.to_string(),
        })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub stipend: f64,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub title: Option<String>,
    pub dept: Option<String>,
    pub stipend: Option<f64>,
    pub hours: Option<u32>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewApplication {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "studentName", default)]
    pub student_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTimesheet {
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub job_title: String,
    pub date: Option<NaiveDate>,
    pub hours: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Job-portal operations over a [`Store`]. Each one validates its input,
/// then rewrites the affected table as a whole.
#[derive(Clone)]
pub struct Portal {
    store: Arc<Store>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl Portal {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, local_today)
    }

    pub fn with_clock(store: Arc<Store>, today: fn() -> NaiveDate) -> Self {
        Self { store, today }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.store.get()
    }

    pub fn applications(&self) -> Vec<Application> {
        self.store.get()
    }

    pub fn timesheets(&self) -> Vec<Timesheet> {
        self.store.get()
    }

    pub fn users(&self) -> Vec<User> {
        self.store.get()
    }

    pub fn post_job(&self, new: NewJob) -> Result<Job, PortalError> {
        require(&[("title", new.title.as_str()), ("dept", new.dept.as_str())])?;
        non_negative("stipend", new.stipend)?;
        let job = Job {
            id: new_id(),
            title: new.title.trim().to_string(),
            dept: new.dept.trim().to_string(),
            stipend: new.stipend,
            hours: new.hours,
            status: new.status.unwrap_or(JobStatus::Active),
            posted_at: (self.today)(),
        };
        self.store.update(|jobs: &mut Vec<Job>| jobs.insert(0, job.clone()));
        info!(id = %job.id, title = %job.title, "Posted job");
        Ok(job)
    }

    pub fn edit_job(&self, id: &str, patch: JobPatch) -> Result<Job, PortalError> {
        if let Some(title) = &patch.title {
            require(&[("title", title.as_str())])?;
        }
        if let Some(dept) = &patch.dept {
            require(&[("dept", dept.as_str())])?;
        }
        if let Some(stipend) = patch.stipend {
            non_negative("stipend", stipend)?;
        }
        self.store.try_update(|jobs: &mut Vec<Job>| {
            let job = find_mut(jobs, id)?;
            if let Some(title) = patch.title {
                job.title = title.trim().to_string();
            }
            if let Some(dept) = patch.dept {
                job.dept = dept.trim().to_string();
            }
            if let Some(stipend) = patch.stipend {
                job.stipend = stipend;
            }
            if let Some(hours) = patch.hours {
                job.hours = hours;
            }
            if let Some(status) = patch.status {
                job.status = status;
            }
            Ok(job.clone())
        })
    }

    /// Removes the job if present. Applications and timesheets that point at
    /// it are left alone and keep their copied titles.
    pub fn delete_job(&self, id: &str) -> bool {
        let removed = self.store.update(|jobs: &mut Vec<Job>| {
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            jobs.len() != before
        });
        info!(id, removed, "Deleted job");
        removed
    }

    pub fn apply(&self, new: NewApplication) -> Result<Application, PortalError> {
        require(&[
            ("jobId", new.job_id.as_str()),
            ("studentId", new.student_id.as_str()),
        ])?;
        let job_title = self
            .store
            .get::<Job>()
            .into_iter()
            .find(|j| j.id == new.job_id)
            .map(|j| j.title)
            .unwrap_or_else(|| "(unknown)".to_string());
        let application = Application {
            id: new_id(),
            job_id: new.job_id,
            job_title,
            student_id: new.student_id,
            student_name: new
                .student_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Student".to_string()),
            applied_at: (self.today)(),
            status: ApplicationStatus::Pending,
        };
        self.store
            .update(|apps: &mut Vec<Application>| apps.insert(0, application.clone()));
        info!(id = %application.id, job = %application.job_id, "Application submitted");
        Ok(application)
    }

    pub fn set_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<Application, PortalError> {
        self.store.try_update(|apps: &mut Vec<Application>| {
            let app = find_mut(apps, id)?;
            app.status = status;
            Ok(app.clone())
        })
    }

    pub fn submit_timesheet(&self, new: NewTimesheet) -> Result<Timesheet, PortalError> {
        let mut missing = Vec::new();
        if new.student_id.trim().is_empty() {
            missing.push("studentId");
        }
        if new.job_title.trim().is_empty() {
            missing.push("job_title");
        }
        if new.date.is_none() {
            missing.push("date");
        }
        if new.hours == 0.0 {
            missing.push("hours");
        }
        let Some(date) = new.date.filter(|_| missing.is_empty()) else {
            return Err(PortalError::MissingFields(missing));
        };
        non_negative("hours", new.hours)?;
        let timesheet = Timesheet {
            id: new_id(),
            job_id: new.job_id.filter(|id| !id.is_empty()),
            student_id: new.student_id,
            job_title: new.job_title,
            date,
            hours: new.hours,
            description: new.description,
            status: TimesheetStatus::Pending,
            feedback: String::new(),
        };
        self.store
            .update(|sheets: &mut Vec<Timesheet>| sheets.insert(0, timesheet.clone()));
        info!(id = %timesheet.id, hours = timesheet.hours, "Timesheet submitted");
        Ok(timesheet)
    }

    pub fn review_timesheet(
        &self,
        id: &str,
        status: TimesheetStatus,
        feedback: Option<String>,
    ) -> Result<Timesheet, PortalError> {
        self.store.try_update(|sheets: &mut Vec<Timesheet>| {
            let sheet = find_mut(sheets, id)?;
            sheet.status = status;
            if let Some(feedback) = feedback {
                sheet.feedback = feedback;
            }
            Ok(sheet.clone())
        })
    }

    pub fn add_user(&self, new: NewUser) -> Result<User, PortalError> {
        require(&[("name", new.name.as_str()), ("email", new.email.as_str())])?;
        let email = new.email.trim().to_lowercase();
        self.store.try_update(|users: &mut Vec<User>| {
            if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
                return Err(PortalError::DuplicateEmail(email));
            }
            let user = User {
                id: new_id(),
                name: new.name.trim().to_string(),
                email,
                role: new.role.unwrap_or(Role::Student),
            };
            users.push(user.clone());
            Ok(user)
        })
    }
}
