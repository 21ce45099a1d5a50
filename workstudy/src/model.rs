use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{self, Display};

/// Names of the durable tables. The string form is the key of the durable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Jobs,
    Applications,
    Timesheets,
    Users,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::Jobs,
        TableName::Applications,
        TableName::Timesheets,
        TableName::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Jobs => "jobs",
            TableName::Applications => "applications",
            TableName::Timesheets => "timesheets",
            TableName::Users => "users",
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flat record living in one of the tables.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: TableName;

    fn id(&self) -> &str;

    /// Dataset installed when the durable slot is absent or unreadable.
    fn seed() -> Vec<Self>;

    fn table(tables: &Tables) -> &Vec<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self>;
}

/// Contents of every table at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub jobs: Vec<Job>,
    pub applications: Vec<Application>,
    pub timesheets: Vec<Timesheet>,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub dept: String,
    pub stipend: f64,
    pub hours: u32,
    pub status: JobStatus,
    pub posted_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

// Field names follow the portal's existing data files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
    /// Snapshot of the job title at the time of applying.
    #[serde(rename = "jobTitle")]
    pub job_title: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "studentName")]
    pub student_name: String,
    pub applied_at: NaiveDate,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetStatus {
    #[serde(alias = "submitted")]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: String,
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub job_title: String,
    pub date: NaiveDate,
    pub hours: f64,
    #[serde(default)]
    pub description: String,
    pub status: TimesheetStatus,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl Record for Job {
    const TABLE: TableName = TableName::Jobs;

    fn id(&self) -> &str {
        &self.id
    }

    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.jobs
    }

    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.jobs
    }

    fn seed() -> Vec<Self> {
        let job = |id: &str, title: &str, dept: &str, stipend, hours, status, posted_at| Job {
            id: id.to_string(),
            title: title.to_string(),
            dept: dept.to_string(),
            stipend,
            hours,
            status,
            posted_at,
        };
        vec![
            job(
                "j1",
                "Library Assistant",
                "University Library",
                15.0,
                10,
                JobStatus::Active,
                date(2024, 1, 15),
            ),
            job(
                "j2",
                "Research Assistant",
                "Biology Department",
                18.0,
                15,
                JobStatus::Active,
                date(2024, 1, 10),
            ),
            job(
                "j3",
                "Lab Technician",
                "Chemistry Department",
                16.0,
                12,
                JobStatus::Closed,
                date(2024, 1, 5),
            ),
        ]
    }
}

impl Record for Application {
    const TABLE: TableName = TableName::Applications;

    fn id(&self) -> &str {
        &self.id
    }

    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.applications
    }

    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.applications
    }

    fn seed() -> Vec<Self> {
        vec![Application {
            id: "a1".to_string(),
            job_id: "j1".to_string(),
            job_title: "Library Assistant".to_string(),
            student_id: "u-student".to_string(),
            student_name: "Demo Student".to_string(),
            applied_at: date(2024, 1, 15),
            status: ApplicationStatus::Pending,
        }]
    }
}

impl Record for Timesheet {
    const TABLE: TableName = TableName::Timesheets;

    fn id(&self) -> &str {
        &self.id
    }

    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.timesheets
    }

    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.timesheets
    }

    fn seed() -> Vec<Self> {
        vec![Timesheet {
            id: "t1".to_string(),
            job_id: Some("j2".to_string()),
            student_id: "u-student".to_string(),
            job_title: "Research Assistant".to_string(),
            date: date(2024, 1, 20),
            hours: 4.0,
            description: String::new(),
            status: TimesheetStatus::Approved,
            feedback: "Good job".to_string(),
        }]
    }
}

impl Record for User {
    const TABLE: TableName = TableName::Users;

    fn id(&self) -> &str {
        &self.id
    }

    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.users
    }

    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.users
    }

    fn seed() -> Vec<Self> {
        vec![
            User {
                id: "u-admin".to_string(),
                name: "Admin".to_string(),
                email: "admin@demo".to_string(),
                role: Role::Admin,
            },
            User {
                id: "u-student".to_string(),
                name: "Demo Student".to_string(),
                email: "student@demo".to_string(),
                role: Role::Student,
            },
        ]
    }
}

#[cfg(any(test, feature = "test"))]
pub mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    pub fn job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![Just(JobStatus::Active), Just(JobStatus::Closed)]
    }

    pub fn job() -> impl Strategy<Value = Job> {
        (
            "[a-z0-9]{1,8}",
            "[A-Za-z ]{0,24}",
            "[A-Za-z ]{0,24}",
            0u32..100,
            0u32..40,
            job_status(),
            0i64..3650,
        )
            .prop_map(|(id, title, dept, stipend, hours, status, days)| Job {
                id,
                title,
                dept,
                // whole numbers keep the JSON round-trip exact
                stipend: stipend as f64,
                hours,
                status,
                posted_at: date(2020, 1, 1) + chrono::Duration::days(days),
            })
    }

    pub fn jobs() -> impl Strategy<Value = Vec<Job>> {
        prop::collection::vec(job(), 0..12)
    }
}
