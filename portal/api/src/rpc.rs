use super::types::{
    AdminStats, Application, ApplicationStatus, Change, Job, JobPatch, NewApplication, NewJob,
    NewTimesheet, NewUser, StudentStats, TableName, Timesheet, TimesheetStatus, User,
};
use jsonrpsee::{core::SubscriptionResult, proc_macros::rpc, types::ErrorObjectOwned};

#[rpc(server, client)]
pub trait PortalApi {
    #[method(name = "listJobs")]
    async fn list_jobs(&self) -> Result<Vec<Job>, ErrorObjectOwned>;

    #[method(name = "postJob")]
    async fn post_job(&self, job: NewJob) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "editJob")]
    async fn edit_job(&self, id: String, patch: JobPatch) -> Result<Job, ErrorObjectOwned>;

    /// Returns whether a job was removed.
    #[method(name = "deleteJob")]
    async fn delete_job(&self, id: String) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "listApplications")]
    async fn list_applications(&self) -> Result<Vec<Application>, ErrorObjectOwned>;

    #[method(name = "apply")]
    async fn apply(&self, application: NewApplication) -> Result<Application, ErrorObjectOwned>;

    #[method(name = "setApplicationStatus")]
    async fn set_application_status(
        &self,
        id: String,
        status: ApplicationStatus,
    ) -> Result<Application, ErrorObjectOwned>;

    #[method(name = "listTimesheets")]
    async fn list_timesheets(&self) -> Result<Vec<Timesheet>, ErrorObjectOwned>;

    #[method(name = "submitTimesheet")]
    async fn submit_timesheet(&self, timesheet: NewTimesheet)
        -> Result<Timesheet, ErrorObjectOwned>;

    #[method(name = "reviewTimesheet")]
    async fn review_timesheet(
        &self,
        id: String,
        status: TimesheetStatus,
        feedback: Option<String>,
    ) -> Result<Timesheet, ErrorObjectOwned>;

    #[method(name = "listUsers")]
    async fn list_users(&self) -> Result<Vec<User>, ErrorObjectOwned>;

    #[method(name = "addUser")]
    async fn add_user(&self, user: NewUser) -> Result<User, ErrorObjectOwned>;

    #[method(name = "adminStats")]
    async fn admin_stats(&self) -> Result<AdminStats, ErrorObjectOwned>;

    #[method(name = "studentStats")]
    async fn student_stats(&self, student_id: String) -> Result<StudentStats, ErrorObjectOwned>;

    #[method(name = "healthCheck")]
    async fn health_check(&self) -> Result<(), ErrorObjectOwned>;

    /// Streams a `Change` each time one of `tables` is replaced on the server.
    #[subscription(name = "subscribeChanges" => "change", unsubscribe = "unsubscribeChanges", item = Change)]
    async fn subscribe_changes(&self, tables: Vec<TableName>) -> SubscriptionResult;
}
