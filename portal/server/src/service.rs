use crate::app_env::AppEnv;
use jsonrpsee::{
    core::{async_trait, SubscriptionResult},
    server::{Server, ServerHandle},
    types::ErrorObjectOwned,
    PendingSubscriptionSink, SubscriptionMessage,
};
use portal_api::{
    rpc::PortalApiServer,
    types::{
        portal_error, server_error, AdminStats, Application, ApplicationStatus, Job, JobPatch,
        NewApplication, NewJob, NewTimesheet, NewUser, PortalError, StudentStats, TableName,
        Timesheet, TimesheetStatus, User,
    },
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::ToSocketAddrs;
use tracing::{debug, info, warn};

pub struct PortalApiImpl {
    app_env: Arc<AppEnv>,
}

impl PortalApiImpl {
    pub fn new(app_env: Arc<AppEnv>) -> Self {
        Self { app_env }
    }
}

fn rejected(err: PortalError) -> ErrorObjectOwned {
    warn!(error = %err, "Request rejected");
    portal_error(&err)
}

#[async_trait]
impl PortalApiServer for PortalApiImpl {
    async fn list_jobs(&self) -> Result<Vec<Job>, ErrorObjectOwned> {
        Ok(self.app_env.portal.jobs())
    }

    async fn post_job(&self, job: NewJob) -> Result<Job, ErrorObjectOwned> {
        self.app_env.portal.post_job(job).map_err(rejected)
    }

    async fn edit_job(&self, id: String, patch: JobPatch) -> Result<Job, ErrorObjectOwned> {
        debug!("Editing job {}", id);
        self.app_env.portal.edit_job(&id, patch).map_err(rejected)
    }

    async fn delete_job(&self, id: String) -> Result<bool, ErrorObjectOwned> {
        Ok(self.app_env.portal.delete_job(&id))
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ErrorObjectOwned> {
        Ok(self.app_env.portal.applications())
    }

    async fn apply(&self, application: NewApplication) -> Result<Application, ErrorObjectOwned> {
        self.app_env.portal.apply(application).map_err(rejected)
    }

    async fn set_application_status(
        &self,
        id: String,
        status: ApplicationStatus,
    ) -> Result<Application, ErrorObjectOwned> {
        self.app_env
            .portal
            .set_application_status(&id, status)
            .map_err(rejected)
    }

    async fn list_timesheets(&self) -> Result<Vec<Timesheet>, ErrorObjectOwned> {
        Ok(self.app_env.portal.timesheets())
    }

    async fn submit_timesheet(
        &self,
        timesheet: NewTimesheet,
    ) -> Result<Timesheet, ErrorObjectOwned> {
        self.app_env
            .portal
            .submit_timesheet(timesheet)
            .map_err(rejected)
    }

    async fn review_timesheet(
        &self,
        id: String,
        status: TimesheetStatus,
        feedback: Option<String>,
    ) -> Result<Timesheet, ErrorObjectOwned> {
        self.app_env
            .portal
            .review_timesheet(&id, status, feedback)
            .map_err(rejected)
    }

    async fn list_users(&self) -> Result<Vec<User>, ErrorObjectOwned> {
        Ok(self.app_env.portal.users())
    }

    async fn add_user(&self, user: NewUser) -> Result<User, ErrorObjectOwned> {
        self.app_env.portal.add_user(user).map_err(rejected)
    }

    async fn admin_stats(&self) -> Result<AdminStats, ErrorObjectOwned> {
        Ok(AdminStats::compute(&self.app_env.store().snapshot()))
    }

    async fn student_stats(&self, student_id: String) -> Result<StudentStats, ErrorObjectOwned> {
        Ok(StudentStats::compute(
            &self.app_env.store().snapshot(),
            &student_id,
            self.app_env.hourly_rate,
        ))
    }

    async fn health_check(&self) -> Result<(), ErrorObjectOwned> {
        self.app_env.store().adapter().probe().map_err(|e| {
            warn!(error = %e, "Durable backing unreadable");
            server_error(e)
        })
    }

    async fn subscribe_changes(
        &self,
        pending: PendingSubscriptionSink,
        tables: Vec<TableName>,
    ) -> SubscriptionResult {
        // subscribe before accepting so no change slips in between
        let mut feed = self.app_env.store().hub().channel(&tables);
        let sink = pending.accept().await?;
        debug!(?tables, "Change subscription accepted");
        loop {
            tokio::select! {
                _ = sink.closed() => break,
                change = feed.recv() => match change {
                    Some(change) => {
                        let msg = SubscriptionMessage::from_json(&change)?;
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        debug!(?tables, "Change subscription closed");
        Ok(())
    }
}

/// Binds the JSON-RPC server and starts serving the portal.
pub async fn serve(
    app_env: Arc<AppEnv>,
    addr: impl ToSocketAddrs,
) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let server_addr = server.local_addr()?;
    let handle = server.start(PortalApiImpl::new(app_env).into_rpc());
    info!("JSON-RPC server started at {}", server_addr);
    Ok((server_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfig;
    use clap::Parser;
    use futures::StreamExt;
    use jsonrpsee::{
        core::ClientError,
        ws_client::{WsClient, WsClientBuilder},
    };
    use portal_api::{
        rpc::PortalApiClient,
        types::{
            Change, JobStatus, CONFLICT_CODE, INVALID_PARAMS_CODE, NOT_FOUND_CODE,
            SERVER_ERROR_CODE,
        },
    };

    async fn start() -> (ServerHandle, WsClient) {
        let cfg = AppConfig::parse_from(["portal-server", "--backend", "memory"]);
        start_with(Arc::new(AppEnv::new(&cfg).unwrap())).await
    }

    async fn start_with(env: Arc<AppEnv>) -> (ServerHandle, WsClient) {
        let (addr, handle) = serve(env, "127.0.0.1:0").await.unwrap();
        let client = WsClientBuilder::default()
            .build(format!("ws://{}", addr))
            .await
            .unwrap();
        (handle, client)
    }

    fn code(err: ClientError) -> i32 {
        match err {
            ClientError::Call(obj) => obj.code(),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn serves_seeded_tables() {
        let (_handle, client) = start().await;
        client.health_check().await.unwrap();
        assert_eq!(client.list_jobs().await.unwrap().len(), 3);
        assert_eq!(client.list_applications().await.unwrap().len(), 1);
        let stats = client.admin_stats().await.unwrap();
        assert_eq!(stats.active_jobs, 2);
        assert_eq!(stats.hours_tracked, 4.0);
        let student = client.student_stats("u-student".to_string()).await.unwrap();
        assert_eq!(student.earnings, 60.0);
    }

    #[tokio::test]
    async fn health_check_reports_unreadable_backing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();
        let cfg = AppConfig::parse_from(["portal-server", "--data-dir", data_dir]);
        let env = Arc::new(AppEnv::new(&cfg).unwrap());
        std::fs::create_dir_all(dir.path().join("jobs.json")).unwrap();
        let (_handle, client) = start_with(env).await;
        let err = client.health_check().await.unwrap_err();
        assert_eq!(code(err), SERVER_ERROR_CODE);
    }

    #[tokio::test]
    async fn maps_rejections_to_error_codes() {
        let (_handle, client) = start().await;
        let err = client.post_job(NewJob::default()).await.unwrap_err();
        assert_eq!(code(err), INVALID_PARAMS_CODE);

        let err = client
            .edit_job("missing".to_string(), JobPatch::default())
            .await
            .unwrap_err();
        assert_eq!(code(err), NOT_FOUND_CODE);

        let err = client
            .add_user(NewUser {
                name: "Admin Two".to_string(),
                email: "admin@demo".to_string(),
                role: None,
            })
            .await
            .unwrap_err();
        assert_eq!(code(err), CONFLICT_CODE);
    }

    #[tokio::test]
    async fn streams_changes_to_subscribers() {
        let (_handle, client) = start().await;
        let mut changes = client
            .subscribe_changes(vec![TableName::Jobs])
            .await
            .unwrap();

        // not watched
        client
            .set_application_status("a1".to_string(), ApplicationStatus::Approved)
            .await
            .unwrap();
        let job = client
            .post_job(NewJob {
                title: "Tutor".to_string(),
                dept: "Mathematics".to_string(),
                stipend: 16.0,
                hours: 8,
                status: Some(JobStatus::Active),
            })
            .await
            .unwrap();

        let change = changes.next().await.unwrap().unwrap();
        assert_eq!(change, Change::Table(TableName::Jobs));
        assert_eq!(client.list_jobs().await.unwrap()[0], job);
    }
}
