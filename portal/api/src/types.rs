use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};

pub use workstudy::{
    broadcast::Change,
    model::{
        Application, ApplicationStatus, Job, JobStatus, Role, TableName, Tables, Timesheet,
        TimesheetStatus, User,
    },
    portal::{JobPatch, NewApplication, NewJob, NewTimesheet, NewUser, PortalError},
    projection::{AdminStats, StatusCounts, StudentStats},
};

/// Missing or invalid request fields.
pub const INVALID_PARAMS_CODE: i32 = -32602;
pub const NOT_FOUND_CODE: i32 = -32004;
/// The request collides with an existing record, e.g. a registered email.
pub const CONFLICT_CODE: i32 = -32009;
pub const SERVER_ERROR_CODE: i32 = -32001;

pub fn portal_error(err: &PortalError) -> ErrorObjectOwned {
    let code = match err {
        PortalError::MissingFields(_) | PortalError::Invalid { .. } => INVALID_PARAMS_CODE,
        PortalError::NotFound { .. } => NOT_FOUND_CODE,
        PortalError::DuplicateEmail(_) => CONFLICT_CODE,
    };
    match err {
        PortalError::MissingFields(fields) => ErrorObject::owned(code, err.to_string(), Some(fields)),
        _ => ErrorObject::owned(code, err.to_string(), None::<()>),
    }
}

pub fn server_error(err: impl ToString) -> ErrorObjectOwned {
    ErrorObject::owned(SERVER_ERROR_CODE, err.to_string(), None::<()>)
}
