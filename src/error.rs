use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    JobNotFound,
    TaskNotFound,
    DependencyNotFound,
    EmployeeNotFound,
    ValidationError,
    ConfigError,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::DependencyNotFound => "DEPENDENCY_NOT_FOUND",
            Self::EmployeeNotFound => "EMPLOYEE_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SiteopsError {
    pub code: ErrorCode,
    pub message: String,
}

impl SiteopsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized(path: &str) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            format!("No database at {path}. Run `siteops init` first."),
        )
    }

    pub fn job_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::JobNotFound, format!("Job not found: {reference}"))
    }

    pub fn task_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {reference}"))
    }

    pub fn dependency_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::DependencyNotFound,
            format!("Dependency not found: {reference}"),
        )
    }

    pub fn employee_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::EmployeeNotFound,
            format!("Employee not found: {reference}"),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl From<rusqlite::Error> for SiteopsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}

impl From<serde_json::Error> for SiteopsError {
    fn from(e: serde_json::Error) -> Self {
        Self::database(format!("JSON: {e}"))
    }
}
