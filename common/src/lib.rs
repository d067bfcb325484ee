use arrow::error::ArrowError;
use aws_smithy_runtime_api::client::result::CreateUnhandledError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use parquet::errors::ParquetError;
use datafusion::error::DataFusionError;
use thiserror::Error;
use url::ParseError;

pub mod config;
pub mod storage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object {key} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Source file '{file}' unavailable: {reason}")]
    SourceUnavailable { file: String, reason: String },

    #[error("Malformed identifier '{identifier}': {reason}")]
    MalformedIdentifier { identifier: String, reason: &'static str },

    #[error("No row in {table} for key '{key}'")]
    UnresolvedForeignKey { table: &'static str, key: String },

    #[error("Load into '{destination}' failed: {reason}")]
    LoadFailure { destination: String, reason: String },

    #[error("Task '{task}' requires table '{table}', which has not been loaded")]
    MissingDependency { task: String, table: String },

    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors worth retrying: file retrieval and warehouse transport failures.
    /// Data-quality and configuration errors fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::SourceUnavailable { .. }
            | Error::LoadFailure { .. }
            | Error::Storage(_)
            | Error::AwsSdk(_)
            | Error::Io(_) => true,
            Error::Task { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    pub fn in_task(self, task: &str) -> Self {
        match self {
            already @ Error::Task { .. } => already,
            other => Error::Task {
                task: task.to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl<E: std::fmt::Debug + CreateUnhandledError> From<SdkError<E, Response>> for Error {
    fn from(err: SdkError<E, Response>) -> Self {
        Error::AwsSdk(format!("{:?}", err))
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Error::ObjectNotFound {
                bucket: String::new(),
                key: path,
            },
            other => Error::Storage(format!("Object store error: {}", other)),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidInput(format!("URL parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::head_bucket::HeadBucketError;

    #[test]
    fn transport_errors_are_transient() {
        let err = Error::SourceUnavailable {
            file: "a.csv".into(),
            reason: "timeout".into(),
        };
        assert!(err.is_transient());
        assert!(err.in_task("cargar_dim_contribuyente").is_transient());
    }

    #[test]
    fn sdk_failures_convert_to_transient_aws_errors() {
        let err: SdkError<HeadBucketError, Response> = SdkError::timeout_error("connect timed out");

        let err = Error::from(err);
        assert!(matches!(err, Error::AwsSdk(ref msg) if msg.contains("TimeoutError")));
        assert!(err.is_transient());
    }

    #[test]
    fn data_errors_are_not_transient() {
        let err = Error::SchemaMismatch("missing column NUMERO_RUC".into());
        assert!(!err.is_transient());
        let err = Error::MalformedIdentifier {
            identifier: "ABC".into(),
            reason: "non-digit characters",
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn in_task_does_not_double_wrap() {
        let err = Error::Other("boom".into())
            .in_task("cargar_dim_tiempo")
            .in_task("outer");
        match err {
            Error::Task { task, .. } => assert_eq!(task, "cargar_dim_tiempo"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
