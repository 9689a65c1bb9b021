use connectors::error::{SourceError, TargetError};
use engine_core::retry::RetryDisposition;
use rusqlite::ErrorCode;

pub fn classify_target_error(err: &TargetError) -> RetryDisposition {
    match err {
        TargetError::Throttled(_) => RetryDisposition::Retry,
        TargetError::Unavailable(_) => RetryDisposition::Retry,
        TargetError::CollectionInUse(_) => RetryDisposition::Retry,
        TargetError::Validation(_) => RetryDisposition::Stop,
        TargetError::AccessDenied(_) => RetryDisposition::Stop,
        TargetError::CollectionNotFound(_) => RetryDisposition::Stop,
        TargetError::Storage(_) => RetryDisposition::Stop,
    }
}

pub fn classify_source_error(err: &SourceError) -> RetryDisposition {
    match err {
        SourceError::Sqlite(sqlite_err) => classify_sqlite_error(sqlite_err),
        SourceError::Task(_) => RetryDisposition::Stop,
        SourceError::UnknownTable(_) => RetryDisposition::Stop,
        SourceError::InvalidGroup { .. } => RetryDisposition::Stop,
        SourceError::NotFound(_) => RetryDisposition::Stop,
    }
}

fn classify_sqlite_error(err: &rusqlite::Error) -> RetryDisposition {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => RetryDisposition::Retry,
        _ => RetryDisposition::Stop,
    }
}
