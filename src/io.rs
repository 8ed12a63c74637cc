//! Reading and writing the pipeline's durable JSON artifacts.

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{ErrorCode, StructuredError};

/// Reads and parses a JSON artifact. `malformed_code` identifies which
/// E1xxx input-validation code to report if the file parses as JSON but
/// not as `T` — callers pick the code matching the artifact they expect
/// (e.g. `ErrorCode::MALFORMED_ENDPOINT_SET` for an endpoint set).
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P, malformed_code: ErrorCode) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        StructuredError::new(
            ErrorCode::MISSING_INPUT_FILE,
            format!("failed to read {}", path.display()),
        )
        .with_detail(e.to_string())
    })?;
    let value = serde_json::from_str(&content).map_err(|e| {
        StructuredError::new(malformed_code, format!("failed to parse {}", path.display()))
            .with_detail(e.to_string())
    })?;
    Ok(value)
}

/// Writes `value` as pretty-printed JSON, via a sibling temp file renamed
/// into place so readers never observe a partially-written artifact.
pub fn write_json_atomic<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        StructuredError::new(ErrorCode::ARTIFACT_WRITE_FAILED, "failed to serialize artifact")
            .with_detail(e.to_string())
    })?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).map_err(|e| {
        StructuredError::new(
            ErrorCode::ARTIFACT_WRITE_FAILED,
            format!("failed to write {}", tmp_path.display()),
        )
        .with_detail(e.to_string())
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        StructuredError::new(
            ErrorCode::ARTIFACT_WRITE_FAILED,
            format!("failed to finalize {}", path.display()),
        )
        .with_detail(e.to_string())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn malformed_json_reports_the_requested_error_code() {
        let dir = std::env::temp_dir().join(format!("surfacerecon-io-test-{:?}", std::thread::current().id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        fs::write(&path, "not json").unwrap();

        let err = read_json::<Sample, _>(&path, ErrorCode::MALFORMED_ENDPOINT_SET).unwrap_err();
        let structured = err.downcast_ref::<StructuredError>().unwrap();
        assert_eq!(structured.code, ErrorCode::MALFORMED_ENDPOINT_SET);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = std::env::temp_dir().join(format!("surfacerecon-io-roundtrip-{:?}", std::thread::current().id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.json");
        let value = Sample { value: 7 };

        write_json_atomic(&path, &value).unwrap();
        let read_back: Sample = read_json(&path, ErrorCode::MALFORMED_ENDPOINT_SET).unwrap();
        assert_eq!(read_back, value);

        fs::remove_dir_all(&dir).ok();
    }
}
