use std::path::PathBuf;

/// A fresh path under the system temp directory. The directory itself is not created.
pub fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "oap-buffer-{name}-{}",
        oap_buffer_types::Timestamp::now_utc().unix_timestamp_nanos()
    ))
}
