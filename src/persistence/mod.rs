use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use serde::{
    de::DeserializeOwned,
    Serialize,
};
use tracing::{
    debug,
    warn,
};

use crate::core::ComboError;

const APP_NAME: &str = "comboscribe";

pub fn get_app_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        let app_dir = data_dir.join(APP_NAME);
        let _ = fs::create_dir_all(&app_dir);
        app_dir
    } else {
        PathBuf::from(".")
    }
}

/// Writes `data` as pretty JSON to `dir/filename`, replacing the file atomically.
pub fn save_json_in<T: Serialize>(dir: &Path, data: &T, filename: &str) -> Result<(), ComboError> {
    fs::create_dir_all(dir)?;
    let file_path = dir.join(filename);
    let tmp_path = file_path.with_extension("json.tmp");

    let json = serde_json::to_string_pretty(data)?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, &file_path)?;
    debug!("Data saved to: {}", file_path.display());
    Ok(())
}

pub fn load_json_in<T: DeserializeOwned + Default>(
    dir: &Path,
    filename: &str,
) -> Result<T, ComboError> {
    let file_path = dir.join(filename);

    if !file_path.exists() {
        return Ok(T::default());
    }

    let json = fs::read_to_string(&file_path)?;
    let data: T = serde_json::from_str(&json)?;
    debug!("Data loaded from: {}", file_path.display());
    Ok(data)
}

pub fn load_json_or_default_in<T: DeserializeOwned + Default>(dir: &Path, filename: &str) -> T {
    match load_json_in::<T>(dir, filename) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to load {}: {}. Using defaults.", filename, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let data: BTreeMap<String, u32> = load_json_in(dir.path(), "nothing.json").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = BTreeMap::new();
        data.insert("holdFrames".to_string(), 20u32);

        save_json_in(dir.path(), &data, "settings.json").unwrap();
        let loaded: BTreeMap<String, u32> = load_json_in(dir.path(), "settings.json").unwrap();
        assert_eq!(loaded, data);
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("memos.json"), "{not json").unwrap();

        assert!(load_json_in::<BTreeMap<String, u32>>(dir.path(), "memos.json").is_err());
        let data: BTreeMap<String, u32> = load_json_or_default_in(dir.path(), "memos.json");
        assert!(data.is_empty());
    }
}
