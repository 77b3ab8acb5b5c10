use crate::analysis::AnalyzerConfig;
use crate::filter_utils::UniverseFilter;
use crate::interpret::InterpretationPolicy;
use crate::ranking::RankingPolicy;
use crate::report::ReportConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

// CONFIGURATION STRUCTS
// Every section falls back to its defaults, so a partial (or missing) config.json works.

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub interpretation: InterpretationPolicy,
    pub ranking: RankingPolicy,
    pub universe: UniverseFilter,
    pub report: ReportConfig,
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// **Constructor: new_relative**
    /// Resolves the storage path relative to the running executable and creates it.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// **Constructor: new**
    /// Uses `base_dir` as is, creating it when missing.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !fs::try_exists(&base_dir).await? {
            fs::create_dir_all(&base_dir)
                .await
                .with_context(|| format!("creating storage directory {:?}", base_dir))?;
        }
        Ok(Self { base_dir })
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// **Generic Save Function**
    /// Writes pretty JSON to a .tmp file first, then renames it over the target,
    /// so a crash mid-write never leaves a truncated file behind.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes)
            .await
            .with_context(|| format!("writing {:?}", tmp_path))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .with_context(|| format!("renaming {:?} to {:?}", tmp_path, final_path))?;

        Ok(())
    }

    /// **Generic Load Function**
    /// Reads raw bytes (serde_json validates UTF-8 while parsing) and deserializes into `T`.
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.path_for(filename);
        let content = fs::read(&path)
            .await
            .with_context(|| format!("reading {:?}", path))?;
        let data = serde_json::from_slice(&content)
            .with_context(|| format!("decoding {:?}", path))?;
        Ok(data)
    }

    /// Like [`load`](Self::load), but a missing file yields `T::default()`.
    /// A file that exists and fails to parse is still an error.
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        filename: &str,
    ) -> anyhow::Result<T> {
        if fs::try_exists(self.path_for(filename)).await? {
            self.load(filename).await
        } else {
            Ok(T::default())
        }
    }
}
