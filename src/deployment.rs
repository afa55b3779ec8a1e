use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Main,
    Local,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 4] = [
        DeploymentEnv::Dev,
        DeploymentEnv::Test,
        DeploymentEnv::Main,
        DeploymentEnv::Local,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Main => "main",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Main => "Mainnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// A published `case_opener` package on one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub published_at: String,
    pub package_id: String,
    pub network_url: String,
    #[serde(default)]
    pub random_object_id: Option<String>,
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::in_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn in_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Most recently appended record, if any.
    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load()?.pop())
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Appends a record unless the latest one already names the same package and
/// random object, in which case that one is returned untouched.
pub fn record_deployment(
    store: &DeploymentStore,
    package_id: impl AsRef<str>,
    network_url: impl AsRef<str>,
    random_object_id: Option<impl AsRef<str>>,
) -> Result<DeploymentRecord> {
    let package_id = package_id.as_ref();
    let random_object_id = random_object_id.map(|id| id.as_ref().to_string());
    if let Some(latest) = store.latest()? {
        if latest.package_id == package_id && latest.random_object_id == random_object_id {
            return Ok(latest);
        }
    }
    let record = DeploymentRecord {
        published_at: Utc::now().to_rfc3339(),
        package_id: package_id.to_string(),
        network_url: network_url.as_ref().to_string(),
        random_object_id,
    };
    store.append(record.clone())?;
    Ok(record)
}

pub fn ensure_structure() -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).wrap_err_with(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn in_root__creates_empty_record_file() {
        // given
        let root = TempDir::new("deployments").unwrap();

        // when
        let store = DeploymentStore::in_root(root.path(), DeploymentEnv::Test).unwrap();

        // then
        assert!(store.path().ends_with("test/deployments.json"));
        assert_eq!(store.load().unwrap(), Vec::new());
        assert_eq!(store.latest().unwrap(), None);
    }

    #[test]
    fn latest__returns_most_recent_record() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(root.path(), DeploymentEnv::Local).unwrap();
        record_deployment(&store, "0x1", "http://127.0.0.1:9000", None::<&str>).unwrap();
        let second =
            record_deployment(&store, "0x2", "http://127.0.0.1:9000", Some("0x8")).unwrap();

        // when
        let latest = store.latest().unwrap();

        // then
        assert_eq!(latest, Some(second));
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn record_deployment__skips_repeat_of_latest_record() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(root.path(), DeploymentEnv::Test).unwrap();
        let first =
            record_deployment(&store, "0xabc", "https://fullnode.testnet.sui.io:443", Some("0x8"))
                .unwrap();

        // when
        let again =
            record_deployment(&store, "0xabc", "https://fullnode.testnet.sui.io:443", Some("0x8"))
                .unwrap();
        record_deployment(&store, "0xabc", "https://fullnode.testnet.sui.io:443", Some("0x9"))
            .unwrap();

        // then
        assert_eq!(again, first);
        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].random_object_id.as_deref(), Some("0x9"));
    }

    #[test]
    fn load__accepts_records_without_random_object() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(root.path(), DeploymentEnv::Dev).unwrap();
        fs::write(
            store.path(),
            br#"[{"published_at":"2024-01-01T00:00:00Z","package_id":"0xabc","network_url":"https://fullnode.devnet.sui.io:443"}]"#,
        )
        .unwrap();

        // when
        let records = store.load().unwrap();

        // then
        assert_eq!(records[0].random_object_id, None);
        assert_eq!(records[0].package_id, "0xabc");
    }
}
