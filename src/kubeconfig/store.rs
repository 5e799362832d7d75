// src/kubeconfig/store.rs
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use super::KubeConfig;
use crate::error::ConfigError;

/// Reads and writes the kubeconfig at a single fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, falling back to an empty config when no file exists yet.
    pub fn load(&self) -> Result<KubeConfig, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no kubeconfig found, starting empty");
                return Ok(KubeConfig::default());
            }
            Err(e) => {
                return Err(ConfigError::Unreadable {
                    path: self.path.clone(),
                    source: Box::new(e),
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(KubeConfig::default());
        }

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Unreadable {
            path: self.path.clone(),
            source: Box::new(e),
        })
    }

    pub fn ensure_parent_directory(&self) -> Result<(), ConfigError> {
        let dir = self.parent_dir();
        if dir.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(dir).map_err(|source| ConfigError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(path = %dir.display(), "created kubeconfig directory");
        Ok(())
    }

    /// Replaces the file with `config`. The document is written to a temporary
    /// sibling first and renamed over the target, so readers never see half a file.
    ///
    /// A symlinked config is written through: the link stays and its target is
    /// replaced, keeping the target's permissions.
    pub fn save(&self, config: &KubeConfig) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config)?;
        let write_failed = |source| ConfigError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let target = match fs::canonicalize(&self.path) {
            Ok(target) => target,
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(write_failed(e)),
        };
        let permissions = fs::metadata(&target).ok().map(|m| m.permissions());

        let mut file = NamedTempFile::new_in(parent_dir(&target)).map_err(write_failed)?;
        file.write_all(yaml.as_bytes()).map_err(write_failed)?;
        if let Some(permissions) = permissions {
            fs::set_permissions(file.path(), permissions).map_err(write_failed)?;
        }
        file.as_file().sync_all().map_err(write_failed)?;
        file.persist(&target).map_err(|e| write_failed(e.error))?;

        debug!(path = %target.display(), bytes = yaml.len(), "kubeconfig written");
        Ok(())
    }

    fn parent_dir(&self) -> &Path {
        parent_dir(&self.path)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubeconfig::{Cluster, NamedCluster};
    use serde_yaml::Mapping;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join(".kube").join("config"))
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load().unwrap(), KubeConfig::default());
    }

    #[test]
    fn blank_file_loads_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "  \n").unwrap();

        assert_eq!(ConfigStore::new(path).load().unwrap(), KubeConfig::default());
    }

    #[test]
    fn invalid_yaml_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "clusters: [unterminated\n  - : :").unwrap();

        let err = ConfigStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
        assert!(err.to_string().contains("not valid yaml"));
    }

    #[test]
    fn wrong_shape_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "clusters: 42\n").unwrap();

        assert!(matches!(
            ConfigStore::new(&path).load(),
            Err(ConfigError::Unreadable { .. })
        ));
    }

    #[test]
    fn creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.ensure_parent_directory().unwrap();
        assert!(dir.path().join(".kube").is_dir());

        // A second call is a no-op.
        store.ensure_parent_directory().unwrap();
    }

    #[test]
    fn directory_blocked_by_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".kube"), "not a directory").unwrap();

        let err = store_in(&dir).ensure_parent_directory().unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryCreateFailed { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.ensure_parent_directory().unwrap();

        let mut config = KubeConfig::default();
        config.clusters.push(NamedCluster {
            name: "homelab".to_string(),
            cluster: Cluster {
                certificate_authority_data: Some("Q0EK".to_string()),
                server: Some("https://10.0.0.1:6443".to_string()),
                extra: Mapping::new(),
            },
            extra: Mapping::new(),
        });
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), config);
        // No temporary files left behind next to the config.
        let entries = fs::read_dir(dir.path().join(".kube")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn save_writes_through_symlink() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let dir = TempDir::new().unwrap();
        let real = dir.path().join("dotfiles-config");
        fs::write(&real, "apiVersion: v1\nkind: Config\n").unwrap();
        fs::set_permissions(&real, fs::Permissions::from_mode(0o640)).unwrap();
        fs::create_dir(dir.path().join(".kube")).unwrap();
        let link = dir.path().join(".kube").join("config");
        symlink(&real, &link).unwrap();

        let store = ConfigStore::new(&link);
        let mut config = store.load().unwrap();
        config.current_context = Some("kubesail-alice".to_string());
        store.save(&config).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(fs::read_to_string(&real)
            .unwrap()
            .contains("current-context: kubesail-alice"));
        let mode = fs::metadata(&real).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        // The temporary file lands next to the real target, not the link.
        assert_eq!(fs::read_dir(dir.path().join(".kube")).unwrap().count(), 1);
    }

    #[test]
    fn save_without_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let err = store.save(&KubeConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::WriteFailed { .. }));
    }
}
