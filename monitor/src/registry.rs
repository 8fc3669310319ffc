//! Operator-maintained list of monitored game servers
//!
//! This module owns the set of endpoints the monitor probes:
//! - Registration with uniqueness on the exact `(host, port)` pair
//! - Insertion-ordered snapshots for probe cycles
//! - Removal, optionally gated by a caller-supplied permission check
//! - Persistence to a JSON array of `{host, port, added_by}` objects
//!
//! All mutations run under the write lock and persist before the in-memory
//! list is updated, so a failed write leaves both copies untouched.

use log::{debug, info};
use shared::{parse_host, Endpoint};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{host}:{port} is already registered")]
    Duplicate { host: String, port: u16 },
    #[error("{host}:{port} is not registered")]
    NotFound { host: String, port: u16 },
    #[error("removal of {host}:{port} was refused")]
    Refused { host: String, port: u16 },
    #[error("invalid host {0:?}, expected a dotted-quad IPv4 address")]
    InvalidHost(String),
    #[error("registry file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shared handle to the endpoint list
///
/// Readers take cheap snapshots with [`Registry::list`]; probing never
/// mutates the registry. Writers are serialized by the lock, which is held
/// across the file write so concurrent add/remove calls cannot lose updates.
#[derive(Debug)]
pub struct Registry {
    /// Endpoints in insertion order
    endpoints: RwLock<Vec<Endpoint>>,
    /// Backing file, `None` for a purely in-memory registry
    path: Option<PathBuf>,
}

impl Registry {
    /// Creates an empty registry that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            endpoints: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Loads the registry stored at `path`
    ///
    /// A missing or empty file yields an empty registry which will be created
    /// on the first mutation. Anything that does not match the record schema
    /// exactly (unknown or missing fields, non-IPv4 hosts, repeated keys) is
    /// rejected instead of being patched up.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();

        let endpoints = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_snapshot(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Loaded {} endpoints from {}",
            endpoints.len(),
            path.display()
        );

        Ok(Self {
            endpoints: RwLock::new(endpoints),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Registers a new endpoint
    ///
    /// Fails with [`RegistryError::Duplicate`] when the pair is already
    /// present. Hosts are compared as given, so `10.0.0.1` and `010.0.0.1`
    /// would be distinct keys, but only canonical IPv4 literals are accepted.
    pub async fn add(
        &self,
        host: &str,
        port: u16,
        added_by: &str,
    ) -> Result<Endpoint, RegistryError> {
        if parse_host(host).is_none() {
            return Err(RegistryError::InvalidHost(host.to_string()));
        }

        let mut endpoints = self.endpoints.write().await;
        if endpoints.iter().any(|e| e.matches(host, port)) {
            return Err(RegistryError::Duplicate {
                host: host.to_string(),
                port,
            });
        }

        let endpoint = Endpoint::new(host, port, added_by);
        let mut updated = endpoints.clone();
        updated.push(endpoint.clone());
        self.persist(&updated).await?;
        *endpoints = updated;

        info!("Endpoint {} added by {}", endpoint.address(), added_by);
        Ok(endpoint)
    }

    /// Returns a snapshot in insertion order
    pub async fn list(&self) -> Vec<Endpoint> {
        self.endpoints.read().await.clone()
    }

    pub async fn find(&self, host: &str, port: u16) -> Option<Endpoint> {
        self.endpoints
            .read()
            .await
            .iter()
            .find(|e| e.matches(host, port))
            .cloned()
    }

    /// Removes an endpoint unconditionally
    pub async fn remove(&self, host: &str, port: u16) -> Result<Endpoint, RegistryError> {
        self.remove_if(host, port, |_| true).await
    }

    /// Removes an endpoint if `allow` accepts it
    ///
    /// The check runs under the write lock against the entry that would be
    /// removed, so the decision cannot race with another mutation.
    pub async fn remove_if<F>(
        &self,
        host: &str,
        port: u16,
        allow: F,
    ) -> Result<Endpoint, RegistryError>
    where
        F: FnOnce(&Endpoint) -> bool,
    {
        let mut endpoints = self.endpoints.write().await;
        let index = endpoints
            .iter()
            .position(|e| e.matches(host, port))
            .ok_or_else(|| RegistryError::NotFound {
                host: host.to_string(),
                port,
            })?;

        if !allow(&endpoints[index]) {
            return Err(RegistryError::Refused {
                host: host.to_string(),
                port,
            });
        }

        let mut updated = endpoints.clone();
        let removed = updated.remove(index);
        self.persist(&updated).await?;
        *endpoints = updated;

        info!("Endpoint {} removed", removed.address());
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }

    /// Writes to a sibling temp file and renames it over the target
    async fn persist(&self, endpoints: &[Endpoint]) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(endpoints)?;
        let staging = staging_path(path);
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, path).await?;

        debug!("Persisted {} endpoints to {}", endpoints.len(), path.display());
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_snapshot(path: &Path, bytes: &[u8]) -> Result<Vec<Endpoint>, RegistryError> {
    let corrupt = |reason: String| RegistryError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let endpoints: Vec<Endpoint> =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;

    for (index, endpoint) in endpoints.iter().enumerate() {
        if parse_host(&endpoint.host).is_none() {
            return Err(corrupt(format!(
                "entry {} has invalid host {:?}",
                index, endpoint.host
            )));
        }
        if endpoints[..index]
            .iter()
            .any(|e| e.matches(&endpoint.host, endpoint.port))
        {
            return Err(corrupt(format!(
                "entry {} duplicates {}",
                index,
                endpoint.address()
            )));
        }
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_add_and_list_in_insertion_order() {
        let registry = Registry::in_memory();
        assert!(registry.is_empty().await);

        assert_ok!(registry.add("203.0.113.5", 7777, "alice").await);
        assert_ok!(registry.add("198.51.100.7", 7777, "bob").await);
        assert_ok!(registry.add("203.0.113.5", 7778, "carol").await);

        let endpoints = registry.list().await;
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0], Endpoint::new("203.0.113.5", 7777, "alice"));
        assert_eq!(endpoints[1], Endpoint::new("198.51.100.7", 7777, "bob"));
        assert_eq!(endpoints[2], Endpoint::new("203.0.113.5", 7778, "carol"));
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let registry = Registry::in_memory();
        assert_ok!(registry.add("203.0.113.5", 7777, "alice").await);

        let result = registry.add("203.0.113.5", 7777, "alice").await;
        assert!(matches!(
            result,
            Err(RegistryError::Duplicate { ref host, port: 7777 }) if host == "203.0.113.5"
        ));
        assert_eq!(registry.len().await, 1);

        let by_someone_else = registry.add("203.0.113.5", 7777, "mallory").await;
        assert!(matches!(by_someone_else, Err(RegistryError::Duplicate { .. })));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_host_is_rejected() {
        let registry = Registry::in_memory();

        assert!(matches!(
            registry.add("play.example.com", 7777, "alice").await,
            Err(RegistryError::InvalidHost(_))
        ));
        assert!(matches!(
            registry.add("10.0.0", 7777, "alice").await,
            Err(RegistryError::InvalidHost(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = Registry::in_memory();
        assert_ok!(registry.add("10.0.0.1", 7777, "alice").await);
        assert_ok!(registry.add("10.0.0.2", 7777, "bob").await);

        let removed = registry.remove("10.0.0.1", 7777).await.unwrap();
        assert_eq!(removed.added_by, "alice");
        assert_eq!(registry.list().await, vec![Endpoint::new("10.0.0.2", 7777, "bob")]);
    }

    #[tokio::test]
    async fn test_remove_missing_endpoint() {
        let registry = Registry::in_memory();
        assert_ok!(registry.add("10.0.0.1", 7777, "alice").await);

        let result = registry.remove("10.0.0.1", 7778).await;
        assert!(matches!(result, Err(RegistryError::NotFound { port: 7778, .. })));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_if_refusal_leaves_registry_unchanged() {
        let registry = Registry::in_memory();
        assert_ok!(registry.add("10.0.0.1", 7777, "alice").await);

        let result = registry
            .remove_if("10.0.0.1", 7777, |e| e.added_by == "bob")
            .await;
        assert!(matches!(result, Err(RegistryError::Refused { .. })));
        assert_eq!(registry.find("10.0.0.1", 7777).await.unwrap().added_by, "alice");
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");

        {
            let registry = Registry::open(&path).await.unwrap();
            assert!(registry.is_empty().await);
            assert_ok!(registry.add("203.0.113.5", 7777, "alice").await);
            assert_ok!(registry.add("198.51.100.7", 8888, "bob").await);
            assert_ok!(registry.add("192.0.2.1", 7777, "carol").await);
            assert_ok!(registry.remove("198.51.100.7", 8888).await);
        }

        let reopened = Registry::open(&path).await.unwrap();
        assert_eq!(
            reopened.list().await,
            vec![
                Endpoint::new("203.0.113.5", 7777, "alice"),
                Endpoint::new("192.0.2.1", 7777, "carol"),
            ]
        );
        assert!(!staging_path(&path).exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw[0],
            serde_json::json!({"host": "203.0.113.5", "port": 7777, "added_by": "alice"})
        );
    }

    #[tokio::test]
    async fn test_open_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "\n").unwrap();

        let registry = Registry::open(&path).await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(
            &path,
            r#"[{"host":"10.0.0.1","port":7777,"added_by":"alice","note":"x"}]"#,
        )
        .unwrap();

        assert_err!(Registry::open(&path).await);
    }

    #[tokio::test]
    async fn test_open_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, r#"[{"ip":"10.0.0.1","port":"7777"}]"#).unwrap();

        assert!(matches!(
            Registry::open(&path).await,
            Err(RegistryError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_host_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();

        let bad_host = dir.path().join("bad_host.json");
        std::fs::write(
            &bad_host,
            r#"[{"host":"samp.example.com","port":7777,"added_by":"alice"}]"#,
        )
        .unwrap();
        assert!(matches!(
            Registry::open(&bad_host).await,
            Err(RegistryError::Corrupt { .. })
        ));

        let duplicate = dir.path().join("duplicate.json");
        std::fs::write(
            &duplicate,
            r#"[{"host":"10.0.0.1","port":7777,"added_by":"alice"},
                {"host":"10.0.0.1","port":7777,"added_by":"bob"}]"#,
        )
        .unwrap();
        assert!(matches!(
            Registry::open(&duplicate).await,
            Err(RegistryError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        let registry = std::sync::Arc::new(Registry::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20u16 {
            let registry = std::sync::Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.add("10.0.0.1", 7000 + i, "load").await
            }));
        }
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        assert_eq!(registry.len().await, 20);
        let reopened = Registry::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 20);
    }
}
