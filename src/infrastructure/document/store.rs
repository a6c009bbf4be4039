use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::charging_profile::{
    sort_profiles, ChargingProfile, ChargingProfileRepository, ClearCriteria, ProfileFilter,
};
use crate::domain::DomainResult;
use crate::shared::errors::InfraError;

const DOCUMENT_EXTENSION: &str = "json";
const DOCUMENT_VERSION: u32 = 1;
/// Longest hex-encoded station directory name; longer ids are hashed so the
/// name stays under the 255-byte file name limit.
const MAX_HEX_DIR_NAME: usize = 128;
const HASHED_DIR_PREFIX: &str = "sha256-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// On-disk envelope around a stored profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub version: u32,
    pub stored_at: DateTime<Utc>,
    pub profile: ChargingProfile,
}

/// File-backed document store.
///
/// Each document is written to a temporary file and renamed into place, so a
/// reader sees either the previous or the new version of a profile, never a
/// partial one.
#[derive(Debug, Clone)]
pub struct DocumentChargingProfileRepository {
    root: PathBuf,
}

impl DocumentChargingProfileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let repo = Self::new(root);
        fs::create_dir_all(&repo.root).await?;
        info!(root = %repo.root.display(), "Document store ready");
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn station_dir(&self, charge_point_id: &str) -> PathBuf {
        self.root.join(station_dir_name(charge_point_id))
    }

    fn document_path(&self, charge_point_id: &str, charging_profile_id: i32) -> PathBuf {
        self.station_dir(charge_point_id)
            .join(format!("{}.{}", charging_profile_id, DOCUMENT_EXTENSION))
    }

    async fn read_document(path: &Path) -> Result<Option<ChargingProfile>, InfraError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: ProfileDocument = serde_json::from_slice(&bytes)?;
        if document.version != DOCUMENT_VERSION {
            return Err(InfraError::Decode(format!(
                "{}: unsupported document version {}",
                path.display(),
                document.version
            )));
        }
        Ok(Some(document.profile))
    }

    async fn load_station(
        &self,
        charge_point_id: &str,
    ) -> Result<Vec<ChargingProfile>, InfraError> {
        let dir = self.station_dir(charge_point_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut profiles = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            // A document removed between listing and reading is simply gone.
            if let Some(profile) = Self::read_document(&path).await? {
                if profile.charge_point_id == charge_point_id {
                    profiles.push(profile);
                }
            }
        }
        Ok(profiles)
    }

    /// Returns whether a document was actually removed.
    async fn remove_document(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> Result<bool, InfraError> {
        let path = self.document_path(charge_point_id, charging_profile_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Directory name for a station: hex of the id, or a SHA-256 digest of it
/// when the hex form would be too long. The two forms never collide since
/// the prefix is not valid hex.
fn station_dir_name(charge_point_id: &str) -> String {
    let encoded = hex::encode(charge_point_id.as_bytes());
    if encoded.len() <= MAX_HEX_DIR_NAME {
        return encoded;
    }
    let digest = Sha256::digest(charge_point_id.as_bytes());
    format!("{}{}", HASHED_DIR_PREFIX, hex::encode(digest))
}

#[async_trait]
impl ChargingProfileRepository for DocumentChargingProfileRepository {
    async fn set(&self, profile: ChargingProfile) -> DomainResult<()> {
        let dir = self.station_dir(&profile.charge_point_id);
        let path = self.document_path(&profile.charge_point_id, profile.charging_profile_id);
        debug!(
            charge_point_id = %profile.charge_point_id,
            profile_id = profile.charging_profile_id,
            path = %path.display(),
            "Writing charging profile document"
        );

        let document = ProfileDocument {
            version: DOCUMENT_VERSION,
            stored_at: Utc::now(),
            profile,
        };
        let json = serde_json::to_vec_pretty(&document).map_err(InfraError::from)?;

        fs::create_dir_all(&dir).await.map_err(InfraError::from)?;

        // Unique temp name so concurrent writers of the same profile do not
        // clobber each other's temp file; the last rename wins.
        let temp_path = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp_path, &json).await.map_err(InfraError::from)?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(InfraError::from(e).into());
        }
        Ok(())
    }

    async fn find(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> DomainResult<Option<ChargingProfile>> {
        let path = self.document_path(charge_point_id, charging_profile_id);
        Ok(Self::read_document(&path)
            .await?
            .filter(|p| p.charge_point_id == charge_point_id))
    }

    async fn query(
        &self,
        charge_point_id: &str,
        filter: &ProfileFilter,
    ) -> DomainResult<Vec<ChargingProfile>> {
        let mut profiles: Vec<ChargingProfile> = self
            .load_station(charge_point_id)
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        sort_profiles(&mut profiles);
        Ok(profiles)
    }

    async fn clear(
        &self,
        charge_point_id: &str,
        criteria: &ClearCriteria,
        cancel: &CancellationToken,
    ) -> DomainResult<u64> {
        let targets: Vec<i32> = match criteria.charging_profile_id {
            Some(id) => match self.find(charge_point_id, id).await? {
                Some(profile) if criteria.matches(&profile) => vec![id],
                _ => Vec::new(),
            },
            None => self
                .query(charge_point_id, &criteria.filter)
                .await?
                .into_iter()
                .map(|p| p.charging_profile_id)
                .collect(),
        };

        let removed = self
            .remove_documents(charge_point_id, &targets, cancel, |_| {})
            .await?;
        debug!(charge_point_id, removed, "Cleared charging profile documents");
        Ok(removed)
    }
}

impl DocumentChargingProfileRepository {
    /// Delete `targets` in order, checking `cancel` before each one.
    /// `on_removed` sees the running count after every delete.
    async fn remove_documents(
        &self,
        charge_point_id: &str,
        targets: &[i32],
        cancel: &CancellationToken,
        mut on_removed: impl FnMut(u64),
    ) -> Result<u64, InfraError> {
        let mut removed = 0u64;
        for (attempted, id) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    charge_point_id,
                    removed,
                    remaining = targets.len() - attempted,
                    "Clear cancelled, returning partial count"
                );
                break;
            }
            if self.remove_document(charge_point_id, *id).await? {
                removed += 1;
                on_removed(removed);
            }
        }
        Ok(removed)
    }
}
