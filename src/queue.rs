use crate::config::QueueConfig;
use crate::error::{QueueError, Result, VeriscanError};
use crate::frame::CapturedFrame;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Well-known name of the record file inside the queue directory.
const QUEUE_FILE: &str = "queue.json";

/// Durable record of a frame whose submission was attempted and failed.
///
/// Records are never mutated in place; the stored list is replaced on append
/// and deleted on clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedFrame {
    pub id: String,
    /// Spooled JPEG file holding the frame bytes
    pub image_ref: PathBuf,
    pub doc_type: String,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

/// Durable offline queue backed by one JSON record list plus one spooled
/// JPEG per entry, all under a single directory.
///
/// Appends are read-modify-write on the record file; the mutex serializes
/// them against a concurrently running flush. A corrupted or missing record
/// file reads as an empty queue.
pub struct OfflineQueue {
    dir: PathBuf,
    store: Mutex<()>,
}

impl OfflineQueue {
    pub async fn new(config: &QueueConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.path);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(VeriscanError::Io)?;

        info!("Offline queue at {}", dir.display());
        Ok(Self {
            dir,
            store: Mutex::new(()),
        })
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE)
    }

    /// Persist a frame for later retry. The JPEG bytes are spooled next to
    /// the record list so the entry survives process restarts.
    pub async fn enqueue(
        &self,
        frame: &CapturedFrame,
    ) -> std::result::Result<QueuedFrame, QueueError> {
        let _guard = self.store.lock().await;

        let mut records = self.read_records().await;

        let id = Uuid::new_v4().to_string();
        let image_ref = self.dir.join(format!("{}.jpg", id));
        tokio::fs::write(&image_ref, frame.jpeg.as_ref())
            .await
            .map_err(|e| QueueError::Write {
                details: format!("spooling {} failed: {}", image_ref.display(), e),
            })?;

        let record = QueuedFrame {
            id,
            image_ref: image_ref.clone(),
            doc_type: frame.doc_type.clone(),
            width: frame.width,
            height: frame.height,
            created_at: Utc::now(),
        };
        records.push(record.clone());

        if let Err(e) = self.write_records(&records).await {
            // The spooled image is orphaned without its record; drop it
            let _ = tokio::fs::remove_file(&image_ref).await;
            return Err(e);
        }

        debug!(
            "Enqueued frame {} ({} bytes, {} pending)",
            record.id,
            frame.jpeg.len(),
            records.len()
        );
        Ok(record)
    }

    /// All pending records in original enqueue order.
    pub async fn read_all(&self) -> Vec<QueuedFrame> {
        let _guard = self.store.lock().await;
        self.read_records().await
    }

    /// Remove every record and spooled image.
    pub async fn clear(&self) -> std::result::Result<(), QueueError> {
        let _guard = self.store.lock().await;

        let records = self.read_records().await;
        for record in &records {
            if let Err(e) = tokio::fs::remove_file(&record.image_ref).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove spooled image {}: {}",
                        record.image_ref.display(),
                        e
                    );
                }
            }
        }

        match tokio::fs::remove_file(self.record_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(QueueError::Write {
                    details: format!("clearing record file failed: {}", e),
                })
            }
        }

        debug!("Offline queue cleared ({} records)", records.len());
        Ok(())
    }

    /// Load the spooled JPEG bytes for a record.
    pub async fn load_image(
        &self,
        record: &QueuedFrame,
    ) -> std::result::Result<Vec<u8>, QueueError> {
        tokio::fs::read(&record.image_ref)
            .await
            .map_err(|e| QueueError::Read {
                details: format!("reading {} failed: {}", record.image_ref.display(), e),
            })
    }

    async fn read_records(&self) -> Vec<QueuedFrame> {
        let path = self.record_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "Queue record file {} unreadable ({}); treating as empty",
                    path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Queue record file {} corrupt ({}); treating as empty",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    async fn write_records(
        &self,
        records: &[QueuedFrame],
    ) -> std::result::Result<(), QueueError> {
        let json = serde_json::to_vec_pretty(records).map_err(|e| QueueError::Write {
            details: format!("serializing records failed: {}", e),
        })?;

        tokio::fs::write(self.record_path(), json)
            .await
            .map_err(|e| QueueError::Write {
                details: format!("writing record file failed: {}", e),
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn test_frame(doc_type: &str, payload: u8) -> CapturedFrame {
        CapturedFrame::new(
            SystemTime::now(),
            vec![payload; 512],
            1280,
            960,
            doc_type.to_string(),
        )
    }

    async fn queue_in(dir: &Path) -> OfflineQueue {
        OfflineQueue::new(&QueueConfig {
            path: dir.to_string_lossy().to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_read_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = queue_in(dir.path()).await;

        let record = queue.enqueue(&test_frame("NCS_ORIGIN", 7)).await.unwrap();

        let all = queue.read_all().await;
        assert_eq!(all.len(), 1);
        // Metadata must round-trip byte-identical
        assert_eq!(all[0], record);
        assert_eq!(all[0].doc_type, "NCS_ORIGIN");
        assert_eq!(all[0].width, 1280);
        assert_eq!(all[0].height, 960);

        // And the spooled image holds the frame bytes
        let bytes = queue.load_image(&all[0]).await.unwrap();
        assert_eq!(bytes, vec![7u8; 512]);
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = queue_in(dir.path()).await;

        let first = queue.enqueue(&test_frame("A", 1)).await.unwrap();
        let second = queue.enqueue(&test_frame("B", 2)).await.unwrap();
        let third = queue.enqueue(&test_frame("C", 3)).await.unwrap();

        let ids: Vec<String> = queue.read_all().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[tokio::test]
    async fn test_clear_empties_queue_and_spool() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = queue_in(dir.path()).await;

        let record = queue.enqueue(&test_frame("NCS_ORIGIN", 9)).await.unwrap();
        assert!(record.image_ref.exists());

        queue.clear().await.unwrap();
        assert!(queue.read_all().await.is_empty());
        assert!(!record.image_ref.exists());
    }

    #[tokio::test]
    async fn test_corrupt_record_file_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = queue_in(dir.path()).await;

        tokio::fs::write(dir.path().join(QUEUE_FILE), b"{not json]]")
            .await
            .unwrap();
        assert!(queue.read_all().await.is_empty());

        // And the queue stays usable afterwards
        queue.enqueue(&test_frame("NCS_ORIGIN", 1)).await.unwrap();
        assert_eq!(queue.read_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_file_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = queue_in(dir.path()).await;
        assert!(queue.read_all().await.is_empty());
        queue.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();

        let record = {
            let queue = queue_in(dir.path()).await;
            queue.enqueue(&test_frame("NCS_ORIGIN", 5)).await.unwrap()
        };

        // New instance over the same directory sees the pending record
        let reopened = queue_in(dir.path()).await;
        let all = reopened.read_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, record.id);
        assert_eq!(reopened.load_image(&all[0]).await.unwrap(), vec![5u8; 512]);
    }
}
