//! Qdrant-backed collection, one Qdrant collection per repository.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::{BoxFuture, EntryMetadata, IndexEntry, ScoredEntry, StoredEntry, VectorIndex};

/// Qdrant point id for a chunk id: UUIDv5 in the OID namespace.
#[must_use]
pub fn point_id(chunk_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantIndex {
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, collection: String) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self {
            client,
            collection,
            write_lock: Mutex::new(()),
        })
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)?)
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        tracing::info!(collection = %self.collection, vector_size, "qdrant collection created");
        Ok(())
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match &payload.get(key)?.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn decode_payload(payload: &HashMap<String, Value>) -> Option<(String, String, EntryMetadata)> {
    Some((
        payload_str(payload, "chunk_id")?,
        payload_str(payload, "document")?,
        EntryMetadata {
            amalgamation: payload_str(payload, "amalgamation")?,
        },
    ))
}

impl VectorIndex for QdrantIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredEntry>>> {
        let id = id.to_owned();
        Box::pin(async move {
            if !self.exists().await? {
                return Ok(None);
            }
            let response = self
                .client
                .get_points(
                    GetPointsBuilder::new(&self.collection, vec![PointId::from(point_id(&id))])
                        .with_payload(true),
                )
                .await
                .map_err(Box::new)?;

            Ok(response
                .result
                .iter()
                .find_map(|p| decode_payload(&p.payload))
                .map(|(id, document, metadata)| StoredEntry {
                    id,
                    document,
                    metadata,
                }))
        })
    }

    fn add(&self, entry: IndexEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let vector_size = u64::try_from(entry.embedding.len()).unwrap_or(u64::MAX);
            self.ensure_collection(vector_size).await?;

            let payload: HashMap<String, Value> = serde_json::from_value(serde_json::json!({
                "chunk_id": entry.id,
                "document": entry.document,
                "amalgamation": entry.metadata.amalgamation,
            }))?;

            self.client
                .upsert_points(
                    UpsertPointsBuilder::new(
                        &self.collection,
                        vec![PointStruct::new(point_id(&entry.id), entry.embedding, payload)],
                    )
                    .wait(true),
                )
                .await
                .map_err(Box::new)?;
            Ok(())
        })
    }

    fn query(&self, embedding: Vec<f32>, k: usize) -> BoxFuture<'_, Result<Vec<ScoredEntry>>> {
        Box::pin(async move {
            let limit = k.min(self.count().await?);
            if limit == 0 {
                return Ok(Vec::new());
            }
            let limit = u64::try_from(limit).unwrap_or(u64::MAX);
            let response = self
                .client
                .search_points(
                    SearchPointsBuilder::new(&self.collection, embedding, limit)
                        .with_payload(true),
                )
                .await
                .map_err(Box::new)?;

            Ok(response
                .result
                .iter()
                .filter_map(|p| {
                    let (id, document, metadata) = decode_payload(&p.payload)?;
                    Some(ScoredEntry {
                        id,
                        score: p.score,
                        document,
                        metadata,
                    })
                })
                .collect())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move {
            if !self.exists().await? {
                return Ok(0);
            }
            let response = self
                .client
                .count(CountPointsBuilder::new(&self.collection).exact(true))
                .await
                .map_err(Box::new)?;
            let n = response.result.map_or(0, |r| r.count);
            Ok(usize::try_from(n).unwrap_or(usize::MAX))
        })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        // upserts are issued with `wait`, so acknowledged writes are durable
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_uuids() {
        let a = point_id("a.py:b.py");
        assert_eq!(a, point_id("a.py:b.py"));
        assert_ne!(a, point_id("a.py:c.py"));
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn payload_decoding_requires_all_fields() {
        let full: HashMap<String, Value> = serde_json::from_value(serde_json::json!({
            "chunk_id": "a.py",
            "document": "x = 1",
            "amalgamation": "##a.py",
        }))
        .unwrap();
        let (id, document, metadata) = decode_payload(&full).unwrap();
        assert_eq!(id, "a.py");
        assert_eq!(document, "x = 1");
        assert_eq!(metadata.amalgamation, "##a.py");

        let partial: HashMap<String, Value> =
            serde_json::from_value(serde_json::json!({ "chunk_id": "a.py" })).unwrap();
        assert!(decode_payload(&partial).is_none());
    }

    #[tokio::test]
    async fn new_client_for_valid_url() {
        let index = QdrantIndex::new("http://localhost:6334", "demo".into()).unwrap();
        assert_eq!(index.collection(), "demo");
    }
}
