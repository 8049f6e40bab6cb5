//! In-process media store
//!
//! Keeps records in a map behind an async lock. Used by the test suites and
//! by `GALLERY_STORE_BACKEND=memory` for local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use common::error::DatabaseResult;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::media::{MediaData, MediaFilter, MediaItem, MediaMetadata, NewMediaItem},
    repositories::{BatchInsert, MediaStore},
};

#[derive(Debug, Clone)]
struct Record {
    item: MediaItem,
    data: MediaData,
}

impl Record {
    fn new(item: &NewMediaItem, access_token: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            item: MediaItem {
                id: Uuid::new_v4(),
                title: item.title.clone(),
                description: item.description.clone(),
                category: item.category,
                project_id: item.project_id.clone(),
                filename: item.data.filename.clone(),
                content_type: item.data.content_type.clone(),
                size_bytes: item.data.bytes.len() as i64,
                access_token: access_token.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
            data: item.data.clone(),
        }
    }
}

fn in_project<'a>(
    records: &'a HashMap<Uuid, Record>,
    project_id: &'a str,
) -> impl Iterator<Item = &'a MediaItem> {
    records
        .values()
        .map(|r| &r.item)
        .filter(move |item| item.project_id.as_deref() == Some(project_id))
}

/// Media store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    records: Arc<RwLock<HashMap<Uuid, Record>>>,
    latency: Option<Duration>,
}

impl MemoryMediaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the records
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn get(&self, id: Uuid) -> DatabaseResult<Option<MediaItem>> {
        self.pause().await;
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| r.item.clone()))
    }

    async fn get_data(&self, id: Uuid) -> DatabaseResult<Option<(MediaItem, MediaData)>> {
        self.pause().await;
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| (r.item.clone(), r.data.clone())))
    }

    async fn list(&self, filter: &MediaFilter) -> DatabaseResult<Vec<MediaItem>> {
        self.pause().await;
        let records = self.records.read().await;
        let mut items: Vec<MediaItem> = records
            .values()
            .map(|r| &r.item)
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn count_in_project(&self, project_id: &str) -> DatabaseResult<i64> {
        self.pause().await;
        let records = self.records.read().await;
        Ok(in_project(&records, project_id).count() as i64)
    }

    async fn insert(
        &self,
        item: &NewMediaItem,
        access_token: Option<&str>,
    ) -> DatabaseResult<MediaItem> {
        self.pause().await;
        let record = Record::new(item, access_token);
        let created = record.item.clone();
        self.records.write().await.insert(created.id, record);
        Ok(created)
    }

    async fn insert_batch(
        &self,
        items: &[NewMediaItem],
        fresh_token: &str,
        max_per_project: i64,
    ) -> DatabaseResult<BatchInsert> {
        self.pause().await;
        let mut records = self.records.write().await;

        let mut projects: Vec<&str> = items
            .iter()
            .filter_map(|item| item.project_id.as_deref())
            .collect();
        projects.sort_unstable();
        projects.dedup();

        let mut project_tokens: HashMap<&str, Option<String>> = HashMap::new();
        for project_id in projects {
            let existing = in_project(&records, project_id).count() as i64;
            let incoming = items
                .iter()
                .filter(|item| item.project_id.as_deref() == Some(project_id))
                .count() as i64;
            if existing + incoming > max_per_project {
                return Ok(BatchInsert::ProjectFull {
                    project_id: project_id.to_string(),
                    existing,
                    incoming,
                });
            }

            let token = in_project(&records, project_id)
                .filter(|item| item.category.is_gated())
                .find_map(|item| item.access_token.clone());
            project_tokens.insert(project_id, token);
        }

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let token = item.category.is_gated().then(|| {
                item.project_id
                    .as_deref()
                    .and_then(|p| project_tokens.get(p).cloned().flatten())
                    .unwrap_or_else(|| fresh_token.to_string())
            });
            let record = Record::new(item, token.as_deref());
            created.push(record.item.clone());
            records.insert(record.item.id, record);
        }

        Ok(BatchInsert::Inserted(created))
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: &MediaMetadata,
    ) -> DatabaseResult<Option<MediaItem>> {
        self.pause().await;
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|r| {
            r.item.title = metadata.title.clone();
            r.item.description = metadata.description.clone();
            r.item.category = metadata.category;
            r.item.project_id = metadata.project_id.clone();
            r.item.updated_at = Utc::now();
            r.item.clone()
        }))
    }

    async fn replace_data(&self, id: Uuid, data: &MediaData) -> DatabaseResult<Option<MediaItem>> {
        self.pause().await;
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|r| {
            r.item.filename = data.filename.clone();
            r.item.content_type = data.content_type.clone();
            r.item.size_bytes = data.bytes.len() as i64;
            r.item.updated_at = Utc::now();
            r.data = data.clone();
            r.item.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        self.pause().await;
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn set_access_token(
        &self,
        id: Uuid,
        access_token: Option<&str>,
    ) -> DatabaseResult<Option<MediaItem>> {
        self.pause().await;
        let mut records = self.records.write().await;
        let Some(project_id) = records.get(&id).map(|r| r.item.project_id.clone()) else {
            return Ok(None);
        };

        let now = Utc::now();
        for record in records.values_mut() {
            let sibling = project_id.is_some()
                && record.item.project_id == project_id
                && record.item.category.is_gated();
            if record.item.id == id || sibling {
                record.item.access_token = access_token.map(str::to_string);
                record.item.updated_at = now;
            }
        }

        Ok(records.get(&id).map(|r| r.item.clone()))
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::Category;

    fn new_item(category: Category, project_id: Option<&str>) -> NewMediaItem {
        NewMediaItem {
            title: "Courtyard house".to_string(),
            description: Some("Section drawings".to_string()),
            category,
            project_id: project_id.map(str::to_string),
            data: MediaData {
                filename: "section.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.7".to_vec(),
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryMediaStore::new();
        let created = store
            .insert(&new_item(Category::Built, Some("7")), None)
            .await
            .unwrap();

        assert_eq!(created.size_bytes, 8);
        assert_eq!(created.access_token, None);
        assert_eq!(store.get(created.id).await.unwrap(), Some(created.clone()));

        let (item, data) = store.get_data(created.id).await.unwrap().unwrap();
        assert_eq!(item, created);
        assert_eq!(data.bytes, b"%PDF-1.7".to_vec());
    }

    #[tokio::test]
    async fn test_token_change_covers_secret_project_siblings() {
        let store = MemoryMediaStore::new();
        let target = store.insert(&new_item(Category::Secret, Some("7")), None).await.unwrap();
        let sibling = store.insert(&new_item(Category::Secret, Some("7")), Some("old")).await.unwrap();
        let public = store.insert(&new_item(Category::Built, Some("7")), None).await.unwrap();
        let elsewhere = store.insert(&new_item(Category::Secret, Some("8")), Some("old")).await.unwrap();

        let updated = store.set_access_token(target.id, Some("new")).await.unwrap().unwrap();
        assert_eq!(updated.access_token.as_deref(), Some("new"));

        let token_of = |id| {
            let store = store.clone();
            async move { store.get(id).await.unwrap().unwrap().access_token }
        };
        assert_eq!(token_of(sibling.id).await.as_deref(), Some("new"));
        assert_eq!(token_of(public.id).await, None);
        assert_eq!(token_of(elsewhere.id).await.as_deref(), Some("old"));

        store.set_access_token(sibling.id, None).await.unwrap();
        assert_eq!(token_of(target.id).await, None);
        assert_eq!(token_of(elsewhere.id).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_token_change_without_project_is_item_scoped() {
        let store = MemoryMediaStore::new();
        let target = store.insert(&new_item(Category::Secret, None), None).await.unwrap();
        let other = store.insert(&new_item(Category::Secret, None), Some("kept")).await.unwrap();

        store.set_access_token(target.id, Some("new")).await.unwrap();

        let other = store.get(other.id).await.unwrap().unwrap();
        assert_eq!(other.access_token.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_insert_batch_adopts_project_token() {
        let store = MemoryMediaStore::new();
        store.insert(&new_item(Category::Secret, Some("7")), Some("shared")).await.unwrap();

        let batch = [
            new_item(Category::Secret, Some("7")),
            new_item(Category::Built, Some("7")),
            new_item(Category::Secret, None),
        ];
        let BatchInsert::Inserted(created) = store.insert_batch(&batch, "fresh", 5).await.unwrap() else {
            panic!("batch should fit");
        };

        assert_eq!(created[0].access_token.as_deref(), Some("shared"));
        assert_eq!(created[1].access_token, None);
        assert_eq!(created[2].access_token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_full_project_rejects_whole_batch() {
        let store = MemoryMediaStore::new();
        for _ in 0..4 {
            store.insert(&new_item(Category::Built, Some("7")), None).await.unwrap();
        }

        let batch = [
            new_item(Category::Built, None),
            new_item(Category::Built, Some("7")),
            new_item(Category::Built, Some("7")),
        ];
        let outcome = store.insert_batch(&batch, "fresh", 5).await.unwrap();

        assert_eq!(
            outcome,
            BatchInsert::ProjectFull {
                project_id: "7".to_string(),
                existing: 4,
                incoming: 2,
            }
        );
        assert_eq!(store.list(&MediaFilter::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_set_access_token_on_missing_item() {
        let store = MemoryMediaStore::new();
        let result = store.set_access_token(Uuid::new_v4(), Some("t")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_count_and_list_by_project() {
        let store = MemoryMediaStore::new();
        store.insert(&new_item(Category::Built, Some("7")), None).await.unwrap();
        store.insert(&new_item(Category::Secret, Some("7")), Some("t")).await.unwrap();
        store.insert(&new_item(Category::Built, Some("8")), None).await.unwrap();
        store.insert(&new_item(Category::Built, None), None).await.unwrap();

        assert_eq!(store.count_in_project("7").await.unwrap(), 2);
        assert_eq!(store.count_in_project("9").await.unwrap(), 0);

        let items = store.list(&MediaFilter::by_project("7")).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.project_id.as_deref() == Some("7")));
        assert_eq!(store.list(&MediaFilter::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_replace_and_delete() {
        let store = MemoryMediaStore::new();
        let created = store
            .insert(&new_item(Category::Unbuilt, None), None)
            .await
            .unwrap();

        let metadata = MediaMetadata {
            title: "Renamed".to_string(),
            description: None,
            category: Category::Hidden,
            project_id: Some("3".to_string()),
        };
        let updated = store.update_metadata(created.id, &metadata).await.unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.category, Category::Hidden);

        let data = MediaData {
            filename: "costs.csv".to_string(),
            content_type: "text/csv".to_string(),
            bytes: b"a,b\n1,2\n".to_vec(),
        };
        let replaced = store.replace_data(created.id, &data).await.unwrap().unwrap();
        assert_eq!(replaced.filename, "costs.csv");
        assert_eq!(replaced.size_bytes, 8);

        assert!(store.delete(created.id).await.unwrap());
        assert!(!store.delete(created.id).await.unwrap());
        assert!(store.get(created.id).await.unwrap().is_none());
    }
}
