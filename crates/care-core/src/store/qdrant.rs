//! ============================================================================
//! Qdrant Store - users and chat history as Qdrant points
//! ============================================================================
//! Vectors are placeholders; lookups use payload filters, an integer range
//! on `timestamp`, and ordering by `timestamp`.
//! ============================================================================

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Direction, Distance, FieldType, Filter, OrderByBuilder,
    PointStruct, Range, RetrievedPoint, ScrollPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::CareStore;
use crate::config::StoreConfig;
use crate::types::{CareError, CareResult, ChatEntry, StoreStats, User};

/// Store backed by a Qdrant instance
pub struct QdrantStore {
    client: Qdrant,
    user_collection: String,
    chat_collection: String,
    vector_size: u64,
    placeholder: Vec<f32>,
}

impl QdrantStore {
    /// Connect to Qdrant and ensure both collections exist
    pub async fn connect(config: &StoreConfig) -> CareResult<Self> {
        debug!("Connecting to Qdrant at {}", config.qdrant_url);

        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| CareError::Connection(format!("Failed to create Qdrant client: {}", e)))?;

        let store = Self {
            client,
            user_collection: config.user_collection.clone(),
            chat_collection: config.chat_collection.clone(),
            vector_size: config.vector_size,
            placeholder: config.placeholder_vector(),
        };

        store.ensure_collection(&store.user_collection).await?;
        store.ensure_collection(&store.chat_collection).await?;
        store.ensure_chat_indexes().await?;

        Ok(store)
    }

    /// Create `name` if missing
    async fn ensure_collection(&self, name: &str) -> CareResult<()> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| CareError::Connection(format!("Failed to check collection existence: {}", e)))?;

        if exists {
            debug!("Collection {} already exists", name);
            return Ok(());
        }

        info!("Creating collection: {}", name);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| CareError::Connection(format!("Failed to create collection {}: {}", name, e)))?;

        info!("Collection {} created successfully", name);
        Ok(())
    }

    /// Payload indexes needed to filter by user and order by timestamp.
    /// Qdrant treats re-creating an existing index as a no-op.
    async fn ensure_chat_indexes(&self) -> CareResult<()> {
        for (field, field_type) in [("user_id", FieldType::Keyword), ("timestamp", FieldType::Integer)] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.chat_collection,
                    field,
                    field_type,
                ))
                .await
                .map_err(|e| CareError::Storage(format!("Failed to index {}: {}", field, e)))?;
        }
        debug!("Created payload indexes on {}", self.chat_collection);
        Ok(())
    }

    async fn upsert(&self, collection: &str, id: Uuid, payload: HashMap<String, Value>) -> CareResult<()> {
        let point = PointStruct::new(id.to_string(), self.placeholder.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| CareError::Storage(format!("Failed to upsert into {}: {}", collection, e)))?;

        Ok(())
    }

    async fn points_count(&self, collection: &str) -> CareResult<u64> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| CareError::Storage(format!("Failed to get collection info: {}", e)))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

#[async_trait]
impl CareStore for QdrantStore {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    async fn find_user(&self, identifier: &str) -> CareResult<Option<User>> {
        debug!("Looking up user by contact");

        let filter = Filter::should([
            Condition::matches("phone_number", identifier.to_string()),
            Condition::matches("email", identifier.to_string()),
        ]);

        let scroll_result = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.user_collection)
                    .filter(filter)
                    .limit(1)
                    .with_payload(true),
            )
            .await
            .map_err(|e| CareError::Storage(format!("Failed to scroll users: {}", e)))?;

        Ok(scroll_result.result.into_iter().find_map(user_from_point))
    }

    async fn insert_user(&self, user: &User) -> CareResult<()> {
        let payload: HashMap<String, Value> = [
            ("name".to_string(), Value::from(user.name.clone())),
            ("phone_number".to_string(), Value::from(user.phone_number.clone())),
            ("email".to_string(), Value::from(user.email.clone())),
        ]
        .into_iter()
        .collect();

        self.upsert(&self.user_collection, user.id, payload).await?;
        debug!("Stored user {}", user.id);
        Ok(())
    }

    async fn append_entry(&self, entry: &ChatEntry) -> CareResult<()> {
        let payload: HashMap<String, Value> = [
            ("user_id".to_string(), Value::from(entry.user_id.to_string())),
            ("user_input".to_string(), Value::from(entry.user_input.clone())),
            ("bot_response".to_string(), Value::from(entry.bot_response.clone())),
            ("timestamp".to_string(), Value::from(entry.created_at)),
        ]
        .into_iter()
        .collect();

        self.upsert(&self.chat_collection, entry.id, payload).await?;
        debug!("Stored chat entry {} for user {}", entry.id, entry.user_id);
        Ok(())
    }

    async fn latest_entry_since(&self, user_id: Uuid, since: i64) -> CareResult<Option<ChatEntry>> {
        debug!("Fetching latest entry for user {} since {}", user_id, since);

        let filter = Filter::must([
            Condition::matches("user_id", user_id.to_string()),
            Condition::range(
                "timestamp",
                Range {
                    gte: Some(since as f64),
                    ..Default::default()
                },
            ),
        ]);

        let scroll_result = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.chat_collection)
                    .filter(filter)
                    .limit(1)
                    .with_payload(true)
                    .order_by(OrderByBuilder::new("timestamp").direction(Direction::Desc.into())),
            )
            .await
            .map_err(|e| CareError::Storage(format!("Failed to scroll chat history: {}", e)))?;

        Ok(scroll_result.result.into_iter().find_map(entry_from_point))
    }

    async fn stats(&self) -> CareResult<StoreStats> {
        Ok(StoreStats {
            users: self.points_count(&self.user_collection).await?,
            chat_entries: self.points_count(&self.chat_collection).await?,
        })
    }
}

fn user_from_point(point: RetrievedPoint) -> Option<User> {
    let id = extract_uuid_from_point_id(point.id?)?;
    let payload = point.payload;

    Some(User {
        id,
        name: get_string(&payload, "name")?,
        phone_number: get_string(&payload, "phone_number")?,
        email: get_string(&payload, "email")?,
    })
}

fn entry_from_point(point: RetrievedPoint) -> Option<ChatEntry> {
    let id = extract_uuid_from_point_id(point.id?)?;
    let payload = point.payload;

    Some(ChatEntry {
        id,
        user_id: Uuid::parse_str(&get_string(&payload, "user_id")?).ok()?,
        user_input: get_string(&payload, "user_input")?,
        bot_response: get_string(&payload, "bot_response").unwrap_or_default(),
        created_at: get_i64(&payload, "timestamp")?,
    })
}

fn extract_uuid_from_point_id(point_id: qdrant_client::qdrant::PointId) -> Option<Uuid> {
    match point_id.point_id_options? {
        PointIdOptions::Uuid(uuid_str) => Uuid::parse_str(&uuid_str).ok(),
        PointIdOptions::Num(_) => None,
    }
}

fn get_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn get_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key).and_then(|v| v.as_integer())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(id: Uuid, payload: HashMap<String, Value>) -> RetrievedPoint {
        RetrievedPoint {
            id: Some(id.to_string().into()),
            payload,
            ..Default::default()
        }
    }

    #[test]
    fn test_user_from_point() {
        let id = Uuid::new_v4();
        let payload: HashMap<String, Value> = [
            ("name".to_string(), Value::from("Alex")),
            ("phone_number".to_string(), Value::from("+12345678901")),
            ("email".to_string(), Value::from("a@b.com")),
        ]
        .into_iter()
        .collect();

        let user = user_from_point(retrieved(id, payload)).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "Alex");
        assert_eq!(user.email, "a@b.com");
    }

    #[test]
    fn test_entry_from_point_requires_timestamp() {
        let payload: HashMap<String, Value> = [
            ("user_id".to_string(), Value::from(Uuid::new_v4().to_string())),
            ("user_input".to_string(), Value::from("I feel lonely")),
        ]
        .into_iter()
        .collect();

        assert!(entry_from_point(retrieved(Uuid::new_v4(), payload)).is_none());
    }

    #[test]
    fn test_numeric_point_id_rejected() {
        let point = RetrievedPoint {
            id: Some(7u64.into()),
            ..Default::default()
        };
        assert!(user_from_point(point).is_none());
    }

    // Integration tests require a running Qdrant instance
    // These are marked as ignored by default

    #[tokio::test]
    #[ignore]
    async fn test_register_and_lookup() {
        let config = StoreConfig {
            user_collection: "care_test_users".to_string(),
            chat_collection: "care_test_chat".to_string(),
            ..StoreConfig::default()
        };
        let store = QdrantStore::connect(&config).await.unwrap();

        let user = User::new(
            "Alex".to_string(),
            "+12345678901".to_string(),
            "a@b.com".to_string(),
        );
        store.insert_user(&user).await.unwrap();
        assert!(store.find_user("a@b.com").await.unwrap().is_some());

        let entry = ChatEntry::new(user.id, "I feel lonely".to_string(), "ok".to_string());
        store.append_entry(&entry).await.unwrap();

        let latest = store
            .latest_entry_since(user.id, entry.created_at - 60)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.user_input, "I feel lonely");
    }
}
