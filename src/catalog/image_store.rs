use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub laptop_id: String,
    pub image_type: String,
    pub data: Vec<u8>,
}

/// Keeps uploaded images in memory, keyed by a generated id.
#[derive(Default)]
pub struct ImageStore {
    images: RwLock<HashMap<String, StoredImage>>,
}

impl ImageStore {
    pub async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> String {
        let id = Uuid::new_v4().to_string();
        self.images.write().await.insert(
            id.clone(),
            StoredImage {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
                data,
            },
        );
        id
    }

    pub async fn get(&self, id: &str) -> Option<StoredImage> {
        self.images.read().await.get(id).cloned()
    }
}
