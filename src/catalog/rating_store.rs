use std::collections::HashMap;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rating {
    pub count: u32,
    pub sum: f64,
}

impl Rating {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Default)]
pub struct RatingStore {
    ratings: Mutex<HashMap<String, Rating>>,
}

impl RatingStore {
    /// Adds a score and returns the updated aggregate.
    pub async fn add(&self, laptop_id: &str, score: f64) -> Rating {
        let mut ratings = self.ratings.lock().await;
        let rating = ratings.entry(laptop_id.to_string()).or_default();
        rating.count += 1;
        rating.sum += score;
        *rating
    }
}
