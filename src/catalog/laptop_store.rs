use std::collections::HashMap;

use tokio::sync::RwLock;

use super::CatalogError;
use crate::grpc::proto::{Filter, Laptop};

#[derive(Default)]
pub struct LaptopStore {
    laptops: RwLock<HashMap<String, Laptop>>,
}

impl LaptopStore {
    pub async fn save(&self, laptop: Laptop) -> Result<(), CatalogError> {
        let mut laptops = self.laptops.write().await;
        if laptops.contains_key(&laptop.id) {
            return Err(CatalogError::AlreadyExists(laptop.id));
        }
        laptops.insert(laptop.id.clone(), laptop);
        Ok(())
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.laptops.read().await.contains_key(id)
    }

    /// Matching laptops, cheapest first.
    pub async fn search(&self, filter: &Filter) -> Vec<Laptop> {
        let mut found: Vec<Laptop> = self
            .laptops
            .read()
            .await
            .values()
            .filter(|laptop| is_qualified(filter, laptop))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.price_usd.total_cmp(&b.price_usd));
        found
    }
}

/// Zero-valued filter fields impose no bound.
fn is_qualified(filter: &Filter, laptop: &Laptop) -> bool {
    (filter.max_price_usd <= 0.0 || laptop.price_usd <= filter.max_price_usd)
        && laptop.cpu_cores >= filter.min_cpu_cores
        && laptop.ram_gb >= filter.min_ram_gb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop(id: &str, price_usd: f64, cpu_cores: u32, ram_gb: u32) -> Laptop {
        Laptop {
            id: id.to_string(),
            brand: "Lenovo".to_string(),
            name: "Thinkpad".to_string(),
            cpu_cores,
            ram_gb,
            price_usd,
            release_year: 2021,
        }
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_id() {
        let store = LaptopStore::default();
        store.save(laptop("a", 1000.0, 4, 8)).await.unwrap();

        let err = store.save(laptop("a", 2000.0, 8, 16)).await.unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(id) if id == "a"));
        let stored = store.search(&Filter::default()).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price_usd, 1000.0);
    }

    #[tokio::test]
    async fn test_search_applies_filter() {
        let store = LaptopStore::default();
        store.save(laptop("cheap", 800.0, 4, 8)).await.unwrap();
        store.save(laptop("pricey", 3000.0, 8, 32)).await.unwrap();
        store.save(laptop("weak", 900.0, 2, 4)).await.unwrap();

        let filter = Filter {
            max_price_usd: 2000.0,
            min_cpu_cores: 4,
            min_ram_gb: 8,
        };
        let ids: Vec<String> = store.search(&filter).await.into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["cheap"]);

        let everything = store.search(&Filter::default()).await;
        let ids: Vec<&str> = everything.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["cheap", "weak", "pricey"]);
    }
}
