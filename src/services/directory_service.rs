use chrono::Duration;
use std::sync::Arc;

use crate::database::RecordStore;
use crate::errors::Result;
use crate::models::user::email_local_part;
use crate::utils::cache::TtlCache;
use crate::utils::clock::Clock;

/// Resolves the name shown next to a seller's listings.
///
/// Lookups go through a bounded cache owned by this directory; entries
/// expire so renamed sellers show up within one TTL.
pub struct SellerDirectory {
    records: Arc<dyn RecordStore>,
    cache: TtlCache<String, String>,
}

impl SellerDirectory {
    pub fn new(records: Arc<dyn RecordStore>, capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            cache: TtlCache::new(capacity, ttl, clock),
        }
    }

    pub async fn display_name(&self, email: &str) -> Result<String> {
        let key = email.trim().to_lowercase();
        if let Some(name) = self.cache.get(&key) {
            return Ok(name);
        }

        let name = match self.records.get_user_by_email(&key).await? {
            Some(user) => user.public_name(),
            // Unknown sellers are not cached so a later registration shows up.
            None => return Ok(email_local_part(&key).to_string()),
        };
        self.cache.insert(key, name.clone());
        Ok(name)
    }

    pub fn forget(&self, email: &str) {
        self.cache.invalidate(&email.trim().to_lowercase());
    }
}
