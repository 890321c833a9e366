use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::promo_codes::PromoCodeEntity;

#[async_trait]
#[automock]
pub trait PromoCodeRepository {
    /// Case-insensitive lookup. Redeemability is checked by the caller.
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCodeEntity>>;
}
