use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::UserProfileEntity;

#[async_trait]
#[automock]
pub trait UserProfileRepository {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfileEntity>>;
}
