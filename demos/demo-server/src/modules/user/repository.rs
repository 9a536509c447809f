use rapidfast::orm::OrmResult;
use rapidfast::prelude::*;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> OrmResult<Vec<Record>>;
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Record>>;
    async fn create(&self, data: Value) -> OrmResult<Record>;
    async fn delete(&self, id: i64) -> OrmResult<bool>;
}

#[derive(Injectable)]
pub struct ModelUserRepository {
    #[inject("users")]
    users: Arc<Model>,
}

#[async_trait]
impl UserRepository for ModelUserRepository {
    async fn find_all(&self) -> OrmResult<Vec<Record>> {
        self.users.find(json!({})).await
    }

    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Record>> {
        self.users.find_by_id(id).await
    }

    async fn create(&self, data: Value) -> OrmResult<Record> {
        self.users.create(data).await
    }

    async fn delete(&self, id: i64) -> OrmResult<bool> {
        self.users.delete_by_id(id).await
    }
}
