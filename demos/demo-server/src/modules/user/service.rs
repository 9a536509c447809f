use super::repository::UserRepository;
use rapidfast::prelude::*;

#[derive(Injectable)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub async fn list(&self) -> Result<Vec<Record>, HttpError> {
        Ok(self.repository.find_all().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Record, HttpError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| HttpError::not_found(format!("User {id} not found")))
    }

    pub async fn create(&self, data: Value) -> Result<Record, HttpError> {
        self.repository
            .create(data)
            .await
            .map_err(|e| match e {
                OrmError::Schema(e) => HttpError::bad_request(e.to_string()),
                other => HttpError::from(other),
            })
    }

    pub async fn remove(&self, id: i64) -> Result<(), HttpError> {
        if self.repository.delete(id).await? {
            Ok(())
        } else {
            Err(HttpError::not_found(format!("User {id} not found")))
        }
    }
}
