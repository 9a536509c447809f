use super::guard::RequireApiKey;
use super::service::UserService;
use rapidfast::prelude::*;

#[controller("/users")]
pub struct UserController {
    service: Arc<UserService>,
}

fn id_of(req: &Request) -> Result<i64, HttpError> {
    req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| HttpError::bad_request("id must be an integer"))
}

#[routes]
impl UserController {
    #[get]
    async fn list(&self) -> Result<Vec<Record>, HttpError> {
        self.service.list().await
    }

    #[get("/:id")]
    async fn find(&self, #[req] req: Request) -> Result<Record, HttpError> {
        self.service.get(id_of(&req)?).await
    }

    #[post]
    #[use_middlewares(RequireApiKey)]
    async fn create(&self, #[req] req: Request, #[res] res: Response) -> Result<(), HttpError> {
        let user = self.service.create(req.json()?).await?;
        res.status(StatusCode::CREATED).json(&user);
        Ok(())
    }

    #[delete("/:id")]
    #[use_middlewares(RequireApiKey)]
    async fn remove(&self, #[req] req: Request, #[res] res: Response) -> Result<(), HttpError> {
        self.service.remove(id_of(&req)?).await?;
        res.status(StatusCode::NO_CONTENT).end();
        Ok(())
    }
}
