use rapidfast::prelude::*;

/// Rejects requests without the configured `x-api-key` header.
#[middleware]
pub struct RequireApiKey {
    #[inject("api_key")]
    key: String,
}

#[async_trait]
impl Middleware for RequireApiKey {
    async fn handle(&self, request: Request, _response: Response, next: Next) -> HandlerResult {
        if request.header("x-api-key") == Some(self.key.as_str()) {
            next.run(request).await
        } else {
            Err(HttpError::unauthorized("missing or invalid x-api-key header"))
        }
    }
}
