use rapidfast::prelude::*;

#[controller]
pub struct HealthController;

#[routes]
impl HealthController {
    #[get("/health")]
    fn health(&self) -> Value {
        json!({ "status": "ok" })
    }
}
