use rapidfast::prelude::*;
use rapidfast::ApplicationState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[controller]
struct HealthController;

#[routes]
impl HealthController {
    #[get("/health")]
    fn health(&self) -> Value {
        json!({ "status": "ok" })
    }
}

#[module(controllers = [HealthController], middlewares = [RequestLogger])]
struct AppModule;

async fn get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8(raw).unwrap()
}

#[tokio::test]
async fn serves_over_tcp_until_stopped() {
    let mut app = Application::new(AppConfig::default());
    app.register_module::<AppModule>().unwrap();

    let addr = app.start(0).await.unwrap();
    assert_eq!(app.state(), ApplicationState::Listening);

    let response = get(addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("application/json"));
    assert!(response.ends_with(r#"{"status":"ok"}"#), "{response}");

    let response = get(addr, "/nope").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    assert!(response.contains(r#""suggestedRoutes":["/health"]"#), "{response}");

    app.stop().await.unwrap();
    assert_eq!(app.state(), ApplicationState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}
