//! A real goexec HTTP server on an ephemeral port

use anyhow::{Context, Result};
use goexec_sandbox::SandboxService;
use goexec_server::{start_server, AppState};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

/// Status code and parsed JSON body of one response
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub body: Value,
}

impl TestServer {
    pub async fn start(service: SandboxService) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind test listener")?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(start_server(listener, AppState::new(service), async move {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> Result<TestResponse> {
        let response = self.client.get(self.url(path)).send().await?;
        TestResponse::read(response).await
    }

    /// POST a raw body as JSON, so malformed payloads can be sent too
    pub async fn post(&self, path: &str, body: &str) -> Result<TestResponse> {
        let response = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        TestResponse::read(response).await
    }

    /// POST a typed JSON value and decode the JSON reply
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<TestResponse> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok(TestResponse { status, body })
    }

    /// Trigger graceful shutdown and wait for the server task to finish
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await?
    }
}

impl TestResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("Response body is not JSON: {:?}", text))?
        };
        Ok(Self { status, body })
    }
}
