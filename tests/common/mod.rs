//! Common test utilities: a wiremock-backed gist, calendar host and
//! notification endpoint

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const GIST_ID: &str = "abc123";
pub const DOCUMENT_FILE: &str = "ctxs.json5";
pub const NOTIFY_PATH: &str = "/api/notify";

/// One mock server playing every remote party of a run
pub struct RemoteFixture {
    pub server: MockServer,
}

impl RemoteFixture {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn calendar_url(&self, name: &str) -> String {
        format!("{}/calendars/{name}.csv", self.server.uri())
    }

    pub fn notify_endpoint(&self) -> String {
        format!("{}{NOTIFY_PATH}", self.server.uri())
    }

    /// Serve `document` as the content of the context file
    pub async fn with_document(self, document: &str) -> Self {
        Mock::given(method("GET"))
            .and(path(format!("/gists/{GIST_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": GIST_ID,
                "files": { DOCUMENT_FILE: { "content": document, "truncated": false } }
            })))
            .mount(&self.server)
            .await;
        self
    }

    /// Accept writes of the context document
    pub async fn with_writable_gist(self) -> Self {
        Mock::given(method("PATCH"))
            .and(path(format!("/gists/{GIST_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": GIST_ID })))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn with_calendar(self, name: &str, csv: &str) -> Self {
        Mock::given(method("GET"))
            .and(path(format!("/calendars/{name}.csv")))
            .respond_with(ResponseTemplate::new(200).set_body_string(csv))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn with_notify_endpoint(self) -> Self {
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": 200, "message": "ok" })),
            )
            .mount(&self.server)
            .await;
        self
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Bodies of every notification posted, form-encoded
    pub async fn notifications(&self) -> Vec<String> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == NOTIFY_PATH)
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    /// Documents written back to the gist, parsed
    pub async fn written_documents(&self) -> Vec<Value> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.as_str() == "PATCH")
            .map(|r| {
                let body: Value = r.body_json().unwrap();
                let content = body["files"][DOCUMENT_FILE]["content"].as_str().unwrap().to_string();
                serde_json::from_str(&content).unwrap()
            })
            .collect()
    }
}

/// Calendar with the same message on every day of the month
pub fn every_day_calendar(message: &str) -> String {
    let mut csv = String::from("date,message\n");
    for day in 1..=31 {
        csv.push_str(&format!("{day},{message}\n"));
    }
    csv
}
