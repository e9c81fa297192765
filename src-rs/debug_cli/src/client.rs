use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    CancelResponse, ErrorBody, Listing, ReportEntry, Selection, SubmitResponse, Suggestion,
    SuggestionsResponse, TaskView,
};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers(token.as_deref()))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn submit<T: Serialize>(&self, category: &str, body: &T) -> Result<SubmitResponse, String> {
        json(self.client.post(self.url(&format!("jobs/{category}"))).json(body))
    }

    pub fn cancel(&self, category: &str) -> Result<CancelResponse, String> {
        json(self.client.post(self.url(&format!("jobs/{category}/cancel"))))
    }

    pub fn view(&self, category: &str, log_offset: usize) -> Result<TaskView, String> {
        json(
            self.client
                .get(self.url(&format!("jobs/{category}")))
                .query(&[("log_offset", log_offset)]),
        )
    }

    pub fn list_reports(&self, path: &str) -> Result<Listing, String> {
        json(self.client.get(self.url("reports")).query(&[("path", path)]))
    }

    pub fn open_report(&self, path: &str) -> Result<String, String> {
        let resp = checked(self.client.get(self.url(&format!("reports/{path}"))))?;
        resp.text().map_err(|err| err.to_string())
    }

    pub fn delete_report(&self, path: &str) -> Result<Listing, String> {
        json(self.client.delete(self.url(&format!("reports/{path}"))))
    }

    pub fn open_entry(&self, entry: &ReportEntry) -> Result<Selection, String> {
        json(self.client.post(self.url("browse/open")).json(entry))
    }

    pub fn download(&self, path: &str) -> Result<Vec<u8>, String> {
        let resp = checked(self.client.get(self.url(&format!("downloads/{path}"))))?;
        resp.bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| err.to_string())
    }

    pub fn suggestions(&self, research_goal: Option<&str>) -> Result<Vec<Suggestion>, String> {
        let mut req = self.client.get(self.url("automation/suggestions"));
        if let Some(goal) = research_goal {
            req = req.query(&[("research_goal", goal)]);
        }
        json::<SuggestionsResponse>(req).map(|resp| resp.suggestions)
    }
}

fn headers(token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(AUTHORIZATION, value);
        }
    }
    headers
}

fn checked(req: RequestBuilder) -> Result<Response, String> {
    let resp = req.send().map_err(|err| err.to_string())?;
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|err| err.error.or_else(|| err.detail.map(|d| d.to_string())))
        .unwrap_or(body);
    Err(format!("http {}: {}", status.as_u16(), message))
}

fn json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, String> {
    checked(req)?.json::<T>().map_err(|err| err.to_string())
}
