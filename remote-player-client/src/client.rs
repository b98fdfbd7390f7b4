use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{
    Method, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt::Debug, time::Duration};
use tracing::{debug, instrument};

/// One call inside a request. Batches are sent as arrays and answered
/// positionally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn without_params(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }

    fn to_json(&self, id: usize) -> Value {
        let mut value = json!({
            "jsonrpc": "2.0",
            "method": self.method,
            "id": id,
        });

        if !self.params.is_null() {
            value["params"] = self.params.clone();
        }

        value
    }
}

/// A single entry of a batch response.
pub type Response = Result<Value>;

#[async_trait]
pub trait RpcTransport: Send + Sync + Debug {
    /// Sends every request in one round trip. The returned vector has one
    /// entry per request, in request order.
    async fn batch(&self, requests: Vec<Request>) -> Result<Vec<Response>>;

    async fn call(&self, request: Request) -> Result<Value> {
        let mut responses = self.batch(vec![request]).await?;

        match responses.pop() {
            Some(response) => response,
            None => Err(Error::Batch {
                message: "empty response".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl Client {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let endpoint = url::Url::parse(&format!("http://{host}:{port}/jsonrpc"))
            .map_err(|error| Error::Http {
                message: error.to_string(),
            })?
            .to_string();

        Ok(Self {
            client,
            endpoint,
            username,
            password,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_post_call(&self, body: String) -> Result<String> {
        debug!("calling {} with {body}", self.endpoint);
        let mut request = self.client.request(Method::POST, &self.endpoint).body(body);

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;

        if response.status() == StatusCode::OK {
            Ok(response.text().await?)
        } else {
            Err(Error::Status {
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl RpcTransport for Client {
    #[instrument(skip(self, requests), fields(len = requests.len()))]
    async fn batch(&self, requests: Vec<Request>) -> Result<Vec<Response>> {
        if requests.is_empty() {
            return Ok(vec![]);
        }

        let body = if requests.len() == 1 {
            requests[0].to_json(0)
        } else {
            Value::Array(
                requests
                    .iter()
                    .enumerate()
                    .map(|(id, request)| request.to_json(id))
                    .collect(),
            )
        };

        let response = self.make_post_call(body.to_string()).await?;
        correlate(requests.len(), &response)
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    id: Option<Value>,
    result: Option<Value>,
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: i64,
    message: String,
}

/// Puts every entry of `body` back at the position of the request with the
/// same id.
pub fn correlate(expected: usize, body: &str) -> Result<Vec<Response>> {
    let value: Value = serde_json::from_str(body)?;

    let raw: Vec<RawResponse> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };

    let mut responses: Vec<Option<Response>> = (0..expected).map(|_| None).collect();

    for (index, entry) in raw.into_iter().enumerate() {
        let id = match &entry.id {
            Some(Value::Number(number)) => number.as_u64().map(|id| id as usize),
            Some(Value::String(string)) => string.parse::<usize>().ok(),
            _ => None,
        }
        .unwrap_or(index);

        let Some(slot) = responses.get_mut(id) else {
            return Err(Error::Batch {
                message: format!("unexpected response id {id}"),
            });
        };

        *slot = Some(match (entry.result, entry.error) {
            (_, Some(error)) => Err(Error::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        });
    }

    responses
        .into_iter()
        .enumerate()
        .map(|(id, response)| {
            response.ok_or_else(|| Error::Batch {
                message: format!("missing response for request {id}"),
            })
        })
        .collect()
}
