//! Thin wrapper turning a reqwest round trip into a [`Response`].

use reqwest::RequestBuilder;
use std::fmt::Display;

/// Error codes
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrNo {
    SUCCESS = 0,
    OTHER = 10000,
    /// Non-2xx HTTP status
    STATUS = 10001,
    DECODE = 10002,
    CONNECT = 10003,
    ENCODE = 20001,
}

impl Display for ErrNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

/// Outcome of one COS call
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub error_no: ErrNo,
    pub error_message: String,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub result: Vec<u8>,
}

impl Default for ErrNo {
    fn default() -> Self {
        ErrNo::SUCCESS
    }
}

impl From<reqwest::Error> for Response {
    fn from(value: reqwest::Error) -> Self {
        let error_no = if value.is_status() {
            ErrNo::STATUS
        } else if value.is_connect() {
            ErrNo::CONNECT
        } else if value.is_decode() {
            ErrNo::DECODE
        } else {
            ErrNo::OTHER
        };
        Response {
            error_no,
            error_message: value.to_string(),
            status: value.status().map(|s| s.as_u16()).unwrap_or(0),
            ..Default::default()
        }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            r#"{{"error_no": "{}","status": {},"error_message": "{}","result": "{}"}}"#,
            self.error_no as i32,
            self.status,
            self.error_message,
            String::from_utf8_lossy(&self.result)
        )
    }
}

impl Response {
    pub fn new(error_no: ErrNo, error_message: String) -> Self {
        Self {
            error_no,
            error_message,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_no == ErrNo::SUCCESS
    }

    pub fn is_not_found(&self) -> bool {
        self.error_no == ErrNo::STATUS && self.status == 404
    }
}

/// Send the request and collect status and body.
pub async fn send(req: RequestBuilder) -> Response {
    match do_req(req).await {
        Ok(resp) | Err(resp) => resp,
    }
}

async fn do_req(req: RequestBuilder) -> Result<Response, Response> {
    let resp = req.send().await?;
    let status_code = resp.status();

    let mut error_no = ErrNo::SUCCESS;
    let mut message = String::new();
    if status_code.is_client_error() || status_code.is_server_error() {
        error_no = ErrNo::STATUS;
        message = status_code.to_string();
    }

    Ok(Response {
        error_no,
        error_message: message,
        status: status_code.as_u16(),
        result: resp.bytes().await?.to_vec(),
    })
}
