//! COS client: endpoint addressing and request authorization.

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, DATE, HOST};
use std::time::Duration;

use crate::config::CosConfig;
use crate::storage::cos::request::{ErrNo, Response};
use crate::storage::cos::signer::Signer;

/// Seconds a request signature stays valid
const SIGNATURE_TTL: u32 = 7200;

#[derive(Debug, Clone)]
pub struct Client {
    secret_id: String,
    secret_key: String,
    host: String,
    scheme: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(config: &CosConfig) -> Result<Self, reqwest::Error> {
        let (scheme, host) = match config.endpoint.as_deref() {
            Some(endpoint) => split_endpoint(endpoint),
            None => (
                "https".to_string(),
                format!("{}.cos.{}.myqcloud.com", config.bucket, config.region),
            ),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            secret_id: config.secret_id.clone(),
            secret_key: config.secret_key.clone(),
            host,
            scheme,
            http,
        })
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Host and Date headers every request carries
    pub fn get_common_headers(&self) -> Result<HeaderMap, Response> {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, header_value(&self.host)?);
        let now_str = Utc::now().format("%a, %d %b %Y %T GMT").to_string();
        headers.insert(DATE, header_value(&now_str)?);
        Ok(headers)
    }

    /// Absolute URL for a request path on this bucket's host
    pub fn get_full_url_from_path(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }

    /// Request path for an object key, always rooted at `/`
    pub fn get_path_from_object_key(&self, key: &str) -> String {
        if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{}", key)
        }
    }

    /// Sign `headers` for `method` on `url_path` and add the Authorization header
    pub fn authorize(
        &self,
        method: &str,
        url_path: &str,
        mut headers: HeaderMap,
    ) -> Result<HeaderMap, Response> {
        let signature = Signer::new(method, url_path, Some(&headers), None).get_signature(
            &self.secret_key,
            &self.secret_id,
            SIGNATURE_TTL,
        );
        headers.insert(AUTHORIZATION, header_value(&signature)?);
        Ok(headers)
    }
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue, Response> {
    HeaderValue::from_str(value)
        .map_err(|e| Response::new(ErrNo::ENCODE, format!("Invalid header value: {}", e)))
}

/// `http://minio:9000/` -> ("http", "minio:9000"); bare hosts default to https
fn split_endpoint(endpoint: &str) -> (String, String) {
    let endpoint = endpoint.trim().trim_end_matches('/');
    match endpoint.split_once("://") {
        Some((scheme, host)) => (scheme.to_lowercase(), host.to_string()),
        None => ("https".to_string(), endpoint.to_string()),
    }
}
