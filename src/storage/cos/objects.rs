//! Object operations: upload, download and existence checks.
//!
//! Reference: https://cloud.tencent.com/document/product/436/7749

use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::RequestBuilder;

use crate::storage::cos::client::{header_value, Client};
use crate::storage::cos::request::{send, Response};

impl Client {
    /// PUT an in-memory object
    pub async fn put_object_binary(&self, data: Bytes, key: &str) -> Response {
        match self.put_object_request(data, key) {
            Ok(req) => send(req).await,
            Err(resp) => resp,
        }
    }

    /// Signed PUT request; blobs are stored as opaque octet streams
    fn put_object_request(&self, data: Bytes, key: &str) -> Result<RequestBuilder, Response> {
        let url_path = self.get_path_from_object_key(key);
        let mut headers = self.get_common_headers()?;
        headers.insert(
            CONTENT_TYPE,
            header_value(mime::APPLICATION_OCTET_STREAM.as_ref())?,
        );
        headers.insert(CONTENT_LENGTH, data.len().into());
        let headers = self.authorize("put", &url_path, headers)?;

        Ok(self
            .http()
            .put(self.get_full_url_from_path(&url_path))
            .headers(headers)
            .body(data))
    }

    /// GET an object into memory
    pub async fn get_object_binary(&self, key: &str) -> Response {
        let url_path = self.get_path_from_object_key(key);
        let headers = match self
            .get_common_headers()
            .and_then(|headers| self.authorize("get", &url_path, headers))
        {
            Ok(headers) => headers,
            Err(resp) => return resp,
        };

        let req = self
            .http()
            .get(self.get_full_url_from_path(&url_path))
            .headers(headers);
        send(req).await
    }

    /// HEAD an object
    pub async fn head_object(&self, key: &str) -> Response {
        let url_path = self.get_path_from_object_key(key);
        let headers = match self
            .get_common_headers()
            .and_then(|headers| self.authorize("head", &url_path, headers))
        {
            Ok(headers) => headers,
            Err(resp) => return resp,
        };

        let req = self
            .http()
            .head(self.get_full_url_from_path(&url_path))
            .headers(headers);
        send(req).await
    }
}
