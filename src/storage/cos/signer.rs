//! COS request signing (q-sign-algorithm=sha1).
//!
//! Reference: https://cloud.tencent.com/document/product/436/7778

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::collections::HashMap;
use urlencoding::{decode, encode};

type HmacSha1 = Hmac<Sha1>;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|x| format!("{:02x}", x)).collect()
}

fn hmac_sha1_hex(key: &[u8], message: &str) -> String {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    to_hex(&mac.finalize().into_bytes())
}

/// Signs one request: method, path, signed headers and query parameters
pub struct Signer<'a> {
    method: &'a str,
    url_path: &'a str,
    headers: Option<&'a HeaderMap>,
    query: Option<&'a HashMap<String, String>>,
}

impl<'a> Signer<'a> {
    pub fn new(
        method: &'a str,
        url_path: &'a str,
        headers: Option<&'a HeaderMap>,
        query: Option<&'a HashMap<String, String>>,
    ) -> Self {
        Self {
            method,
            url_path,
            headers,
            query,
        }
    }

    fn get_key_time(valid_seconds: u32) -> String {
        let start = Utc::now().timestamp();
        let end = start + valid_seconds as i64;
        format!("{};{}", start, end)
    }

    /// Lower-cased, url-encoded keys with encoded values, sorted by key
    fn encode_pairs<'b, I>(pairs: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (&'b str, &'b str)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (encode(k).to_lowercase(), encode(v).into_owned()))
            .collect()
    }

    fn query_pairs(&self) -> BTreeMap<String, String> {
        match self.query {
            Some(query) => Self::encode_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            None => BTreeMap::new(),
        }
    }

    fn header_pairs(&self) -> BTreeMap<String, String> {
        match self.headers {
            Some(headers) => Self::encode_pairs(
                headers
                    .iter()
                    .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v))),
            ),
            None => BTreeMap::new(),
        }
    }

    fn key_list(pairs: &BTreeMap<String, String>) -> String {
        pairs.keys().cloned().collect::<Vec<_>>().join(";")
    }

    fn joined(pairs: &BTreeMap<String, String>) -> String {
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn get_http_string(&self) -> String {
        let path = decode(self.url_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.url_path.to_string());
        format!(
            "{}\n{}\n{}\n{}\n",
            self.method.to_lowercase(),
            path,
            Self::joined(&self.query_pairs()),
            Self::joined(&self.header_pairs())
        )
    }

    fn get_string_to_sign(&self, key_time: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.get_http_string().as_bytes());
        format!("sha1\n{}\n{}\n", key_time, to_hex(&hasher.finalize()))
    }

    /// Value for the `Authorization` header, valid for `valid_seconds`
    pub fn get_signature(&self, secret_key: &str, secret_id: &str, valid_seconds: u32) -> String {
        let key_time = Self::get_key_time(valid_seconds);
        self.signature_at(secret_key, secret_id, &key_time)
    }

    fn signature_at(&self, secret_key: &str, secret_id: &str, key_time: &str) -> String {
        let sign_key = hmac_sha1_hex(secret_key.as_bytes(), key_time);
        let signature = hmac_sha1_hex(sign_key.as_bytes(), &self.get_string_to_sign(key_time));
        format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={}&q-key-time={}&q-header-list={}&q-url-param-list={}&q-signature={}",
            secret_id,
            key_time,
            key_time,
            Self::key_list(&self.header_pairs()),
            Self::key_list(&self.query_pairs()),
            signature
        )
    }
}
