use sha1::{Digest, Sha1};

/// Length of a content id: a SHA-1 digest in hex
pub const CONTENT_ID_LEN: usize = 40;

/// Content identifier of `data`: lower-case hex SHA-1.
pub fn content_id(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|x| format!("{:02x}", x))
        .collect()
}

/// Whether `s` has the shape of a content id
pub fn is_content_id(s: &str) -> bool {
    s.len() == CONTENT_ID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
