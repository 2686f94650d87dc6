//! The Publish Envelope Builder: assembles the multipart body a `PUT
//! /{scope}/{name}/{version}` publish request sends.
//!
//! `reqwest::multipart::Form` generates its own boundary and cannot be
//! told to emit a specific `Content-Transfer-Encoding` per part, so this
//! builder constructs the multipart body directly as bytes instead.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use uuid::Uuid;

use crate::error::{RegistryClientError, RegistryResult};
use crate::model::SigningInfo;

/// Everything a publish request may carry.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// The release's source archive bytes.
    pub source_archive: Vec<u8>,
    /// A detached signature over `source_archive`, if signing is enabled.
    pub source_archive_signature: Option<SigningInfo>,
    /// The release metadata JSON document, if supplied.
    pub metadata_json: Option<String>,
    /// A detached signature over `metadata_json`, if signing is enabled.
    pub metadata_signature: Option<SigningInfo>,
}

/// A ready-to-send multipart request body and its `Content-Type` header
/// value (which embeds the boundary).
#[derive(Debug, Clone)]
pub struct PublishEnvelope {
    /// The `Content-Type` header value, e.g.
    /// `multipart/form-data; boundary="..."`.
    pub content_type: String,
    /// The complete request body.
    pub body: Vec<u8>,
}

/// How the registry responded to an accepted publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    /// `201 Created`: the release is published immediately.
    Published {
        /// The `Location` header, if the registry supplied one.
        location: Option<String>,
    },
    /// `202 Accepted`: the release is queued for asynchronous processing.
    Processing {
        /// The `Location` header the caller polls for status.
        status_url: String,
    },
}

struct MultipartWriter {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartWriter {
    fn new() -> Self {
        Self { boundary: Uuid::new_v4().to_string(), body: Vec::new() }
    }

    fn push_part(&mut self, name: &str, content_type: &str, transfer_encoding: &str, content: &[u8]) {
        self.body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes());
        self.body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        self.body.extend_from_slice(format!("Content-Transfer-Encoding: {transfer_encoding}\r\n\r\n").as_bytes());
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
    }

    fn finish(mut self) -> PublishEnvelope {
        self.body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        PublishEnvelope {
            content_type: format!("multipart/form-data; boundary=\"{}\"", self.boundary),
            body: self.body,
        }
    }
}

/// Builds the multipart body for a publish request.
///
/// # Errors
///
/// Returns [`RegistryClientError::InvalidSignature`] if a supplied
/// signature's `signature_base64` is not valid base64.
pub fn build_envelope(request: &PublishRequest) -> RegistryResult<PublishEnvelope> {
    let mut writer = MultipartWriter::new();

    writer.push_part("source-archive", "application/zip", "binary", &request.source_archive);

    if let Some(signature) = &request.source_archive_signature {
        let bytes = decode_signature(signature)?;
        writer.push_part("source-archive-signature", "application/octet-stream", "binary", &bytes);
    }

    if let Some(metadata) = &request.metadata_json {
        let encoded = quoted_printable_encode(metadata.as_bytes());
        writer.push_part("metadata", "application/json", "quoted-printable", &encoded);
    }

    if let Some(signature) = &request.metadata_signature {
        let bytes = decode_signature(signature)?;
        writer.push_part("metadata-signature", "application/octet-stream", "binary", &bytes);
    }

    Ok(writer.finish())
}

/// Quoted-printable encodes `bytes` per RFC 2045 §6.7: printable ASCII
/// passes through unchanged, `=` and non-printable bytes become `=XX`
/// hex escapes, and lines are soft-wrapped at 76 characters so a
/// conformant MIME parser decodes back the exact original bytes.
fn quoted_printable_encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut line_len = 0usize;

    let mut push = |out: &mut Vec<u8>, line_len: &mut usize, chunk: &[u8]| {
        if *line_len + chunk.len() > 75 {
            out.extend_from_slice(b"=\r\n");
            *line_len = 0;
        }
        out.extend_from_slice(chunk);
        *line_len += chunk.len();
    };

    for &byte in bytes {
        match byte {
            b'\r' | b'\n' => {
                out.push(byte);
                line_len = 0;
            }
            b'=' => push(&mut out, &mut line_len, format!("={byte:02X}").as_bytes()),
            0x20..=0x7e => push(&mut out, &mut line_len, &[byte]),
            other => push(&mut out, &mut line_len, format!("={other:02X}").as_bytes()),
        }
    }

    out
}

fn decode_signature(signature: &SigningInfo) -> RegistryResult<Vec<u8>> {
    BASE64.decode(&signature.signature_base64).map_err(|e| RegistryClientError::InvalidSignature {
        package: None,
        version: None,
        reason: format!("signature is not valid base64: {e}"),
    })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn body_as_string(envelope: &PublishEnvelope) -> String {
        String::from_utf8_lossy(&envelope.body).into_owned()
    }

    #[test]
    fn minimal_envelope_contains_only_source_archive() {
        let request = PublishRequest {
            source_archive: b"zip bytes".to_vec(),
            source_archive_signature: None,
            metadata_json: None,
            metadata_signature: None,
        };
        let envelope = build_envelope(&request).unwrap();
        let body = body_as_string(&envelope);

        assert!(body.contains("name=\"source-archive\""));
        assert!(body.contains("Content-Transfer-Encoding: binary"));
        assert!(!body.contains("name=\"metadata\""));
        assert!(envelope.content_type.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn full_envelope_contains_every_part_in_order() {
        let signature = SigningInfo { signature_base64: BASE64.encode(b"sig bytes"), signature_format: "cms-1.0.0".into() };
        let request = PublishRequest {
            source_archive: b"zip bytes".to_vec(),
            source_archive_signature: Some(signature.clone()),
            metadata_json: Some("{\"author\":\"mona\"}".to_string()),
            metadata_signature: Some(signature),
        };
        let envelope = build_envelope(&request).unwrap();
        let body = body_as_string(&envelope);

        let archive_pos = body.find("name=\"source-archive\"").unwrap();
        let archive_sig_pos = body.find("name=\"source-archive-signature\"").unwrap();
        let metadata_pos = body.find("name=\"metadata\"").unwrap();
        let metadata_sig_pos = body.find("name=\"metadata-signature\"").unwrap();

        assert!(archive_pos < archive_sig_pos);
        assert!(archive_sig_pos < metadata_pos);
        assert!(metadata_pos < metadata_sig_pos);
        assert!(body.trim_end().ends_with("--"));
    }

    #[test]
    fn boundary_is_a_bare_uuid() {
        let request =
            PublishRequest { source_archive: b"zip bytes".to_vec(), source_archive_signature: None, metadata_json: None, metadata_signature: None };
        let envelope = build_envelope(&request).unwrap();
        let boundary = envelope.content_type.strip_prefix("multipart/form-data; boundary=\"").unwrap().strip_suffix('"').unwrap();
        assert!(Uuid::parse_str(boundary).is_ok());
    }

    #[test]
    fn metadata_part_is_quoted_printable_and_round_trips() {
        let metadata = "{\"author\":\"mona\",\"note\":\"100% = done\"}".to_string();
        let request = PublishRequest {
            source_archive: b"zip bytes".to_vec(),
            source_archive_signature: None,
            metadata_json: Some(metadata.clone()),
            metadata_signature: None,
        };
        let envelope = build_envelope(&request).unwrap();
        let body = body_as_string(&envelope);

        assert!(body.contains("Content-Transfer-Encoding: quoted-printable"));
        assert!(body.contains("=3D"));

        let encoded = quoted_printable_encode(metadata.as_bytes());
        let decoded = quoted_printable_decode(&encoded);
        assert_eq!(decoded, metadata.as_bytes());
    }

    fn quoted_printable_decode(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'=' {
                if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
                    i += 3;
                    continue;
                }
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        out
    }

    #[test]
    fn invalid_base64_signature_is_rejected() {
        let request = PublishRequest {
            source_archive: b"zip bytes".to_vec(),
            source_archive_signature: Some(SigningInfo { signature_base64: "not base64!!".into(), signature_format: "cms-1.0.0".into() }),
            metadata_json: None,
            metadata_signature: None,
        };
        let err = build_envelope(&request).unwrap_err();
        assert!(matches!(err, RegistryClientError::InvalidSignature { .. }));
    }
}
