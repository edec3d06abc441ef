//! Event Hubs connection strings and Shared Access Signature tokens.
//!
//! A connection string looks like
//! `Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<policy>;SharedAccessKey=<key>[;EntityPath=<hub>]`.
//! Requests are authorized with a token signed from the key, or with a
//! pre-built `SharedAccessSignature` carried in the string itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::producer::ProducerError;

type HmacSha256 = Hmac<Sha256>;

/// How requests are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Named policy and key; tokens are signed locally
    SharedKey { key_name: String, key: String },

    /// Ready-made token used verbatim
    SharedAccessSignature(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey { key_name, .. } => f
                .debug_struct("SharedKey")
                .field("key_name", key_name)
                .field("key", &"<redacted>")
                .finish(),
            Credential::SharedAccessSignature(_) => {
                f.write_str("SharedAccessSignature(<redacted>)")
            }
        }
    }
}

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Host (and optional port) of the namespace, without scheme or path
    pub host: String,

    pub credential: Credential,

    /// Event Hub named by the connection string, if any
    pub entity_path: Option<String>,

    /// Talk plain HTTP to a local emulator instead of HTTPS
    pub use_development_emulator: bool,
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// Keys are matched case-insensitively; unknown keys are ignored.
    pub fn parse(raw: &str) -> Result<Self, ProducerError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut signature = None;
        let mut entity_path = None;
        let mut use_development_emulator = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                invalid("Connection string is either blank or malformed.")
            })?;
            let value = value.trim();

            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.to_string()),
                "sharedaccesskeyname" => key_name = Some(value.to_string()),
                "sharedaccesskey" => key = Some(value.to_string()),
                "sharedaccesssignature" => signature = Some(value.to_string()),
                "entitypath" => entity_path = Some(value.to_string()).filter(|v| !v.is_empty()),
                "usedevelopmentemulator" => {
                    use_development_emulator = value.eq_ignore_ascii_case("true")
                }
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            invalid("Connection string is either blank or malformed.")
        })?;
        let host = parse_host(&endpoint)?;

        let credential = match (key_name, key, signature) {
            (_, _, Some(token)) if !token.is_empty() => Credential::SharedAccessSignature(token),
            (Some(key_name), Some(key), _) if !key_name.is_empty() && !key.is_empty() => {
                Credential::SharedKey { key_name, key }
            }
            _ => {
                return Err(invalid(
                    "At least one of the SharedAccessKeyName and SharedAccessKey pair, \
                     or SharedAccessSignature must be provided.",
                ))
            }
        };

        Ok(Self {
            host,
            credential,
            entity_path,
            use_development_emulator,
        })
    }

    /// Pick the Event Hub to publish to.
    ///
    /// An `EntityPath` in the connection string must agree with the requested
    /// name.
    pub fn resolve_event_hub<'a>(&'a self, requested: &'a str) -> Result<&'a str, ProducerError> {
        match self.entity_path.as_deref() {
            Some(entity) if !requested.is_empty() && entity != requested => Err(invalid(format!(
                "The Event Hub name '{}' does not match the EntityPath '{}' in the connection string.",
                requested, entity
            ))),
            Some(entity) if requested.is_empty() => Ok(entity),
            _ => Ok(requested),
        }
    }

    /// URL scheme for HTTP requests to this namespace.
    pub fn scheme(&self) -> &'static str {
        if self.use_development_emulator {
            "http"
        } else {
            "https"
        }
    }
}

fn invalid(message: impl Into<String>) -> ProducerError {
    ProducerError::InvalidConnectionString(message.into())
}

// `sb://host[:port]/` -> `host[:port]`
fn parse_host(endpoint: &str) -> Result<String, ProducerError> {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();

    if host.is_empty() {
        return Err(invalid(format!("Invalid endpoint '{}'", endpoint)));
    }

    Ok(host.to_string())
}

/// Form-URL-encode a value the way SAS tokens expect.
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Build a Shared Access Signature token for `resource_uri`, valid until the
/// Unix timestamp `expiry`.
pub fn generate_sas_token(
    resource_uri: &str,
    key_name: &str,
    key: &str,
    expiry: i64,
) -> Result<String, ProducerError> {
    let encoded_uri = encode(resource_uri);
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ProducerError::Client(format!("cannot sign token: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        encoded_uri,
        encode(&signature),
        expiry,
        encode(key_name)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=c2VjcmV0LWtleQ==";

    #[test]
    fn test_parse_shared_key() {
        let parsed = ConnectionString::parse(CONN).unwrap();
        assert_eq!(parsed.host, "contoso.servicebus.windows.net");
        assert_eq!(
            parsed.credential,
            Credential::SharedKey {
                key_name: "RootManageSharedAccessKey".to_string(),
                key: "c2VjcmV0LWtleQ==".to_string(),
            }
        );
        assert!(parsed.entity_path.is_none());
        assert_eq!(parsed.scheme(), "https");
    }

    #[test]
    fn test_parse_keys_case_insensitive_with_entity_path() {
        let parsed = ConnectionString::parse(
            "endpoint=sb://contoso.servicebus.windows.net/;sharedaccesskeyname=send;sharedaccesskey=k;entitypath=weather;",
        )
        .unwrap();
        assert_eq!(parsed.entity_path.as_deref(), Some("weather"));
    }

    #[test]
    fn test_parse_signature_and_emulator() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://127.0.0.1:5300;SharedAccessSignature=SharedAccessSignature sr=x&sig=y&se=1&skn=z;UseDevelopmentEmulator=true",
        )
        .unwrap();
        assert_eq!(parsed.host, "127.0.0.1:5300");
        assert!(parsed.use_development_emulator);
        assert_eq!(parsed.scheme(), "http");
        assert!(matches!(
            parsed.credential,
            Credential::SharedAccessSignature(ref t) if t.ends_with("skn=z")
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "",
            "garbage",
            "SharedAccessKeyName=a;SharedAccessKey=b",
            "Endpoint=sb://contoso.servicebus.windows.net/",
            "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=a",
            "Endpoint=sb:///;SharedAccessKeyName=a;SharedAccessKey=b",
        ] {
            let result = ConnectionString::parse(raw);
            assert!(
                matches!(result, Err(ProducerError::InvalidConnectionString(_))),
                "expected failure for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_resolve_event_hub() {
        let plain = ConnectionString::parse(CONN).unwrap();
        assert_eq!(plain.resolve_event_hub("eh-streaming").unwrap(), "eh-streaming");

        let scoped = ConnectionString::parse(&format!("{};EntityPath=weather", CONN)).unwrap();
        assert_eq!(scoped.resolve_event_hub("weather").unwrap(), "weather");
        assert_eq!(scoped.resolve_event_hub("").unwrap(), "weather");

        let err = scoped.resolve_event_hub("eh-streaming").unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_sas_token_known_vector() {
        let token = generate_sas_token(
            "https://contoso.servicebus.windows.net/eh-streaming",
            "RootManageSharedAccessKey",
            "c2VjcmV0LWtleQ==",
            1_700_000_000,
        )
        .unwrap();
        assert_eq!(
            token,
            "SharedAccessSignature sr=https%3A%2F%2Fcontoso.servicebus.windows.net%2Feh-streaming\
             &sig=Klvvfd65t4uuUf%2BKYoI9W1CQGIhqdBg6KbjG4oQ636w%3D&se=1700000000&skn=RootManageSharedAccessKey"
        );
    }

    #[test]
    fn test_credential_debug_redacts_key() {
        let parsed = ConnectionString::parse(CONN).unwrap();
        let debug = format!("{:?}", parsed);
        assert!(!debug.contains("c2VjcmV0LWtleQ=="));
        assert!(debug.contains("RootManageSharedAccessKey"));
    }
}
