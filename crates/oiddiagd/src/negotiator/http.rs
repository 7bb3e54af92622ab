//! HTTP negotiator: OpenID 1.x-style discovery and plaintext association.
//!
//! Discovery scrapes `<link rel="openid.server">` from the identity page.
//! Association POSTs a URL-encoded request and decodes the key-value form
//! answer. Diffie-Hellman sessions are not implemented; a peer that answers
//! with an encrypted MAC key is reported as a protocol error.

use async_trait::async_trait;
use oiddiag_shared::kvform;
use oiddiag_shared::{Association, DiagError, HandshakeContext, HandshakeOutcome, KeyExchange};
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::Negotiator;
use crate::config::NegotiatorConfig;

const SERVER_REL: &str = "openid.server";
const DELEGATE_REL: &str = "openid.delegate";

/// Negotiator talking to a live peer
pub struct HttpNegotiator {
    client: Client,
    link_re: Regex,
    attr_re: Regex,
}

impl HttpNegotiator {
    pub fn new(config: &NegotiatorConfig) -> Result<Self, DiagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DiagError::Config(format!("HTTP client: {}", e)))?;
        let link_re = Regex::new(r"(?is)<link\b[^>]*>")
            .map_err(|e| DiagError::Config(e.to_string()))?;
        let attr_re = Regex::new(r#"(?i)\b(rel|href)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .map_err(|e| DiagError::Config(e.to_string()))?;
        Ok(Self {
            client,
            link_re,
            attr_re,
        })
    }

    /// Find the `href` of the first `<link>` whose `rel` list contains `rel`.
    pub fn find_link(&self, html: &str, rel: &str) -> Option<String> {
        for tag in self.link_re.find_iter(html) {
            let mut rels: Option<String> = None;
            let mut href: Option<String> = None;
            for caps in self.attr_re.captures_iter(tag.as_str()) {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str().to_string());
                match caps[1].to_ascii_lowercase().as_str() {
                    "rel" => rels = value,
                    _ => href = value,
                }
            }
            let matches = rels
                .as_deref()
                .is_some_and(|r| r.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)));
            if matches {
                if let Some(href) = href {
                    return Some(href);
                }
            }
        }
        None
    }
}

/// Prefix `http://` when the identifier has no scheme and drop any fragment.
pub fn normalize_identifier(identifier: &str) -> Result<Url, DiagError> {
    let trimmed = identifier.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    let mut url = Url::parse(&with_scheme)
        .map_err(|e| DiagError::HandshakeFailure(format!("invalid identifier {:?}: {}", identifier, e)))?;
    url.set_fragment(None);
    Ok(url)
}

/// URL-encoded association request body.
pub fn encode_association_request(kx: &KeyExchange) -> Result<String, DiagError> {
    let mut url = Url::parse("http://request.invalid/")
        .map_err(|e| DiagError::Protocol(e.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("openid.mode", "associate");
        pairs.append_pair("openid.assoc_type", &kx.assoc_type);
        if let Some(session_type) = &kx.session_type {
            pairs.append_pair("openid.session_type", session_type);
        }
    }
    Ok(url.query().unwrap_or_default().to_string())
}

/// Decode the key-value form answer to an association request.
pub fn parse_association_response(
    status: StatusCode,
    body: &str,
    kx: &KeyExchange,
) -> Result<Association, DiagError> {
    let pairs = kvform::parse(body)?;

    if let Some(error) = kvform::lookup(&pairs, "error") {
        return Err(DiagError::Protocol(format!("server error: {}", error)));
    }
    if !status.is_success() {
        return Err(DiagError::Protocol(format!("association answered with HTTP {}", status)));
    }

    let field = |key: &str| {
        kvform::lookup(&pairs, key)
            .ok_or_else(|| DiagError::Protocol(format!("association response missing {}", key)))
    };

    let handle = field("assoc_handle")?;
    let expires_in: u64 = field("expires_in")?
        .parse()
        .map_err(|_| DiagError::Protocol("association expires_in is not a number".to_string()))?;
    let secret = match kvform::lookup(&pairs, "mac_key") {
        Some(secret) => secret,
        None if kvform::lookup(&pairs, "enc_mac_key").is_some() => {
            return Err(DiagError::Protocol(
                "server sent an encrypted MAC key; Diffie-Hellman sessions are not supported"
                    .to_string(),
            ))
        }
        None => return Err(DiagError::Protocol("association response missing mac_key".to_string())),
    };
    let assoc_type = kvform::lookup(&pairs, "assoc_type").unwrap_or(kx.assoc_type.as_str());

    let association = Association::from_expires_in(expires_in, handle, secret, assoc_type);
    if association.checked_expires_at().is_none() {
        return Err(DiagError::Protocol(format!(
            "association expires_in {} is out of range",
            expires_in
        )));
    }
    if association.is_expired() {
        return Err(DiagError::Protocol("association expired on arrival".to_string()));
    }
    Ok(association)
}

fn transport(err: reqwest::Error) -> DiagError {
    DiagError::Transport(err.to_string())
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn begin_handshake(&self, identifier: &str) -> Result<HandshakeOutcome, DiagError> {
        if identifier.trim().is_empty() {
            return Ok(HandshakeOutcome::Failure {
                reason: "empty identifier".to_string(),
            });
        }
        let identity = normalize_identifier(identifier)?;
        info!("Discovering {}", identity);

        let response = self.client.get(identity.clone()).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiagError::Transport(format!("GET {} returned HTTP {}", identity, status)));
        }
        // Redirects move the identity; links are relative to the final URL
        let final_url = response.url().clone();
        let html = response.text().await.map_err(transport)?;

        let Some(server) = self.find_link(&html, SERVER_REL) else {
            return Ok(HandshakeOutcome::Failure {
                reason: format!("no {} link at {}", SERVER_REL, final_url),
            });
        };
        let server_url = final_url
            .join(&server)
            .map_err(|e| DiagError::Protocol(format!("bad {} href {:?}: {}", SERVER_REL, server, e)))?;
        let delegate = self.find_link(&html, DELEGATE_REL);
        debug!("Server {} delegate {:?}", server_url, delegate);

        Ok(HandshakeOutcome::Success(HandshakeContext {
            token: Uuid::new_v4().simple().to_string(),
            identity_url: final_url.to_string(),
            server_url: server_url.to_string(),
            delegate,
            nonce: Uuid::new_v4().simple().to_string(),
        }))
    }

    fn build_association_request(&self, kx: &KeyExchange) -> Result<String, DiagError> {
        encode_association_request(kx)
    }

    async fn fetch_association(
        &self,
        kx: &KeyExchange,
        endpoint: &str,
        body: &str,
    ) -> Result<Association, DiagError> {
        info!("Associating with {}", endpoint);
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        let association = parse_association_response(status, &text, kx)?;
        debug!("Association {} valid for {}s", association.handle, association.remaining());
        Ok(association)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator() -> HttpNegotiator {
        HttpNegotiator::new(&NegotiatorConfig::default()).unwrap()
    }

    #[test]
    fn test_find_server_and_delegate_links() {
        let html = r#"<html><head>
            <link rel="openid.server" href="http://www.example.com/server">
            <LINK REL='openid.delegate' HREF='http://joe.example.com/'>
            </head></html>"#;
        let n = negotiator();
        assert_eq!(
            n.find_link(html, SERVER_REL).as_deref(),
            Some("http://www.example.com/server")
        );
        assert_eq!(
            n.find_link(html, DELEGATE_REL).as_deref(),
            Some("http://joe.example.com/")
        );
    }

    #[test]
    fn test_find_link_in_rel_list() {
        let html = r#"<link href=/server rel="openid2.provider openid.server" />"#;
        assert_eq!(negotiator().find_link(html, SERVER_REL).as_deref(), Some("/server"));
    }

    #[test]
    fn test_find_link_absent() {
        let html = r#"<link rel="stylesheet" href="/style.css">"#;
        assert_eq!(negotiator().find_link(html, SERVER_REL), None);
    }

    #[test]
    fn test_normalize_identifier() {
        let url = normalize_identifier(" unittest.example/joe#frag ").unwrap();
        assert_eq!(url.as_str(), "http://unittest.example/joe");
        let url = normalize_identifier("https://unittest.example/").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_encode_association_request() {
        let body = encode_association_request(&KeyExchange::plaintext()).unwrap();
        assert_eq!(body, "openid.mode=associate&openid.assoc_type=HMAC-SHA1");

        let kx = KeyExchange::new("HMAC-SHA1", Some("DH-SHA1".to_string()));
        assert!(encode_association_request(&kx)
            .unwrap()
            .ends_with("&openid.session_type=DH-SHA1"));
    }

    #[test]
    fn test_parse_association_response() {
        let body = "assoc_type:HMAC-SHA1\nassoc_handle:{HMAC-SHA1}{abc}\nexpires_in:1209600\nmac_key:c2Vj\n";
        let assoc = parse_association_response(StatusCode::OK, body, &KeyExchange::plaintext()).unwrap();
        assert_eq!(assoc.handle, "{HMAC-SHA1}{abc}");
        assert_eq!(assoc.lifetime_secs, 1_209_600);
        assert_eq!(assoc.secret(), "c2Vj");
    }

    #[test]
    fn test_parse_association_error_reply() {
        let err = parse_association_response(
            StatusCode::BAD_REQUEST,
            "error:unsupported assoc_type\n",
            &KeyExchange::plaintext(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported assoc_type"));
    }

    #[test]
    fn test_parse_association_encrypted_key_rejected() {
        let body = "assoc_handle:h\nexpires_in:60\nenc_mac_key:xyz\ndh_server_public:abc\n";
        let err = parse_association_response(StatusCode::OK, body, &KeyExchange::plaintext())
            .unwrap_err();
        assert!(err.to_string().contains("Diffie-Hellman"));
    }

    #[test]
    fn test_parse_association_lifetime_out_of_range() {
        let body = "assoc_handle:h\nexpires_in:100000000000000\nmac_key:c2Vj\n";
        let err = parse_association_response(StatusCode::OK, body, &KeyExchange::plaintext())
            .unwrap_err();
        assert!(matches!(err, DiagError::Protocol(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_parse_association_zero_lifetime() {
        let body = "assoc_handle:h\nexpires_in:0\nmac_key:c2Vj\n";
        let err = parse_association_response(StatusCode::OK, body, &KeyExchange::plaintext())
            .unwrap_err();
        assert!(err.to_string().contains("expired on arrival"));
    }

    #[test]
    fn test_parse_association_missing_field() {
        let err = parse_association_response(StatusCode::OK, "assoc_handle:h\n", &KeyExchange::plaintext())
            .unwrap_err();
        assert!(err.to_string().contains("expires_in"));
    }

    #[tokio::test]
    async fn test_empty_identifier_refused_without_network() {
        let outcome = negotiator().begin_handshake("   ").await.unwrap();
        assert!(!outcome.is_success());
    }
}
