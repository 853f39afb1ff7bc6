//! # Media Server Client
//!
//! The engine's only view of the media server: one logical query per
//! path-like key, answered with the container's child records.
//!
//! ## Query Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MediaServerClient                                 │
//! │                                                                         │
//! │  sessions()              GET /status/sessions                           │
//! │  sections()              GET /library/sections                          │
//! │  recently_added(Some k)  GET /library/sections/{k}/recentlyAdded        │
//! │  recently_added(None)    GET /library/recentlyAdded                     │
//! │  on_deck()               GET /library/onDeck                            │
//! │  servers()               GET /servers                                   │
//! │  library()               GET /library                                   │
//! │                                                                         │
//! │  Every request carries:                                                │
//! │    X-Plex-Token, Accept: application/json, X-Plex-Client-Identifier,   │
//! │    X-Plex-Product, X-Plex-Version, X-Plex-Device-Name                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use marquee_core::{parse_container, ServerRecord};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::{ClientIdentity, ServerSettings};
use crate::error::{DigestError, DigestResult};

/// Query paths understood by the media server.
pub mod paths {
    pub const SESSIONS: &str = "/status/sessions";
    pub const SECTIONS: &str = "/library/sections";
    pub const RECENTLY_ADDED: &str = "/library/recentlyAdded";
    pub const ON_DECK: &str = "/library/onDeck";
    pub const SERVERS: &str = "/servers";
    pub const LIBRARY: &str = "/library";

    /// Recently-added listing of one library section.
    pub fn section_recently_added(section_key: &str) -> String {
        format!("{SECTIONS}/{section_key}/recentlyAdded")
    }
}

/// plex.tv account sign-in endpoint.
pub const PLEX_TV_SIGN_IN: &str = "https://plex.tv/users/sign_in.json";

const TOKEN_HEADER: &str = "x-plex-token";

// =============================================================================
// Client Trait
// =============================================================================

/// Query seam between the engine and the media server.
#[async_trait]
pub trait MediaServerClient: Send + Sync {
    /// Fetches `path` and returns the response container's child records.
    async fn query(&self, path: &str) -> DigestResult<Vec<ServerRecord>>;

    /// Active playback sessions.
    async fn sessions(&self) -> DigestResult<Vec<ServerRecord>> {
        self.query(paths::SESSIONS).await
    }

    /// Library sections.
    async fn sections(&self) -> DigestResult<Vec<ServerRecord>> {
        self.query(paths::SECTIONS).await
    }

    /// Recently added items of one section, or of the whole library.
    async fn recently_added(&self, section_key: Option<&str>) -> DigestResult<Vec<ServerRecord>> {
        match section_key {
            Some(key) => self.query(&paths::section_recently_added(key)).await,
            None => self.query(paths::RECENTLY_ADDED).await,
        }
    }

    /// Items the server suggests continuing.
    async fn on_deck(&self) -> DigestResult<Vec<ServerRecord>> {
        self.query(paths::ON_DECK).await
    }

    /// Servers known to this one.
    async fn servers(&self) -> DigestResult<Vec<ServerRecord>> {
        self.query(paths::SERVERS).await
    }

    /// Library root, used as a connection test.
    async fn library(&self) -> DigestResult<Vec<ServerRecord>> {
        self.query(paths::LIBRARY).await
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// `MediaServerClient` over the server's HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct PlexClient {
    http: reqwest::Client,
    base_url: Url,
    token: HeaderValue,
}

impl PlexClient {
    /// Creates a client for `server`, identifying as `identity`.
    ///
    /// ## Errors
    /// - `MissingToken` if the server settings carry no token
    /// - `InvalidConfig` if a header value contains invalid characters
    pub fn new(server: &ServerSettings, identity: &ClientIdentity) -> DigestResult<Self> {
        let token = server.token().ok_or(DigestError::MissingToken)?;
        let mut token = header_value("token", token)?;
        token.set_sensitive(true);

        let http = reqwest::Client::builder()
            .default_headers(identity_headers(identity)?)
            .build()?;

        Ok(PlexClient {
            http,
            base_url: server.base_url()?,
            token,
        })
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a query path against the base URL.
    pub fn url_for(&self, path: &str) -> DigestResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl MediaServerClient for PlexClient {
    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn query(&self, path: &str) -> DigestResult<Vec<ServerRecord>> {
        let url = self.url_for(path)?;
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, self.token.clone())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DigestError::Unauthorized);
        }
        if !status.is_success() {
            return Err(DigestError::HttpStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let records = parse_container(body)?;
        debug!(path, count = records.len(), "Query answered");
        Ok(records)
    }
}

// =============================================================================
// plex.tv Sign-in
// =============================================================================

#[derive(Debug, Deserialize)]
struct SignInResponse {
    user: Option<SignInUser>,
}

#[derive(Debug, Deserialize)]
struct SignInUser {
    authentication_token: Option<String>,
}

/// Exchanges plex.tv account credentials for an auth token.
pub async fn sign_in(
    identity: &ClientIdentity,
    username: &str,
    password: &str,
) -> DigestResult<String> {
    sign_in_at(PLEX_TV_SIGN_IN, identity, username, password).await
}

/// Signs in against an explicit endpoint.
pub async fn sign_in_at(
    endpoint: &str,
    identity: &ClientIdentity,
    username: &str,
    password: &str,
) -> DigestResult<String> {
    let url = Url::parse(endpoint)?;
    info!(host = url.host_str().unwrap_or_default(), "Requesting auth token");

    let http = reqwest::Client::builder()
        .default_headers(identity_headers(identity)?)
        .build()?;

    let response = http
        .post(url)
        .form(&[("user[login]", username), ("user[password]", password)])
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::CREATED {
        return Err(DigestError::AuthFailed(format!(
            "plex.tv answered {status}, expected 201 Created"
        )));
    }

    let body: SignInResponse = response.json().await?;
    token_from_response(body)
}

fn token_from_response(body: SignInResponse) -> DigestResult<String> {
    body.user
        .and_then(|user| user.authentication_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| DigestError::AuthFailed("authentication token not found in response".into()))
}

// =============================================================================
// Headers
// =============================================================================

fn identity_headers(identity: &ClientIdentity) -> DigestResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let pairs = [
        ("x-plex-client-identifier", identity.identifier.as_str()),
        ("x-plex-product", identity.product.as_str()),
        ("x-plex-version", env!("CARGO_PKG_VERSION")),
        ("x-plex-device-name", identity.device_name.as_str()),
    ];
    for (name, value) in pairs {
        headers.insert(HeaderName::from_static(name), header_value(name, value)?);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> DigestResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| DigestError::InvalidConfig(format!("{name} contains invalid characters")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClient;
    use marquee_core::RecordTag;

    fn server() -> ServerSettings {
        ServerSettings {
            hostname: "media.local".into(),
            token: Some("secret".into()),
            ..ServerSettings::default()
        }
    }

    #[test]
    fn test_section_path() {
        assert_eq!(
            paths::section_recently_added("3"),
            "/library/sections/3/recentlyAdded"
        );
    }

    #[tokio::test]
    async fn test_default_queries_hit_their_paths() {
        let client = FakeClient::new();
        client.set(
            paths::SERVERS,
            vec![ServerRecord::new(RecordTag::Server).with_title("den")],
        );

        let servers = client.servers().await.unwrap();
        assert_eq!(servers[0].title.as_deref(), Some("den"));
        assert!(client.on_deck().await.unwrap().is_empty());
        client.recently_added(None).await.unwrap();
        client.recently_added(Some("2")).await.unwrap();
        client.sessions().await.unwrap();
        client.sections().await.unwrap();
        client.library().await.unwrap();

        assert_eq!(
            client.calls(),
            vec![
                "/servers",
                "/library/onDeck",
                "/library/recentlyAdded",
                "/library/sections/2/recentlyAdded",
                "/status/sessions",
                "/library/sections",
                "/library",
            ]
        );
    }

    #[test]
    fn test_url_resolution() {
        let client = PlexClient::new(&server(), &ClientIdentity::default()).unwrap();
        assert_eq!(
            client.url_for(paths::SESSIONS).unwrap().as_str(),
            "http://media.local:32400/status/sessions"
        );
        assert_eq!(
            client
                .url_for(&paths::section_recently_added("1"))
                .unwrap()
                .as_str(),
            "http://media.local:32400/library/sections/1/recentlyAdded"
        );
    }

    #[test]
    fn test_client_requires_token() {
        let settings = ServerSettings {
            token: None,
            ..server()
        };
        assert!(matches!(
            PlexClient::new(&settings, &ClientIdentity::default()),
            Err(DigestError::MissingToken)
        ));
    }

    #[test]
    fn test_identity_headers() {
        let identity = ClientIdentity {
            identifier: "abc".into(),
            product: "Marquee".into(),
            device_name: "den".into(),
        };
        let headers = identity_headers(&identity).unwrap();
        assert_eq!(headers["x-plex-client-identifier"], "abc");
        assert_eq!(headers["x-plex-product"], "Marquee");
        assert_eq!(headers[ACCEPT], "application/json");

        let bad = ClientIdentity {
            device_name: "line\nbreak".into(),
            ..identity
        };
        assert!(identity_headers(&bad).is_err());
    }

    #[test]
    fn test_sign_in_token_extraction() {
        let body: SignInResponse =
            serde_json::from_str(r#"{ "user": { "authentication_token": "tok" } }"#).unwrap();
        assert_eq!(token_from_response(body).unwrap(), "tok");

        let body: SignInResponse = serde_json::from_str(r#"{ "error": "nope" }"#).unwrap();
        assert!(matches!(
            token_from_response(body),
            Err(DigestError::AuthFailed(_))
        ));
    }
}
