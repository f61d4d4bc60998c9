use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use shelfsync_core::{
    ExportFormat, RemoteConfig, RemoteError, RemoteLibrary, Subscription, Work, WorkId,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Authenticated session against the archive's JSON gateway.
///
/// Endpoints, relative to the base URL:
/// - `POST api/session` with `{username, password}` returns `{token}`
/// - `GET api/subscriptions` lists [`Subscription`]s
/// - `GET api/works/{id}` returns a [`Work`]
/// - `GET api/works/{id}/download?format={ext}` streams the archive
pub struct HttpLibrary {
    agent: ureq::Agent,
    base_url: Url,
    token: String,
}

impl HttpLibrary {
    /// Log in with the configured credentials.
    pub fn login(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(RemoteError::Auth(
                "username and password are required".to_string(),
            ));
        };
        let base_url = parse_base_url(&config.base_url)?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();

        let url = endpoint(&base_url, &["api", "session"])?;
        let response = match agent.post(url.as_str()).send_json(LoginRequest {
            username: username.as_str(),
            password: password.as_str(),
        }) {
            Ok(response) => response,
            Err(ureq::Error::Status(status @ (401 | 403), _)) => {
                return Err(RemoteError::Auth(format!(
                    "login rejected for {username} ({status})"
                )))
            }
            Err(err) => return Err(map_error(err, &url)),
        };
        let login: LoginResponse = decode(response, &url)?;
        tracing::info!("logged in to {} as {}", base_url, username);

        Ok(Self {
            agent,
            base_url,
            token: login.token,
        })
    }

    /// Session for an already issued token.
    pub fn with_token(base_url: &str, token: impl Into<String>) -> Result<Self, RemoteError> {
        Ok(Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .timeout_read(READ_TIMEOUT)
                .build(),
            base_url: parse_base_url(base_url)?,
            token: token.into(),
        })
    }

    fn get(&self, url: &Url) -> ureq::Request {
        self.agent
            .get(url.as_str())
            .set("Authorization", &format!("Bearer {}", self.token))
    }

    fn call(&self, request: ureq::Request, url: &Url) -> Result<ureq::Response, RemoteError> {
        request.call().map_err(|err| map_error(err, url))
    }
}

impl RemoteLibrary for HttpLibrary {
    fn subscriptions(&self) -> Result<Vec<Subscription>, RemoteError> {
        let url = endpoint(&self.base_url, &["api", "subscriptions"])?;
        let response = self.call(self.get(&url), &url)?;
        decode(response, &url)
    }

    fn work(&self, id: &WorkId) -> Result<Work, RemoteError> {
        let url = endpoint(&self.base_url, &["api", "works", &id.0])?;
        let response = match self.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(RemoteError::NotFound(id.clone())),
            Err(err) => return Err(map_error(err, &url)),
        };
        decode(response, &url)
    }

    fn export(&self, id: &WorkId, format: ExportFormat, dest: &Path) -> Result<(), RemoteError> {
        let url = endpoint(&self.base_url, &["api", "works", &id.0, "download"])?;
        let request = self.get(&url).query("format", format.extension());
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(RemoteError::NotFound(id.clone())),
            Err(err) => return Err(map_error(err, &url)),
        };

        let io_err = |source: io::Error| RemoteError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let file = File::create(dest).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let mut reader = response.into_reader();
        let bytes = io::copy(&mut reader, &mut writer).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        tracing::debug!("{} bytes from {}", bytes, url);
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, RemoteError> {
    Url::parse(raw).map_err(|e| RemoteError::Transport(format!("invalid base url {raw:?}: {e}")))
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::Transport(format!("base url {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_error(err: ureq::Error, url: &Url) -> RemoteError {
    match err {
        ureq::Error::Status(401 | 403, _) => {
            RemoteError::Auth(format!("session rejected by {url}"))
        }
        ureq::Error::Status(status, _) => RemoteError::Status {
            status,
            url: url.to_string(),
        },
        ureq::Error::Transport(transport) => RemoteError::Transport(transport.to_string()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    response: ureq::Response,
    url: &Url,
) -> Result<T, RemoteError> {
    response.into_json().map_err(|e| RemoteError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
