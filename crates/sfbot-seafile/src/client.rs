use std::time::Duration;

use serde::Deserialize;

use sfbot_core::{errors::Error, formatting::truncate_chars, Result};

use crate::repo::Repos;

const ERROR_BODY_EXCERPT: usize = 200;

/// Authenticated Seafile Web API (`/api2`) session.
#[derive(Clone, Debug)]
pub struct SeafileClient {
    server: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl SeafileClient {
    /// Log in with account credentials and keep the issued API token.
    pub async fn connect(
        server: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("seafile http client: {e}")))?;
        let server = server.trim_end_matches('/').to_string();

        let resp = http
            .post(format!("{server}/api2/auth-token/"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| transport("POST /api2/auth-token/", e))?;
        let resp = check_status("POST /api2/auth-token/", resp).await?;

        let TokenResponse { token } = resp
            .json()
            .await
            .map_err(|e| transport("POST /api2/auth-token/", e))?;

        tracing::debug!(server = %server, "seafile session established");
        Ok(Self {
            server,
            token,
            http,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn repos(&self) -> Repos<'_> {
        Repos::new(self)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Authenticated GET against an `/api2/...` path.
    pub(crate) async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let what = format!("GET {path}");
        let resp = self
            .http
            .get(format!("{}{path}", self.server))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| transport(&what, e))?;
        check_status(&what, resp).await
    }
}

pub(crate) fn transport(what: &str, e: reqwest::Error) -> Error {
    Error::Transport(format!("seafile {what}: {e}"))
}

/// Turn any non-2xx answer into `Error::Transport` (404 into `Error::NotFound`).
pub(crate) async fn check_status(what: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let excerpt = truncate_chars(body.trim(), ERROR_BODY_EXCERPT);
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("seafile {what}: {excerpt}")));
    }
    Err(Error::Transport(format!("seafile {what}: {status} {excerpt}")))
}
