use serde::Deserialize;

use sfbot_core::{errors::Error, Result};

use crate::client::{check_status, transport, SeafileClient};

/// Library (repository) metadata as returned by `/api2/repos/`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
}

/// One entry of a directory listing.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

pub struct Repos<'a> {
    client: &'a SeafileClient,
}

impl<'a> Repos<'a> {
    pub(crate) fn new(client: &'a SeafileClient) -> Self {
        Self { client }
    }

    /// Look up a library by id; `Error::NotFound` if it does not exist.
    pub async fn get_repo(&self, repo_id: &str) -> Result<Repo> {
        let resp = self
            .client
            .get(&format!("/api2/repos/{repo_id}/"), &[])
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::NotFound(format!("the requested library does not exist: {repo_id}"))
                }
                other => other,
            })?;
        let info: RepoInfo = resp
            .json()
            .await
            .map_err(|e| transport("GET /api2/repos/<id>/", e))?;
        Ok(Repo {
            client: self.client.clone(),
            info,
        })
    }

    pub async fn list_repos(&self) -> Result<Vec<RepoInfo>> {
        let resp = self.client.get("/api2/repos/", &[]).await?;
        resp.json()
            .await
            .map_err(|e| transport("GET /api2/repos/", e))
    }
}

/// A library bound to an authenticated client.
#[derive(Clone, Debug)]
pub struct Repo {
    client: SeafileClient,
    info: RepoInfo,
}

impl Repo {
    pub fn info(&self) -> &RepoInfo {
        &self.info
    }

    /// Resolve a folder inside the library (listing it proves it exists).
    pub async fn get_dir(&self, path: &str) -> Result<SeafDir> {
        let entries = self.list_dir(path).await?;
        tracing::debug!(
            repo = %self.info.name,
            path,
            entries = entries.len(),
            "resolved seafile folder"
        );
        Ok(SeafDir {
            repo: self.clone(),
            path: path.to_string(),
        })
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let resp = self
            .client
            .get(&format!("/api2/repos/{}/dir/", self.info.id), &[("p", path)])
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!(
                    "folder {path} does not exist in library {}",
                    self.info.name
                )),
                other => other,
            })?;
        resp.json()
            .await
            .map_err(|e| transport("GET /api2/repos/<id>/dir/", e))
    }
}

/// A folder handle; uploads land directly inside it.
#[derive(Clone, Debug)]
pub struct SeafDir {
    repo: Repo,
    path: String,
}

impl SeafDir {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    async fn upload_link(&self) -> Result<String> {
        let resp = self
            .repo
            .client
            .get(
                &format!("/api2/repos/{}/upload-link/", self.repo.info.id),
                &[("p", self.path.as_str())],
            )
            .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| transport("GET /api2/repos/<id>/upload-link/", e))?;
        parse_upload_link(&body)
    }

    /// Upload `bytes` as `name` into this folder. Single attempt.
    pub async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<()> {
        let link = self.upload_link().await?;

        let form = reqwest::multipart::Form::new()
            .text("parent_dir", self.path.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()),
            );

        let resp = self
            .repo
            .client
            .http()
            .post(&link)
            .query(&[("ret-json", "1")])
            .header(reqwest::header::AUTHORIZATION, self.repo.client.auth_header())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport("POST upload-link", e))?;
        check_status("POST upload-link", resp).await?;
        Ok(())
    }
}

/// The upload-link endpoint answers with a JSON string literal holding the URL.
pub(crate) fn parse_upload_link(body: &str) -> Result<String> {
    let link: String = serde_json::from_str(body.trim()).map_err(|_| {
        Error::Transport(format!(
            "seafile upload-link: unexpected body {:?}",
            body.chars().take(100).collect::<String>()
        ))
    })?;
    if !(link.starts_with("http://") || link.starts_with("https://")) {
        return Err(Error::Transport(format!(
            "seafile upload-link: not a url: {link:?}"
        )));
    }
    Ok(link)
}
