//! Typed HTTP client for the Cumulus REST API.
//!
//! The client keeps the refresh cookie in its own cookie store and the
//! access token in a [`TokenRefresher`]. A request answered with 401 is
//! retried once after a refresh; concurrent requests that hit 401 together
//! share a single refresh call.

mod models;
mod refresh;

pub use models::{
    Contents, DownloadLink, FileInfo, FolderDeletion, FolderInfo, Session, Usage, UserInfo,
};
pub use refresh::TokenRefresher;

use reqwest::{multipart, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use models::{Envelope, ErrorEnvelope, FileAction, FolderAction, RefreshedToken};

/// Client-side errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No valid session, and refreshing it failed.
    #[error("not authenticated")]
    Unauthorized,

    /// The server answered with an error body.
    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Unauthorized => Some(401),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Client bound to one server.
pub struct DriveClient {
    base_url: String,
    http: reqwest::Client,
    tokens: TokenRefresher,
}

impl DriveClient {
    /// Create a client for a server such as `http://localhost:5000`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            tokens: TokenRefresher::new(),
        })
    }

    /// The token holder, shared by every request of this client.
    pub fn tokens(&self) -> &TokenRefresher {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Send a request with the current token, refreshing once on 401.
    ///
    /// `build` is called again for the retry, so it must be repeatable.
    async fn send<B>(&self, build: B) -> ClientResult<Response>
    where
        B: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let (token, generation) = self.tokens.current().await;
        let response = with_token(build(&self.http), token.as_deref()).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let token = self
            .tokens
            .refresh_after(generation, || self.exchange_refresh_cookie())
            .await?;
        Ok(with_token(build(&self.http), Some(&token)).send().await?)
    }

    async fn exchange_refresh_cookie(&self) -> ClientResult<String> {
        let response = self.http.post(self.url("/auth/refresh")).send().await?;
        let refreshed: RefreshedToken = parse(response).await?;
        Ok(refreshed.access_token)
    }

    async fn start_session(&self, response: Response) -> ClientResult<Session> {
        let session: Session = parse(response).await?;
        self.tokens.set(session.access_token.clone()).await;
        Ok(session)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<Session> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        self.start_session(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        self.start_session(response).await
    }

    /// Exchange the refresh cookie for a new access token.
    pub async fn refresh(&self) -> ClientResult<String> {
        let (_, generation) = self.tokens.current().await;
        self.tokens
            .refresh_after(generation, || self.exchange_refresh_cookie())
            .await
    }

    /// End the session on the server and locally.
    pub async fn logout(&self) -> ClientResult<()> {
        let response = self.http.post(self.url("/auth/logout")).send().await?;
        self.tokens.clear().await;
        parse::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn me(&self) -> ClientResult<UserInfo> {
        let url = self.url("/auth/me");
        parse(self.send(|http| http.get(&url)).await?).await
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    pub async fn list_files(&self, folder_id: Option<i64>) -> ClientResult<Vec<FileInfo>> {
        let url = self.url("/files");
        let folder = folder_param(folder_id);
        parse(self.send(|http| http.get(&url).query(&[("folder", &folder)])).await?).await
    }

    pub async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
        folder_id: Option<i64>,
    ) -> ClientResult<FileInfo> {
        let url = self.url("/files/upload");
        let build = |http: &reqwest::Client| {
            let part = multipart::Part::bytes(content.clone()).file_name(filename.to_string());
            let mut form = multipart::Form::new().part("file", part);
            if let Some(id) = folder_id {
                form = form.text("folder_id", id.to_string());
            }
            http.post(&url).multipart(form)
        };
        parse(self.send(build).await?).await
    }

    pub async fn get_file(&self, id: i64) -> ClientResult<FileInfo> {
        let url = self.url(&format!("/files/{id}"));
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn download(&self, id: i64) -> ClientResult<DownloadLink> {
        let url = self.url(&format!("/files/{id}/download"));
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn rename_file(&self, id: i64, name: &str) -> ClientResult<FileInfo> {
        let url = self.url(&format!("/files/{id}/rename"));
        let body = json!({ "name": name });
        let action: FileAction = parse(self.send(|http| http.put(&url).json(&body)).await?).await?;
        Ok(action.file)
    }

    pub async fn move_file(&self, id: i64, folder_id: Option<i64>) -> ClientResult<FileInfo> {
        let url = self.url(&format!("/files/{id}/move"));
        let body = json!({ "folder_id": folder_id });
        let action: FileAction = parse(self.send(|http| http.put(&url).json(&body)).await?).await?;
        Ok(action.file)
    }

    pub async fn trash_file(&self, id: i64) -> ClientResult<FileInfo> {
        self.file_action(&format!("/files/{id}/trash")).await
    }

    pub async fn restore_file(&self, id: i64) -> ClientResult<FileInfo> {
        self.file_action(&format!("/files/{id}/restore")).await
    }

    pub async fn toggle_file_star(&self, id: i64) -> ClientResult<FileInfo> {
        self.file_action(&format!("/files/{id}/star")).await
    }

    async fn file_action(&self, path: &str) -> ClientResult<FileInfo> {
        let url = self.url(path);
        let action: FileAction = parse(self.send(|http| http.put(&url)).await?).await?;
        Ok(action.file)
    }

    pub async fn purge_file(&self, id: i64) -> ClientResult<()> {
        let url = self.url(&format!("/files/{id}/permanent"));
        parse::<serde_json::Value>(self.send(|http| http.delete(&url)).await?)
            .await
            .map(|_| ())
    }

    pub async fn trash(&self) -> ClientResult<Vec<FileInfo>> {
        let url = self.url("/files/trash/all");
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn recent(&self) -> ClientResult<Vec<FileInfo>> {
        let url = self.url("/files/recent/all");
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn search(&self, query: &str) -> ClientResult<Vec<FileInfo>> {
        let url = self.url("/files/search/query");
        parse(self.send(|http| http.get(&url).query(&[("q", query)])).await?).await
    }

    /// Share a file with the user owning `email`.
    pub async fn share_file(&self, id: i64, email: &str, permission: &str) -> ClientResult<FileInfo> {
        let url = self.url(&format!("/files/{id}/share"));
        let body = json!({ "user_email": email, "permission": permission });
        let action: FileAction =
            parse(self.send(|http| http.post(&url).json(&body)).await?).await?;
        Ok(action.file)
    }

    pub async fn usage(&self) -> ClientResult<Usage> {
        let url = self.url("/files/usage/me");
        parse(self.send(|http| http.get(&url)).await?).await
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    pub async fn create_folder(&self, name: &str, parent_id: Option<i64>) -> ClientResult<FolderInfo> {
        let url = self.url("/folders");
        let body = json!({ "name": name, "parent_id": parent_id });
        parse(self.send(|http| http.post(&url).json(&body)).await?).await
    }

    /// Contents of a folder, or of the root with `None`.
    pub async fn contents(&self, folder_id: Option<i64>) -> ClientResult<Contents> {
        let url = match folder_id {
            Some(id) => self.url(&format!("/folders/{id}/contents")),
            None => self.url("/folders/root/contents"),
        };
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn breadcrumbs(&self, id: i64) -> ClientResult<Vec<FolderInfo>> {
        let url = self.url(&format!("/folders/{id}/breadcrumbs"));
        parse(self.send(|http| http.get(&url)).await?).await
    }

    pub async fn move_folder(&self, id: i64, parent_id: Option<i64>) -> ClientResult<FolderInfo> {
        let url = self.url(&format!("/folders/{id}/move"));
        let body = json!({ "parent_id": parent_id });
        let action: FolderAction =
            parse(self.send(|http| http.put(&url).json(&body)).await?).await?;
        Ok(action.folder)
    }

    pub async fn delete_folder(&self, id: i64) -> ClientResult<FolderDeletion> {
        let url = self.url(&format!("/folders/{id}"));
        parse(self.send(|http| http.delete(&url)).await?).await
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

fn folder_param(folder_id: Option<i64>) -> String {
    folder_id.map_or_else(|| "root".to_string(), |id| id.to_string())
}

/// Unwrap the `data` envelope, or turn an error body into [`ClientError`].
async fn parse<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        let envelope: Envelope<T> = response.json().await?;
        return Ok(envelope.data);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => ClientError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: "UNKNOWN".to_string(),
            message: body,
        },
    })
}
