use anyhow::{anyhow, Context};
use log::debug;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::client::config::ClientConfig;
use crate::client::error::ApiError;
use crate::client::services::api::MatchApi;
use crate::client::services::normalize::{
    normalize_match, normalize_message, normalize_messages, normalize_visit, normalize_visits, RawMatch, RawMessage,
    RawUserEnvelope, RawVisit,
};
use crate::common::models::{CurrentUser, Id, MatchSummary, Message, NewMessage, NewVisit, VisitProposal};

/// [`MatchApi`] over the backend's REST endpoints.
///
/// Sessions are cookie based; when a session token is known it is also sent
/// as a bearer token, the way the web front end does.
pub struct HttpMatchApi {
    http: reqwest::Client,
    base: Url,
    session_token: Option<String>,
}

impl HttpMatchApi {
    pub fn new(config: &ClientConfig, session_token: Option<String>) -> anyhow::Result<Self> {
        let raw = config.api_base_url.trim().to_string();
        let base = Url::parse(&raw).map_err(|source| ApiError::InvalidBaseUrl { url: raw.clone(), source })?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("API base url {} cannot be used as a base", raw));
        }
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, base, session_token })
    }

    /// Base url with `segments` appended; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base url {} cannot be used as a base", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> anyhow::Result<RequestBuilder> {
        let req = self.http.request(method, self.endpoint(segments)?);
        Ok(match &self.session_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    async fn send(&self, req: RequestBuilder) -> anyhow::Result<Response> {
        let req = req.build()?;
        let method = req.method().clone();
        let path = req.url().path().to_string();
        debug!("[HTTP] {} {}", method, path);

        let resp = self
            .http
            .execute(req)
            .await
            .with_context(|| format!("{} {} failed", method, path))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { method, path, status, body }.into());
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<T> {
        let resp = self.send(req).await?;
        let path = resp.url().path().to_string();
        resp.json::<T>()
            .await
            .with_context(|| format!("unexpected response body from {}", path))
    }
}

impl MatchApi for HttpMatchApi {
    async fn current_user(&self) -> anyhow::Result<CurrentUser> {
        let raw: RawUserEnvelope = self.json(self.request(Method::GET, &["auth", "me"])?).await?;
        CurrentUser::try_from(raw.into_inner())
    }

    async fn get_match(&self, match_id: &Id) -> anyhow::Result<MatchSummary> {
        let raw: RawMatch = self.json(self.request(Method::GET, &["matches", match_id.as_str()])?).await?;
        normalize_match(raw, match_id)
    }

    async fn list_messages(&self, match_id: &Id) -> anyhow::Result<Vec<Message>> {
        let raw: Vec<RawMessage> = self
            .json(self.request(Method::GET, &["matches", match_id.as_str(), "messages"])?)
            .await?;
        normalize_messages(raw, match_id)
    }

    async fn list_visits(&self, match_id: &Id) -> anyhow::Result<Vec<VisitProposal>> {
        let raw: Vec<RawVisit> = self
            .json(self.request(Method::GET, &["matches", match_id.as_str(), "visits"])?)
            .await?;
        normalize_visits(raw, Some(match_id))
    }

    async fn list_user_visits(&self, user_id: &Id) -> anyhow::Result<Vec<VisitProposal>> {
        let raw: Vec<RawVisit> = self
            .json(self.request(Method::GET, &["visits", "user", user_id.as_str()])?)
            .await?;
        normalize_visits(raw, None)
    }

    async fn send_message(&self, message: NewMessage) -> anyhow::Result<Message> {
        let req = self.request(Method::POST, &["messages"])?.json(&message);
        let raw: RawMessage = self.json(req).await?;
        normalize_message(raw, &message.match_id)
    }

    async fn create_visit(&self, visit: NewVisit) -> anyhow::Result<VisitProposal> {
        let req = self.request(Method::POST, &["visits"])?.json(&visit);
        let raw: RawVisit = self.json(req).await?;
        normalize_visit(raw, Some(&visit.match_id))
    }

    async fn accept_visit(&self, visit_id: &Id) -> anyhow::Result<VisitProposal> {
        let raw: RawVisit = self
            .json(self.request(Method::PATCH, &["visits", visit_id.as_str(), "accept"])?)
            .await?;
        normalize_visit(raw, None)
    }

    async fn decline_visit(&self, visit_id: &Id, reason: Option<String>) -> anyhow::Result<VisitProposal> {
        let req = self
            .request(Method::PATCH, &["visits", visit_id.as_str(), "decline"])?
            .json(&json!({ "reason": reason }));
        let raw: RawVisit = self.json(req).await?;
        normalize_visit(raw, None)
    }

    async fn cancel_visit(&self, visit_id: &Id) -> anyhow::Result<()> {
        self.send(self.request(Method::DELETE, &["visits", visit_id.as_str()])?).await?;
        Ok(())
    }

    async fn mark_message_read(&self, message_id: &Id) -> anyhow::Result<()> {
        self.send(self.request(Method::PATCH, &["messages", message_id.as_str(), "read"])?)
            .await?;
        Ok(())
    }
}
