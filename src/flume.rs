use std::time::Duration;

use log::{debug, info};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::Credentials;
use crate::error::ApiError;
use crate::models::{
    Device, Envelope, FetchDeviceRequest, Me, QueryRequest, QueryResult, Token, TokenRequest,
};

pub const FLUME_API_URI: &str = "https://api.flumewater.com";

#[allow(async_fn_in_trait)]
pub trait FlumeApi {
    async fn fetch_device(
        &mut self,
        device_id: &str,
        request: FetchDeviceRequest,
    ) -> Result<Device, ApiError>;

    async fn fetch_devices(&mut self, request: FetchDeviceRequest) -> Result<Vec<Device>, ApiError>;

    async fn query_device(
        &mut self,
        device_id: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryResult>, ApiError>;

    fn close(&mut self);
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user_id: String,
}

pub struct FlumeClient {
    client: reqwest::Client,
    base_uri: String,
    credentials: Credentials,
    session: Option<Session>,
}

impl FlumeClient {
    pub fn new(
        base_uri: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_uri, credentials, client))
    }

    pub fn with_client(base_uri: &str, credentials: Credentials, client: reqwest::Client) -> Self {
        FlumeClient {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
            credentials,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<Session, ApiError> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let session = self.login().await?;
        info!("authenticated with flume as user {}", session.user_id);
        Ok(self.session.insert(session).clone())
    }

    async fn login(&self) -> Result<Session, ApiError> {
        let token = self
            .client
            .post(format!("{}/oauth/token", self.base_uri))
            .json(&TokenRequest::from(&self.credentials));
        let token = first(read_envelope::<Token>(token).await?, "token")?.access_token;

        let me = self
            .client
            .get(format!("{}/me", self.base_uri))
            .bearer_auth(&token);
        let user_id = first(read_envelope::<Me>(me).await?, "user")?.id;

        Ok(Session { token, user_id })
    }

    async fn call<T: DeserializeOwned>(
        &mut self,
        build: impl FnOnce(&reqwest::Client, &str) -> RequestBuilder,
    ) -> Result<Vec<T>, ApiError> {
        let session = self.session().await?;
        let request = build(&self.client, &session.user_id).bearer_auth(&session.token);
        let result = read_envelope(request).await;
        if let Err(ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            ..
        }) = &result
        {
            debug!("flume session rejected, re-authenticating on next call");
            self.session = None;
        }
        result
    }
}

impl FlumeApi for FlumeClient {
    async fn fetch_device(
        &mut self,
        device_id: &str,
        request: FetchDeviceRequest,
    ) -> Result<Device, ApiError> {
        let base = self.base_uri.clone();
        let devices = self
            .call(|client, user_id| {
                client
                    .get(format!("{base}/users/{user_id}/devices/{device_id}"))
                    .query(&request.params())
            })
            .await?;
        first(devices, "device")
    }

    async fn fetch_devices(&mut self, request: FetchDeviceRequest) -> Result<Vec<Device>, ApiError> {
        let base = self.base_uri.clone();
        self.call(|client, user_id| {
            client
                .get(format!("{base}/users/{user_id}/devices"))
                .query(&request.params())
        })
        .await
    }

    async fn query_device(
        &mut self,
        device_id: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryResult>, ApiError> {
        let base = self.base_uri.clone();
        self.call(|client, user_id| {
            client
                .post(format!("{base}/users/{user_id}/devices/{device_id}/query"))
                .json(request)
        })
        .await
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("released flume session");
        }
    }
}

async fn read_envelope<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, message });
    }

    let envelope = response.json::<Envelope<T>>().await?;
    if !envelope.success {
        return Err(ApiError::Rejected(envelope.message));
    }
    Ok(envelope.data)
}

fn first<T>(data: Vec<T>, what: &'static str) -> Result<T, ApiError> {
    data.into_iter().next().ok_or(ApiError::EmptyPayload(what))
}
