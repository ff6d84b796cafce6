//! HAProxy Data Plane API client.
//!
//! # Responsibilities
//! - Read and write configuration sections (global, defaults, backends, servers)
//! - Perform versioned writes so concurrent edits are detected by the API
//! - Map 404 answers to `ControlPlaneError::NotFound`

use std::time::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::haproxy::error::{ControlPlaneError, ControlPlaneResult};
use crate::haproxy::models::{Backend, Defaults, Global, Server};

const API_PREFIX: &str = "v2/services/haproxy/configuration/";

/// Data Plane API answers wrap the object with the configuration version.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the HAProxy Data Plane API.
#[derive(Debug, Clone)]
pub struct DataPlaneClient {
    base: Url,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl DataPlaneClient {
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> ControlPlaneResult<Self> {
        let mut base = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the base ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            http,
        })
    }

    /// Build the URL of a configuration endpoint.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> ControlPlaneResult<Url> {
        let mut url = self.base.join(API_PREFIX)?.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Current configuration version, required by every write.
    pub async fn version(&self) -> ControlPlaneResult<i64> {
        let url = self.endpoint("version", &[])?;
        let response = self.http.get(url).basic_auth(&self.username, Some(&self.password)).send().await?;
        let response = check_status(response, "configuration", "version").await?;
        Ok(response.json::<i64>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, kind: &'static str, name: &str) -> ControlPlaneResult<T> {
        let response = self.http.get(url).basic_auth(&self.username, Some(&self.password)).send().await?;
        let response = check_status(response, kind, name).await?;
        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }

    async fn write<T: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
        body: &T,
        kind: &'static str,
        name: &str,
    ) -> ControlPlaneResult<()> {
        let version = self.version().await?.to_string();
        let mut query = query.to_vec();
        query.push(("version", version.as_str()));
        let url = self.endpoint(path, &query)?;

        tracing::trace!(%url, %method, "Data Plane API write");
        let response = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        check_status(response, kind, name).await?;
        Ok(())
    }

    pub async fn get_global(&self) -> ControlPlaneResult<Global> {
        self.get(self.endpoint("global", &[])?, "section", "global").await
    }

    pub async fn put_global(&self, global: &Global) -> ControlPlaneResult<()> {
        self.write(reqwest::Method::PUT, "global", &[], global, "section", "global").await
    }

    pub async fn get_defaults(&self) -> ControlPlaneResult<Defaults> {
        self.get(self.endpoint("defaults", &[])?, "section", "defaults").await
    }

    pub async fn put_defaults(&self, defaults: &Defaults) -> ControlPlaneResult<()> {
        self.write(reqwest::Method::PUT, "defaults", &[], defaults, "section", "defaults").await
    }

    pub async fn get_backend(&self, name: &str) -> ControlPlaneResult<Backend> {
        self.get(self.endpoint(&format!("backends/{}", name), &[])?, "backend", name).await
    }

    pub async fn create_backend(&self, backend: &Backend) -> ControlPlaneResult<()> {
        self.write(reqwest::Method::POST, "backends", &[], backend, "backend", &backend.name).await
    }

    pub async fn put_backend(&self, backend: &Backend) -> ControlPlaneResult<()> {
        let path = format!("backends/{}", backend.name);
        self.write(reqwest::Method::PUT, &path, &[], backend, "backend", &backend.name).await
    }

    pub async fn get_servers(&self, backend: &str) -> ControlPlaneResult<Vec<Server>> {
        let url = self.endpoint("servers", &[("backend", backend)])?;
        self.get(url, "backend", backend).await
    }

    pub async fn get_server(&self, backend: &str, name: &str) -> ControlPlaneResult<Server> {
        let url = self.endpoint(&format!("servers/{}", name), &[("backend", backend)])?;
        self.get(url, "server", &format!("{}/{}", backend, name)).await
    }

    pub async fn create_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        let name = format!("{}/{}", backend, server.name);
        self.write(reqwest::Method::POST, "servers", &[("backend", backend)], server, "server", &name).await
    }

    pub async fn put_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        let path = format!("servers/{}", server.name);
        let name = format!("{}/{}", backend, server.name);
        self.write(reqwest::Method::PUT, &path, &[("backend", backend)], server, "server", &name).await
    }
}

/// Turn non-success answers into errors.
async fn check_status(
    response: reqwest::Response,
    kind: &'static str,
    name: &str,
) -> ControlPlaneResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ControlPlaneError::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    let message = response.text().await.unwrap_or_default();
    Err(ControlPlaneError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}
