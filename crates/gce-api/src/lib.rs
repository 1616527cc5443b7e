//! Typed Rust client for the Google Compute Engine REST API.
//!
//! Covers the subset needed for managing a single VM:
//! instances (get, insert, start, stop, reset, delete),
//! firewalls (get, insert), and operation polling.
//!
//! Authentication is a plain OAuth2 bearer token supplied by the caller;
//! credential acquisition (ADC, service-account flows) is out of scope.

mod types;

pub use types::*;

const BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("gce api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gce api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    /// The target resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status, .. } if status.as_u16() == 404)
    }

    /// Missing, expired, or under-scoped credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Api { status, .. } if status.as_u16() == 401 || status.as_u16() == 403)
    }

    /// Rate limiting, server-side failures, and connection errors are
    /// worth retrying; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Api { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            Error::Request(e) => e.is_connect() || e.is_timeout(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the Compute Engine REST API, scoped to one project and zone.
#[derive(Clone)]
pub struct GceClient {
    token: String,
    project: String,
    zone: String,
    http: reqwest::Client,
}

impl GceClient {
    pub fn new(
        token: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            project: project.into(),
            zone: zone.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn zonal_url(&self, path: &str) -> String {
        format!(
            "{BASE_URL}/projects/{}/zones/{}{path}",
            self.project, self.zone
        )
    }

    fn global_url(&self, path: &str) -> String {
        format!("{BASE_URL}/projects/{}/global{path}", self.project)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(
        resp: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<Option<reqwest::Response>> {
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(Some(resp))
    }

    // ── Instances ────────────────────────────────────────────────────

    pub async fn get_instance(&self, name: &str) -> Result<Instance> {
        let resp = self
            .http
            .get(self.zonal_url(&format!("/instances/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn insert_instance(&self, instance: &Instance) -> Result<Operation> {
        let resp = self
            .http
            .post(self.zonal_url("/instances"))
            .header("Authorization", self.auth())
            .json(instance)
            .send()
            .await?;

        Self::check(resp, "insert instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn start_instance(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .post(self.zonal_url(&format!("/instances/{name}/start")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "start instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn stop_instance(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .post(self.zonal_url(&format!("/instances/{name}/stop")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "stop instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn reset_instance(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .post(self.zonal_url(&format!("/instances/{name}/reset")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "reset instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_instance(&self, name: &str) -> Result<Option<Operation>> {
        let resp = self
            .http
            .delete(self.zonal_url(&format!("/instances/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        match Self::check_allow_404(resp, "delete instance").await? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }

    /// Set labels on an existing instance. Requires the current label
    /// fingerprint from a fresh `get_instance`.
    pub async fn set_labels(&self, name: &str, req: &SetLabelsRequest) -> Result<Operation> {
        let resp = self
            .http
            .post(self.zonal_url(&format!("/instances/{name}/setLabels")))
            .header("Authorization", self.auth())
            .json(req)
            .send()
            .await?;

        Self::check(resp, "set labels")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Firewalls ────────────────────────────────────────────────────

    pub async fn get_firewall(&self, name: &str) -> Result<Option<Firewall>> {
        let resp = self
            .http
            .get(self.global_url(&format!("/firewalls/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        match Self::check_allow_404(resp, "get firewall").await? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }

    pub async fn insert_firewall(&self, firewall: &Firewall) -> Result<Operation> {
        let resp = self
            .http
            .post(self.global_url("/firewalls"))
            .header("Authorization", self.auth())
            .json(firewall)
            .send()
            .await?;

        Self::check(resp, "insert firewall")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn get_zone_operation(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .get(self.zonal_url(&format!("/operations/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get zone operation")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn get_global_operation(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .get(self.global_url(&format!("/operations/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get global operation")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }
}
