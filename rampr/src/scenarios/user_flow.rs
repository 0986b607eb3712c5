use anyhow::Context as _;
use rampr_core::{
    IterationContext, IterationStatus, MetricId, MetricKind, Registry, Scenario, ScenarioFault,
    ScenarioResult,
};
use rampr_http::{HttpClient, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

pub(crate) const METRIC_HTTP_REQUESTS: &str = "http_requests";
pub(crate) const METRIC_HTTP_REQUESTS_SUCCESS: &str = "http_requests_success";

pub(crate) const CHECK_REGISTER: &str = "register status was 200";
pub(crate) const CHECK_GET_BY_ID: &str = "get user by ID status was 200";
pub(crate) const CHECK_GET_BY_USERNAME: &str = "get user by username status was 200";
pub(crate) const CHECK_PROMOTE: &str = "promote user status was 200";

const USER_PASSWORD: &str = "qwerty123";
const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "superSecretAdminPassword123";
const DEFAULT_MISSING_PASSWORD_PROBABILITY: f64 = 0.05;

#[derive(Debug, Serialize)]
struct RegisterPayload<'a> {
    username: &'a str,
    name: &'a str,
    birthdate: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Registered {
    uid: u64,
}

/// Account lifecycle against the demo user service: register, fetch by id and by
/// username, then promote with the admin account.
pub(crate) struct UserFlow {
    client: HttpClient,
    base_url: String,
    missing_password_probability: f64,
    http_requests: MetricId,
    http_requests_success: MetricId,
}

impl UserFlow {
    pub(crate) fn new(base_url: &str, metrics: &Registry) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(base_url)
            .with_context(|| format!("invalid base url `{base_url}`"))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "invalid base url `{base_url}` (expected http:// or https://)"
        );

        let http_requests = metrics
            .register(METRIC_HTTP_REQUESTS, MetricKind::Counter)
            .context("failed to register user-flow metrics")?;
        let http_requests_success = metrics
            .register(METRIC_HTTP_REQUESTS_SUCCESS, MetricKind::Rate)
            .context("failed to register user-flow metrics")?;

        Ok(Self {
            client: HttpClient::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            missing_password_probability: DEFAULT_MISSING_PASSWORD_PROBABILITY,
            http_requests,
            http_requests_success,
        })
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_missing_password_probability(mut self, p: f64) -> Self {
        self.missing_password_probability = p.clamp(0.0, 1.0);
        self
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, ScenarioFault> {
        self.client
            .request(req)
            .await
            .map_err(|err| ScenarioFault::from_error(&err))
    }

    async fn register(&self, username: &str) -> Result<HttpResponse, ScenarioFault> {
        let include_password = fastrand::f64() >= self.missing_password_probability;
        let payload = RegisterPayload {
            username,
            name: "Gena Boolkin",
            birthdate: "2024-04-24",
            password: include_password.then_some(USER_PASSWORD),
        };
        let body = serde_json::to_vec(&payload).map_err(|err| ScenarioFault::from_error(&err))?;

        self.send(HttpRequest::post_json(self.url("/user-register"), body))
            .await
    }

    async fn follow_up(
        &self,
        ctx: &IterationContext,
        username: &str,
        registered: &HttpResponse,
    ) -> Result<(), ScenarioFault> {
        let Registered { uid } = serde_json::from_slice(&registered.body).map_err(|err| {
            ScenarioFault::new(format!("register response has no uid: {err}"))
        })?;

        let res = self
            .send(
                HttpRequest::post(self.url(&format!("/user-get?id={uid}")), Default::default())
                    .basic_auth(username, USER_PASSWORD),
            )
            .await?;
        ctx.checkpoint(CHECK_GET_BY_ID, || res.status == 200);

        let res = self
            .send(
                HttpRequest::post(
                    self.url(&format!("/user-get?username={username}")),
                    Default::default(),
                )
                .basic_auth(username, USER_PASSWORD),
            )
            .await?;
        ctx.checkpoint(CHECK_GET_BY_USERNAME, || res.status == 200);

        let res = self
            .send(
                HttpRequest::post(
                    self.url(&format!("/user-promote?id={uid}")),
                    Default::default(),
                )
                .basic_auth(ADMIN_USERNAME, ADMIN_PASSWORD),
            )
            .await?;
        ctx.checkpoint(CHECK_PROMOTE, || res.status == 200);

        Ok(())
    }
}

impl Scenario for UserFlow {
    async fn iteration(&self, ctx: IterationContext) -> ScenarioResult {
        let username = format!("user_{}_{}", ctx.vu_id(), ctx.iteration());

        let (registered, outcome) = match self.register(&username).await {
            Ok(res) => {
                let registered = ctx.checkpoint(CHECK_REGISTER, || res.status == 200);
                let outcome = if registered {
                    self.follow_up(&ctx, &username, &res).await
                } else {
                    Ok(())
                };
                (registered, outcome)
            }
            Err(fault) => (false, Err(fault)),
        };

        // Counted on every path, including transport faults.
        let metrics = ctx.metrics();
        metrics
            .add(self.http_requests, 1)
            .and_then(|()| metrics.add_rate(self.http_requests_success, registered))
            .map_err(|err| ScenarioFault::from_error(&err))?;

        outcome?;
        Ok(IterationStatus::from(registered))
    }
}
