//!
//! zbxgate HTTP façade
//! -------------------
//! This module defines the Axum-based HTTP API consumed by the static admin
//! UI. It owns the session cookie model and the route table; all backend
//! communication goes through the RPC client and the domain gateways.
//!
//! Responsibilities:
//! - Login/logout endpoints backed by the authentication broker.
//! - Session validation middleware gating every protected route.
//! - Cookie issue/clear helpers with one fixed lifetime policy.
//! - Thin request/response mapping onto the domain gateways.
//! - Background sweep of expired session keys.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway;
use crate::identity::{AuthBroker, SessionStore, UserProfile};
use crate::rpc::{RetryPolicy, RpcClient};
use crate::storage::MemoryKv;

const SESSION_COOKIE: &str = "zbx_session";

/// How often the background task prunes expired session keys.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub rpc: Arc<RpcClient>,
    pub sessions: SessionStore,
    pub broker: AuthBroker,
    pub cookie_secure: bool,
}

/// Resolved session attached to admitted requests by the middleware.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub auth_token: String,
    pub user: UserProfile,
}

pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()?).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let rpc = Arc::new(RpcClient::http(
        &config.backend_url,
        config.rpc_timeout,
        RetryPolicy { max_retries: config.rpc_max_retries, backoff_base: Duration::from_secs(1) },
    )?);
    let kv = Arc::new(MemoryKv::new());
    let sessions = SessionStore::new(kv.clone(), config.session_ttl);
    let broker = AuthBroker::new(rpc.clone(), sessions.clone());
    let state = AppState { rpc, sessions, broker, cookie_secure: config.cookie_secure };

    // Background sweeper for expired session keys.
    {
        let kv_for_sweep = kv.clone();
        tokio::spawn(async move {
            loop {
                let removed = kv_for_sweep.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "session_sweep");
                }
                tokio::time::sleep(SWEEP_INTERVAL).await;
            }
        });
    }

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting gateway on {} (backend {})", addr, config.backend_url);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Mount all HTTP routes. Split out of `run_with_config` so integration tests
/// can serve the same router against a stub backend.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/roles", get(roles_list))
        .route("/hosts", get(hosts_list))
        .route("/hosts/create", post(hosts_create))
        .route("/host-groups", post(host_groups_create))
        .route("/host-groups/add-host", post(host_groups_add_host))
        .route("/hosts/by-host-groups", post(hosts_by_groups))
        .route("/hosts/items", post(hosts_items))
        .route("/hosts/groups", get(hosts_groups))
        .route("/users", get(users_list))
        .route("/user/submit", post(users_create))
        .route("/user/modify", put(users_update))
        .route("/user/delete", delete(users_delete))
        .route("/users/host-groups", post(users_host_groups))
        .route("/users/groups", get(groups_list))
        .route("/user/groups/submit", post(groups_create))
        .route("/user/group/modify", put(groups_update))
        .route("/user/groups/permissions", put(groups_permissions))
        .route("/user/groups/{group_id}/delete", delete(groups_delete))
        .route("/dashboards", get(dashboards_list))
        .route("/dashboards/single/{dashboard_id}", get(dashboards_get))
        .route("/dashboards/client/new", post(dashboards_create))
        .route("/dashboards/{dashboard_id}", put(dashboards_update).delete(dashboards_delete))
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    // Login and logout stay public: logout with a stale or missing cookie
    // still clears it and reports success.
    let api = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .merge(protected);

    Router::new()
        .route("/health", get(|| async { "Report ok for zbxgate" }))
        .nest("/api/zabbix/v1", api)
        .with_state(state)
}

// --- session cookie helpers ---

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(sid: &str, max_age: Duration, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        sid,
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap()
}

fn clear_session_cookie(secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/",
        SESSION_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap()
}

// --- response shaping ---

fn ok_data(data: Value) -> Response {
    (StatusCode::OK, Json(json!({"success": true, "message": "ok", "data": data}))).into_response()
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": message})))
        .into_response()
}

fn error_response(err: &GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"success": false, "code": err.kind(), "message": err.message()})))
        .into_response()
}

fn respond(result: GatewayResult<Value>) -> Response {
    match result {
        Ok(data) => ok_data(data),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "gateway call failed");
            error_response(&e)
        }
    }
}

// --- session validation middleware ---

/// Binary gate in front of every protected route: resolve the session cookie
/// to a backend token or reject with 401 before any handler runs. A store
/// outage is surfaced as 5xx, not 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(sid) = parse_cookie(req.headers(), SESSION_COOKIE) else {
        return unauthorized("Authentication required");
    };
    match state.sessions.get(&sid).await {
        Ok(Some(record)) => {
            req.extensions_mut()
                .insert(SessionContext { auth_token: record.auth_token, user: record.user });
            next.run(req).await
        }
        Ok(None) => unauthorized("Session expired or invalid"),
        Err(e) => {
            error!(error = %e, "session lookup failed");
            error_response(&e)
        }
    }
}

// --- auth handlers ---

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return error_response(&GatewayError::validation("username and password are required"));
    }
    match state.broker.login(&payload.username, &payload.password).await {
        Ok(outcome) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                SET_COOKIE,
                set_session_cookie(&outcome.session_id, state.sessions.ttl(), state.cookie_secure),
            );
            (
                StatusCode::OK,
                headers,
                Json(json!({
                    "success": true,
                    "message": "Login successful",
                    "user": outcome.user.public_json(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "login failed");
            login_error_response(&e)
        }
    }
}

/// Login failures never reveal whether credentials were wrong or the backend
/// was unreachable; the body carries one generic message while the log above
/// keeps the specific kind.
fn login_error_response(err: &GatewayError) -> Response {
    const GENERIC: &str = "invalid credentials or server error";
    match err {
        GatewayError::Validation { .. } => error_response(err),
        GatewayError::GatewayTimeout { .. } | GatewayError::Infrastructure { .. } => {
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({"success": false, "message": GENERIC}))).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": GENERIC})))
            .into_response(),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        if let Err(e) = state.broker.logout(&sid).await {
            warn!(error = %e, "logout cleanup failed, clearing cookie anyway");
        }
    }
    let mut h = HeaderMap::new();
    h.insert(SET_COOKIE, clear_session_cookie(state.cookie_secure));
    (StatusCode::OK, h, Json(json!({"success": true}))).into_response()
}

/// Served from the cached snapshot; no backend round-trip.
async fn me(Extension(ctx): Extension<SessionContext>) -> Response {
    (StatusCode::OK, Json(json!({"success": true, "user": ctx.user.public_json()})))
        .into_response()
}

async fn roles_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    respond(gateway::users::get_roles(&state.rpc, &ctx.auth_token).await)
}

// --- host handlers ---

async fn hosts_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    respond(gateway::hosts::get_hosts(&state.rpc, &ctx.auth_token).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateHostPayload {
    host: String,
    name: Option<String>,
    ip: String,
    #[serde(default)]
    group_ids: Vec<String>,
    #[serde(default)]
    template_ids: Vec<String>,
}

async fn hosts_create(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<CreateHostPayload>,
) -> Response {
    let name = p.name.as_deref().unwrap_or(&p.host);
    respond(
        gateway::hosts::create_host(
            &state.rpc,
            &ctx.auth_token,
            &p.host,
            name,
            &p.ip,
            &p.group_ids,
            &p.template_ids,
        )
        .await,
    )
}

#[derive(Debug, Deserialize)]
struct NamePayload {
    #[serde(default)]
    name: String,
}

async fn host_groups_create(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<NamePayload>,
) -> Response {
    respond(gateway::hosts::create_host_group(&state.rpc, &ctx.auth_token, &p.name).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddHostToGroupPayload {
    host_id: String,
    group_id: String,
}

async fn host_groups_add_host(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<AddHostToGroupPayload>,
) -> Response {
    respond(
        gateway::hosts::add_host_to_group(&state.rpc, &ctx.auth_token, &p.host_id, &p.group_id)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostsByGroupsPayload {
    #[serde(default)]
    host_group_ids: Vec<String>,
}

async fn hosts_by_groups(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<HostsByGroupsPayload>,
) -> Response {
    respond(
        gateway::hosts::get_hosts_by_groups(&state.rpc, &ctx.auth_token, &p.host_group_ids).await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostItemsPayload {
    #[serde(default)]
    host_ids: Vec<String>,
    search_text: Option<String>,
    #[serde(default = "default_search_by")]
    search_by: String,
    #[serde(default)]
    exact: bool,
}

fn default_search_by() -> String {
    "name".to_string()
}

async fn hosts_items(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<HostItemsPayload>,
) -> Response {
    respond(
        gateway::hosts::get_host_items(
            &state.rpc,
            &ctx.auth_token,
            &p.host_ids,
            p.search_text.as_deref(),
            &p.search_by,
            p.exact,
        )
        .await,
    )
}

async fn hosts_groups(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    respond(gateway::hosts::get_host_groups(&state.rpc, &ctx.auth_token).await)
}

// --- user handlers ---

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

async fn users_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(q): Query<SearchQuery>,
) -> Response {
    respond(gateway::users::get_users(&state.rpc, &ctx.auth_token, q.search.as_deref()).await)
}

#[derive(Debug, Deserialize)]
struct CreateUserPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    passwd: String,
    name: Option<String>,
    surname: Option<String>,
    #[serde(rename = "roleId", default)]
    role_id: String,
}

async fn users_create(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<CreateUserPayload>,
) -> Response {
    if p.username.is_empty() || p.passwd.is_empty() || p.role_id.is_empty() {
        return error_response(&GatewayError::validation(
            "username, passwd and roleId are required",
        ));
    }
    match gateway::users::create_user(
        &state.rpc,
        &ctx.auth_token,
        &p.username,
        &p.passwd,
        p.name.as_deref(),
        p.surname.as_deref(),
        &p.role_id,
    )
    .await
    {
        Ok(data) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "message": "ok", "data": data})),
        )
            .into_response(),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "user creation failed");
            error_response(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateUserPayload {
    #[serde(default)]
    userid: String,
    username: Option<String>,
    name: Option<String>,
    surname: Option<String>,
    #[serde(rename = "roleId")]
    role_id: Option<String>,
}

async fn users_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<UpdateUserPayload>,
) -> Response {
    if p.userid.is_empty() {
        return error_response(&GatewayError::validation("userid is required for update"));
    }
    // Sparse payload: only send what was provided.
    let mut payload = json!({"userid": p.userid});
    if let Some(v) = p.username {
        payload["username"] = json!(v);
    }
    if let Some(v) = p.name {
        payload["name"] = json!(v);
    }
    if let Some(v) = p.surname {
        payload["surname"] = json!(v);
    }
    if let Some(v) = p.role_id {
        payload["roleid"] = json!(v);
    }
    respond(gateway::users::update_user(&state.rpc, &ctx.auth_token, payload).await)
}

#[derive(Debug, Deserialize)]
struct UseridPayload {
    #[serde(default)]
    userid: String,
}

async fn users_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<UseridPayload>,
) -> Response {
    if p.userid.is_empty() {
        return error_response(&GatewayError::validation("userid is required for deletion"));
    }
    respond(gateway::users::delete_user(&state.rpc, &ctx.auth_token, &p.userid).await)
}

async fn users_host_groups(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<UseridPayload>,
) -> Response {
    if p.userid.is_empty() {
        return error_response(&GatewayError::validation("userid is required"));
    }
    respond(gateway::users::get_user_host_groups(&state.rpc, &ctx.auth_token, &p.userid).await)
}

// --- user group handlers ---

async fn groups_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    respond(gateway::groups::get_user_groups_with_users(&state.rpc, &ctx.auth_token).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    user_ids: Vec<String>,
    #[serde(default)]
    host_group_ids: Vec<String>,
    #[serde(default = "default_permission")]
    permission: i64,
}

fn default_permission() -> i64 {
    2 // read
}

/// Create the group, then grant host-group access when ids were provided.
async fn groups_create(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<CreateGroupPayload>,
) -> Response {
    let group_id = match gateway::groups::create_user_group(
        &state.rpc,
        &ctx.auth_token,
        &p.name,
        &p.user_ids,
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "user group creation failed");
            return error_response(&e);
        }
    };

    if !p.host_group_ids.is_empty() {
        if let Err(e) = gateway::groups::set_permissions(
            &state.rpc,
            &ctx.auth_token,
            &group_id,
            &p.host_group_ids,
            p.permission,
        )
        .await
        {
            warn!(kind = e.kind(), error = %e, group_id, "permission setup failed after create");
            return error_response(&e);
        }
    }

    (
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "ok", "data": {"usrgrpid": group_id}})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateGroupPayload {
    #[serde(default)]
    group_id: String,
    name: Option<String>,
    user_ids: Option<Vec<String>>,
}

async fn groups_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<UpdateGroupPayload>,
) -> Response {
    if p.group_id.is_empty() {
        return error_response(&GatewayError::validation("groupId is required for update"));
    }
    let mut payload = json!({"usrgrpid": p.group_id});
    if let Some(v) = p.name {
        payload["name"] = json!(v);
    }
    if let Some(ids) = p.user_ids {
        payload["users"] =
            Value::Array(ids.iter().map(|id| json!({"userid": id})).collect());
    }
    respond(gateway::groups::update_user_group(&state.rpc, &ctx.auth_token, payload).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupPermissionsPayload {
    #[serde(default)]
    user_group_id: String,
    #[serde(default)]
    host_group_ids: Vec<String>,
    #[serde(default = "default_permission")]
    permission: i64,
}

async fn groups_permissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<GroupPermissionsPayload>,
) -> Response {
    if p.user_group_id.is_empty() {
        return error_response(&GatewayError::validation("userGroupId is required"));
    }
    respond(
        gateway::groups::set_permissions(
            &state.rpc,
            &ctx.auth_token,
            &p.user_group_id,
            &p.host_group_ids,
            p.permission,
        )
        .await,
    )
}

async fn groups_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(group_id): Path<String>,
) -> Response {
    respond(gateway::groups::delete_user_group(&state.rpc, &ctx.auth_token, &group_id).await)
}

// --- dashboard handlers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardsQuery {
    client_user_id: Option<String>,
    #[serde(default)]
    include_widgets: bool,
    search: Option<String>,
}

async fn dashboards_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(q): Query<DashboardsQuery>,
) -> Response {
    respond(
        gateway::dashboards::get_dashboards(
            &state.rpc,
            &ctx.auth_token,
            q.client_user_id.as_deref(),
            q.include_widgets,
            q.search.as_deref(),
        )
        .await,
    )
}

async fn dashboards_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(dashboard_id): Path<String>,
) -> Response {
    respond(gateway::dashboards::get_dashboard(&state.rpc, &ctx.auth_token, &dashboard_id).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDashboardPayload {
    #[serde(default)]
    dashboard_name: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    pages: Value,
}

async fn dashboards_create(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(p): Json<CreateDashboardPayload>,
) -> Response {
    if p.dashboard_name.is_empty() || p.user_id.is_empty() {
        return error_response(&GatewayError::validation(
            "dashboardName and userId are required",
        ));
    }
    match gateway::dashboards::create_dashboard(
        &state.rpc,
        &ctx.auth_token,
        &p.dashboard_name,
        &p.user_id,
        p.pages,
    )
    .await
    {
        Ok(data) => (
            StatusCode::CREATED,
            Json(json!({"success": true, "message": "ok", "data": data})),
        )
            .into_response(),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "dashboard creation failed");
            error_response(&e)
        }
    }
}

async fn dashboards_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(dashboard_id): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    respond(
        gateway::dashboards::update_dashboard(&state.rpc, &ctx.auth_token, &dashboard_id, payload)
            .await,
    )
}

async fn dashboards_delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(dashboard_id): Path<String>,
) -> Response {
    respond(
        gateway::dashboards::delete_dashboard(&state.rpc, &ctx.auth_token, &dashboard_id).await,
    )
}
