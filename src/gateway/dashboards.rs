//! dashboard.* method shaping.
//! Page and widget JSON is carried verbatim between the admin UI and the
//! backend; the gateway does not assemble widget fields.

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::rpc::RpcClient;

pub async fn get_dashboards(
    rpc: &RpcClient,
    auth_token: &str,
    user_filter: Option<&str>,
    include_pages: bool,
    search: Option<&str>,
) -> GatewayResult<Value> {
    let mut params = json!({
        "output": ["dashboardid", "name", "userid"],
        "sortfield": "name",
    });
    if include_pages {
        params["selectPages"] = json!("extend");
    }
    if let Some(userid) = user_filter {
        params["filter"] = json!({"userid": userid});
    }
    if let Some(text) = search {
        params["search"] = json!({"name": text});
        params["searchWildcardsEnabled"] = json!(true);
    }
    rpc.call("dashboard.get", params, Some(auth_token)).await
}

pub async fn get_dashboard(
    rpc: &RpcClient,
    auth_token: &str,
    dashboard_id: &str,
) -> GatewayResult<Value> {
    let found = rpc
        .call(
            "dashboard.get",
            json!({
                "dashboardids": dashboard_id,
                "output": "extend",
                "selectPages": "extend"
            }),
            Some(auth_token),
        )
        .await?;
    found
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .ok_or_else(|| GatewayError::backend("dashboard not found"))
}

/// Create a dashboard owned by the given user with caller-supplied pages.
pub async fn create_dashboard(
    rpc: &RpcClient,
    auth_token: &str,
    name: &str,
    user_id: &str,
    pages: Value,
) -> GatewayResult<Value> {
    if name.trim().is_empty() {
        return Err(GatewayError::validation("dashboard name is required"));
    }
    rpc.call(
        "dashboard.create",
        json!({
            "name": name,
            "userid": user_id,
            "pages": pages,
            "auto_start": 1,
        }),
        Some(auth_token),
    )
    .await
}

/// Sparse update; the mandatory id is merged into whatever fields the caller
/// provided.
pub async fn update_dashboard(
    rpc: &RpcClient,
    auth_token: &str,
    dashboard_id: &str,
    mut payload: Value,
) -> GatewayResult<Value> {
    let Some(obj) = payload.as_object_mut() else {
        return Err(GatewayError::validation("dashboard update payload must be an object"));
    };
    obj.insert("dashboardid".into(), json!(dashboard_id));
    rpc.call("dashboard.update", payload, Some(auth_token)).await
}

pub async fn delete_dashboard(
    rpc: &RpcClient,
    auth_token: &str,
    dashboard_id: &str,
) -> GatewayResult<Value> {
    rpc.call("dashboard.delete", json!([dashboard_id]), Some(auth_token)).await
}
