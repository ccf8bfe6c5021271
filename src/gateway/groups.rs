//! usergroup.* method shaping, including the two-phase permissions flow.

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::rpc::RpcClient;

/// List user groups with their members and host-group rights; each member
/// additionally carries its full group list resolved from a second read.
pub async fn get_user_groups_with_users(rpc: &RpcClient, auth_token: &str) -> GatewayResult<Value> {
    let groups = rpc
        .call(
            "usergroup.get",
            json!({
                "output": ["usrgrpid", "name"],
                "selectUsers": ["userid", "username", "name", "surname"],
                "selectHostGroupRights": ["id", "permission"]
            }),
            Some(auth_token),
        )
        .await?;
    let users = rpc
        .call(
            "user.get",
            json!({
                "output": ["userid", "username", "name", "surname"],
                "selectUsrgrps": ["usrgrpid", "name"]
            }),
            Some(auth_token),
        )
        .await?;

    let groups_of = |userid: &str| -> Value {
        users
            .as_array()
            .into_iter()
            .flatten()
            .find(|u| u.get("userid").and_then(|v| v.as_str()) == Some(userid))
            .and_then(|u| u.get("usrgrps").cloned())
            .unwrap_or(json!([]))
    };

    let shaped: Vec<Value> = groups
        .as_array()
        .into_iter()
        .flatten()
        .map(|group| {
            let members: Vec<Value> = group
                .get("users")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .map(|u| {
                    let userid = u.get("userid").and_then(|v| v.as_str()).unwrap_or_default();
                    json!({
                        "userid": userid,
                        "username": u.get("username").cloned().unwrap_or(Value::Null),
                        "name": u.get("name").and_then(|v| v.as_str()).unwrap_or(""),
                        "surname": u.get("surname").and_then(|v| v.as_str()).unwrap_or(""),
                        "usrgrps": groups_of(userid),
                    })
                })
                .collect();
            let rights = group.get("hostgroup_rights").cloned().unwrap_or(json!([]));
            let right_ids: Vec<Value> = rights
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|r| r.get("id").cloned())
                .collect();
            json!({
                "usrgrpid": group.get("usrgrpid").cloned().unwrap_or(Value::Null),
                "name": group.get("name").cloned().unwrap_or(Value::Null),
                "users": members,
                "hostPermissions": rights,
                "hostGroupIds": right_ids,
            })
        })
        .collect();

    Ok(Value::Array(shaped))
}

/// Create a user group and return the new group id.
pub async fn create_user_group(
    rpc: &RpcClient,
    auth_token: &str,
    name: &str,
    user_ids: &[String],
) -> GatewayResult<String> {
    if name.trim().is_empty() {
        return Err(GatewayError::validation("group name is required"));
    }
    let members: Vec<Value> = user_ids.iter().map(|id| json!({"userid": id})).collect();
    let result = rpc
        .call(
            "usergroup.create",
            json!({"name": name, "users": members}),
            Some(auth_token),
        )
        .await?;
    result
        .get("usrgrpids")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str().map(|s| s.to_string()).or_else(|| v.as_i64().map(|n| n.to_string())))
        .ok_or_else(|| GatewayError::backend("user group creation returned no id"))
}

pub async fn update_user_group(
    rpc: &RpcClient,
    auth_token: &str,
    payload: Value,
) -> GatewayResult<Value> {
    rpc.call("usergroup.update", payload, Some(auth_token)).await
}

/// Grant a user group access to host groups. Two sequential updates: GUI
/// access must be enabled before rights take effect for the frontend, then
/// the rights themselves (2 = read, 3 = write). A verification read follows.
pub async fn set_permissions(
    rpc: &RpcClient,
    auth_token: &str,
    user_group_id: &str,
    host_group_ids: &[String],
    permission: i64,
) -> GatewayResult<Value> {
    if host_group_ids.is_empty() {
        return Err(GatewayError::validation("at least one host group id is required"));
    }

    rpc.call(
        "usergroup.update",
        json!({"usrgrpid": user_group_id, "gui_access": 1}),
        Some(auth_token),
    )
    .await?;

    let rights: Vec<Value> = host_group_ids
        .iter()
        .map(|id| json!({"id": id, "permission": permission}))
        .collect();
    let update_result = rpc
        .call(
            "usergroup.update",
            json!({"usrgrpid": user_group_id, "hostgroup_rights": rights}),
            Some(auth_token),
        )
        .await?;

    let verify_result = rpc
        .call(
            "usergroup.get",
            json!({
                "usrgrpids": user_group_id,
                "selectHostGroupRights": "extend",
                "output": ["gui_access"]
            }),
            Some(auth_token),
        )
        .await?;

    Ok(json!({"updateResult": update_result, "verifyResult": verify_result}))
}

pub async fn delete_user_group(
    rpc: &RpcClient,
    auth_token: &str,
    group_id: &str,
) -> GatewayResult<Value> {
    rpc.call("usergroup.delete", json!([group_id]), Some(auth_token)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{client_for, rpc_result, RecordingTransport};

    #[tokio::test]
    async fn permissions_flow_enables_gui_access_before_setting_rights() {
        let t = RecordingTransport::new(vec![
            rpc_result(json!({"usrgrpids": ["12"]})),
            rpc_result(json!({"usrgrpids": ["12"]})),
            rpc_result(json!([{"gui_access": "1"}])),
        ]);
        let rpc = client_for(&t);
        set_permissions(&rpc, "tok", "12", &["4".to_string(), "5".to_string()], 2)
            .await
            .unwrap();

        let seen = t.seen.lock();
        assert_eq!(seen[0].0, "usergroup.update");
        assert_eq!(seen[0].1["gui_access"], json!(1));
        assert_eq!(seen[1].0, "usergroup.update");
        assert_eq!(
            seen[1].1["hostgroup_rights"],
            json!([{"id": "4", "permission": 2}, {"id": "5", "permission": 2}])
        );
        assert_eq!(seen[2].0, "usergroup.get");
    }

    #[tokio::test]
    async fn empty_host_group_list_is_rejected_before_any_call() {
        let t = RecordingTransport::new(vec![]);
        let rpc = client_for(&t);
        let err = set_permissions(&rpc, "tok", "12", &[], 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
        assert!(t.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn create_returns_the_first_new_group_id() {
        let t = RecordingTransport::new(vec![rpc_result(json!({"usrgrpids": ["31"]}))]);
        let rpc = client_for(&t);
        let id = create_user_group(&rpc, "tok", "ops", &["7".to_string()]).await.unwrap();
        assert_eq!(id, "31");

        let (_, params) = t.seen.lock()[0].clone();
        assert_eq!(params["users"], json!([{"userid": "7"}]));
    }
}
