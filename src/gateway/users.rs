//! user.* and role.* method shaping.

use serde_json::{json, Map, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::rpc::RpcClient;

/// List users with their role; optional wildcard search over username, name
/// and surname.
pub async fn get_users(
    rpc: &RpcClient,
    auth_token: &str,
    search: Option<&str>,
) -> GatewayResult<Value> {
    let mut params = json!({
        "output": ["userid", "username", "name", "surname"],
        "selectRole": ["roleid", "name"],
        "sortfield": "userid",
        "sortorder": "DESC",
    });
    if let Some(text) = search {
        params["search"] = json!({"username": text, "name": text, "surname": text});
        params["searchWildcardsEnabled"] = json!(true);
    }
    rpc.call("user.get", params, Some(auth_token)).await
}

pub async fn create_user(
    rpc: &RpcClient,
    auth_token: &str,
    username: &str,
    password: &str,
    name: Option<&str>,
    surname: Option<&str>,
    role_id: &str,
) -> GatewayResult<Value> {
    let mut params = Map::new();
    params.insert("username".into(), json!(username));
    params.insert("passwd".into(), json!(password));
    params.insert("roleid".into(), json!(role_id));
    if let Some(v) = name {
        params.insert("name".into(), json!(v));
    }
    if let Some(v) = surname {
        params.insert("surname".into(), json!(v));
    }
    rpc.call("user.create", Value::Object(params), Some(auth_token)).await
}

/// Sparse update: the caller sends only the fields it wants changed, plus the
/// mandatory `userid`.
pub async fn update_user(rpc: &RpcClient, auth_token: &str, payload: Value) -> GatewayResult<Value> {
    rpc.call("user.update", payload, Some(auth_token)).await
}

pub async fn delete_user(rpc: &RpcClient, auth_token: &str, userid: &str) -> GatewayResult<Value> {
    rpc.call("user.delete", json!([userid]), Some(auth_token)).await
}

pub async fn get_roles(rpc: &RpcClient, auth_token: &str) -> GatewayResult<Value> {
    rpc.call("role.get", json!({"output": ["roleid", "name", "type"]}), Some(auth_token)).await
}

/// Resolve the host-group permissions a user holds through its user groups.
/// One `usergroup.get` per group, then a single `hostgroup.get` to attach
/// display names.
pub async fn get_user_host_groups(
    rpc: &RpcClient,
    auth_token: &str,
    userid: &str,
) -> GatewayResult<Value> {
    let users = rpc
        .call(
            "user.get",
            json!({
                "userids": userid,
                "output": ["userid", "username"],
                "selectUsrgrps": "extend"
            }),
            Some(auth_token),
        )
        .await?;
    let user = users
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| GatewayError::backend("user not found"))?;
    let groups = user.get("usrgrps").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut out: Vec<Value> = Vec::with_capacity(groups.len());
    for group in &groups {
        let usrgrpid = group.get("usrgrpid").and_then(|v| v.as_str()).unwrap_or_default();
        let details = rpc
            .call(
                "usergroup.get",
                json!({
                    "usrgrpids": usrgrpid,
                    "output": ["usrgrpid", "name"],
                    "selectHostGroupRights": "extend"
                }),
                Some(auth_token),
            )
            .await?;
        let rights = details
            .as_array()
            .and_then(|a| a.first())
            .and_then(|g| g.get("hostgroup_rights"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        out.push(json!({
            "usrgrpid": usrgrpid,
            "name": group.get("name").cloned().unwrap_or(Value::Null),
            "hostPermissions": rights,
        }));
    }

    // Attach host-group names in one read.
    let host_groups = super::hosts::get_host_groups(rpc, auth_token).await?;
    let name_of = |id: &str| -> Value {
        host_groups
            .as_array()
            .into_iter()
            .flatten()
            .find(|hg| hg.get("groupid").and_then(|v| v.as_str()) == Some(id))
            .and_then(|hg| hg.get("name").cloned())
            .unwrap_or(Value::String("Unknown".into()))
    };

    let enriched: Vec<Value> = out
        .into_iter()
        .map(|group| {
            let rights = group["hostPermissions"].as_array().cloned().unwrap_or_default();
            let host_groups: Vec<Value> = rights
                .iter()
                .map(|hp| {
                    let id = hp.get("id").and_then(|v| v.as_str()).unwrap_or_default();
                    json!({
                        "groupId": id,
                        "name": name_of(id),
                        "permission": hp.get("permission")
                            .and_then(|v| v.as_str())
                            .and_then(|s| s.parse::<i64>().ok())
                            .or_else(|| hp.get("permission").and_then(|v| v.as_i64()))
                            .unwrap_or(0),
                    })
                })
                .collect();
            json!({
                "usrgrpid": group["usrgrpid"],
                "name": group["name"],
                "hostGroups": host_groups,
            })
        })
        .collect();

    Ok(Value::Array(enriched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{client_for, rpc_result, RecordingTransport};

    #[tokio::test]
    async fn search_enables_wildcards_over_all_identity_fields() {
        let t = RecordingTransport::new(vec![rpc_result(json!([]))]);
        let rpc = client_for(&t);
        get_users(&rpc, "tok", Some("ali")).await.unwrap();

        let (method, params) = t.seen.lock()[0].clone();
        assert_eq!(method, "user.get");
        assert_eq!(params["search"]["surname"], json!("ali"));
        assert_eq!(params["searchWildcardsEnabled"], json!(true));
    }

    #[tokio::test]
    async fn listing_without_search_sends_no_search_block() {
        let t = RecordingTransport::new(vec![rpc_result(json!([]))]);
        let rpc = client_for(&t);
        get_users(&rpc, "tok", None).await.unwrap();

        let (_, params) = t.seen.lock()[0].clone();
        assert!(params.get("search").is_none());
    }

    #[tokio::test]
    async fn create_user_skips_absent_optional_fields() {
        let t = RecordingTransport::new(vec![rpc_result(json!({"userids": ["9"]}))]);
        let rpc = client_for(&t);
        create_user(&rpc, "tok", "bob", "pw", None, Some("B"), "3").await.unwrap();

        let (method, params) = t.seen.lock()[0].clone();
        assert_eq!(method, "user.create");
        assert!(params.get("name").is_none());
        assert_eq!(params["surname"], json!("B"));
        assert_eq!(params["roleid"], json!("3"));
    }
}
