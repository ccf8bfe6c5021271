//! host.*, hostgroup.* and item.* method shaping.

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::rpc::RpcClient;

pub async fn get_hosts(rpc: &RpcClient, auth_token: &str) -> GatewayResult<Value> {
    rpc.call(
        "host.get",
        json!({"output": ["hostid", "name"], "monitored_hosts": true}),
        Some(auth_token),
    )
    .await
}

/// Create a host with a single agent interface (type 1, port 10050).
pub async fn create_host(
    rpc: &RpcClient,
    auth_token: &str,
    host: &str,
    name: &str,
    ip: &str,
    group_ids: &[String],
    template_ids: &[String],
) -> GatewayResult<Value> {
    if group_ids.is_empty() {
        return Err(GatewayError::validation("at least one host group is required"));
    }

    let mut params = json!({
        "host": host,
        "name": name,
        "interfaces": [{
            "type": 1,
            "main": 1,
            "useip": 1,
            "ip": ip,
            "dns": "",
            "port": "10050"
        }],
        "groups": group_ids.iter().map(|id| json!({"groupid": id})).collect::<Vec<_>>(),
    });
    if !template_ids.is_empty() {
        params["templates"] =
            Value::Array(template_ids.iter().map(|id| json!({"templateid": id})).collect());
    }
    rpc.call("host.create", params, Some(auth_token)).await
}

pub async fn create_host_group(rpc: &RpcClient, auth_token: &str, name: &str) -> GatewayResult<Value> {
    if name.trim().is_empty() {
        return Err(GatewayError::validation("host group name is required"));
    }
    rpc.call("hostgroup.create", json!({"name": name}), Some(auth_token)).await
}

pub async fn add_host_to_group(
    rpc: &RpcClient,
    auth_token: &str,
    host_id: &str,
    group_id: &str,
) -> GatewayResult<Value> {
    rpc.call(
        "host.update",
        json!({"hostid": host_id, "groups": [{"groupid": group_id}]}),
        Some(auth_token),
    )
    .await
}

pub async fn get_hosts_by_groups(
    rpc: &RpcClient,
    auth_token: &str,
    group_ids: &[String],
) -> GatewayResult<Value> {
    if group_ids.is_empty() {
        return Ok(json!([]));
    }
    rpc.call(
        "host.get",
        json!({"groupids": group_ids, "output": ["hostid", "name"]}),
        Some(auth_token),
    )
    .await
}

/// Fetch items for the given hosts, optionally narrowed by an exact filter or
/// wildcard search on `name` or `key_`. Search text is whitespace-normalized
/// because the admin UI pastes multi-line item names.
pub async fn get_host_items(
    rpc: &RpcClient,
    auth_token: &str,
    host_ids: &[String],
    search_text: Option<&str>,
    search_by: &str,
    exact: bool,
) -> GatewayResult<Value> {
    let mut params = json!({
        "hostids": host_ids,
        "output": ["itemid", "name", "key_"],
    });

    let clean: Option<String> = search_text.map(|t| {
        t.replace('\n', " ").split_whitespace().collect::<Vec<_>>().join(" ")
    });
    if let Some(text) = clean.filter(|t| !t.is_empty()) {
        if exact {
            params["filter"] = json!({search_by: text});
        } else {
            params["search"] = json!({search_by: text});
            params["searchWildcardsEnabled"] = json!(true);
        }
    }

    rpc.call("item.get", params, Some(auth_token)).await
}

pub async fn get_host_groups(rpc: &RpcClient, auth_token: &str) -> GatewayResult<Value> {
    rpc.call(
        "hostgroup.get",
        json!({"output": ["groupid", "name"], "sortfield": "name"}),
        Some(auth_token),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{client_for, rpc_result, RecordingTransport};

    #[tokio::test]
    async fn create_host_requires_a_group_and_shapes_the_agent_interface() {
        let t = RecordingTransport::new(vec![rpc_result(json!({"hostids": ["2"]}))]);
        let rpc = client_for(&t);

        let err = create_host(&rpc, "tok", "web01", "Web 01", "10.0.0.5", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));

        create_host(&rpc, "tok", "web01", "Web 01", "10.0.0.5", &["4".to_string()], &[])
            .await
            .unwrap();
        let (method, params) = t.seen.lock()[0].clone();
        assert_eq!(method, "host.create");
        assert_eq!(params["interfaces"][0]["port"], json!("10050"));
        assert!(params.get("templates").is_none());
    }

    #[tokio::test]
    async fn item_search_text_is_whitespace_normalized() {
        let t = RecordingTransport::new(vec![rpc_result(json!([]))]);
        let rpc = client_for(&t);
        get_host_items(
            &rpc,
            "tok",
            &["10".to_string()],
            Some("Bits\nreceived   on eth0"),
            "name",
            false,
        )
        .await
        .unwrap();

        let (_, params) = t.seen.lock()[0].clone();
        assert_eq!(params["search"]["name"], json!("Bits received on eth0"));
        assert_eq!(params["searchWildcardsEnabled"], json!(true));
    }

    #[tokio::test]
    async fn hosts_by_empty_group_list_short_circuits() {
        let t = RecordingTransport::new(vec![]);
        let rpc = client_for(&t);
        let out = get_hosts_by_groups(&rpc, "tok", &[]).await.unwrap();
        assert_eq!(out, json!([]));
        assert!(t.seen.lock().is_empty());
    }
}
