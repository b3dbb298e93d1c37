//! Per-operation validation of raw responses
//!
//! Each decoder consumes a [`GenericResponse`]. A transport or status failure
//! is forwarded unchanged without looking at the body; a missing or mistyped
//! field becomes `FAILED_PRECONDITION`.

use serde_json::Map;
use serde_json::Value;

use super::GenericResponse;
use crate::Error;
use crate::ErrorCode;
use crate::Node;
use crate::Result;
use crate::WatchUpdate;

type JsonObject = Map<String, Value>;

fn node_object(body: &Value) -> Result<&JsonObject> {
    body.get("node")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::missing_field("node"))
}

fn int_field(
    obj: &JsonObject,
    field: &str,
) -> Result<i64> {
    obj.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::missing_field(field))
}

fn str_field<'a>(
    obj: &'a JsonObject,
    field: &str,
) -> Result<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_field(field))
}

fn check_index_order(
    created_index: i64,
    modified_index: i64,
) -> Result<()> {
    if created_index > modified_index {
        return Err(Error::api(
            ErrorCode::FailedPrecondition,
            format!("Invalid JSON: createdIndex {created_index} is above modifiedIndex {modified_index}"),
        ));
    }
    Ok(())
}

/// Reads the four fields every value-bearing node carries.
fn value_node(obj: &JsonObject) -> Result<Node> {
    let created_index = int_field(obj, "createdIndex")?;
    let modified_index = int_field(obj, "modifiedIndex")?;
    let key = str_field(obj, "key")?;
    let value = str_field(obj, "value")?;
    check_index_order(created_index, modified_index)?;

    Ok(Node::new(created_index, modified_index, key, value))
}

/// Creation leaves both indices equal.
fn created_index(obj: &JsonObject) -> Result<i64> {
    let created_index = int_field(obj, "createdIndex")?;
    let modified_index = int_field(obj, "modifiedIndex")?;
    if created_index != modified_index {
        return Err(Error::api(
            ErrorCode::FailedPrecondition,
            format!("Invalid JSON: created node has createdIndex {created_index} != modifiedIndex {modified_index}"),
        ));
    }
    Ok(modified_index)
}

pub(crate) fn decode_get(resp: GenericResponse) -> Result<(Node, i64)> {
    resp.status?;
    let node = value_node(node_object(&resp.json_body)?)?;
    Ok((node, resp.etcd_index))
}

pub(crate) fn decode_get_all(resp: GenericResponse) -> Result<(Vec<Node>, i64)> {
    resp.status?;
    let node = node_object(&resp.json_body)?;

    let is_dir = node
        .get("dir")
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::missing_field("dir"))?;
    if !is_dir {
        return Err(Error::invalid_argument("Not a directory"));
    }

    let Some(children) = node.get("nodes") else {
        // empty directory
        return Ok((Vec::new(), resp.etcd_index));
    };
    let children = children
        .as_array()
        .ok_or_else(|| Error::missing_field("nodes"))?;

    let mut values = Vec::with_capacity(children.len());
    for (i, entry) in children.iter().enumerate() {
        let entry = entry.as_object().ok_or_else(|| {
            Error::api(
                ErrorCode::FailedPrecondition,
                format!("Invalid JSON: Couldn't get 'nodes' index {i}"),
            )
        })?;
        values.push(value_node(entry)?);
    }

    Ok((values, resp.etcd_index))
}

pub(crate) fn decode_create(resp: GenericResponse) -> Result<i64> {
    resp.status?;
    created_index(node_object(&resp.json_body)?)
}

pub(crate) fn decode_create_in_queue(resp: GenericResponse) -> Result<(String, i64)> {
    resp.status?;
    let node = node_object(&resp.json_body)?;
    let index = created_index(node)?;
    let key = str_field(node, "key")?;
    Ok((key.to_string(), index))
}

fn modified_index(resp: GenericResponse) -> Result<i64> {
    resp.status?;
    int_field(node_object(&resp.json_body)?, "modifiedIndex")
}

pub(crate) fn decode_update(resp: GenericResponse) -> Result<i64> {
    modified_index(resp)
}

pub(crate) fn decode_force_set(resp: GenericResponse) -> Result<i64> {
    modified_index(resp)
}

pub(crate) fn decode_delete(resp: GenericResponse) -> Result<i64> {
    resp.status?;
    Ok(resp.etcd_index)
}

/// Turns one long-poll answer into a single update. A node without `value`
/// is a deletion or expiry.
pub(crate) fn decode_watch_update(resp: GenericResponse) -> Result<WatchUpdate> {
    resp.status?;
    let node = node_object(&resp.json_body)?;

    let created_index = int_field(node, "createdIndex")?;
    let modified_index = int_field(node, "modifiedIndex")?;
    let key = str_field(node, "key")?;
    check_index_order(created_index, modified_index)?;

    Ok(match node.get("value").and_then(Value::as_str) {
        Some(value) => WatchUpdate::new(Node::new(created_index, modified_index, key, value), true),
        None => WatchUpdate::new(Node::new(created_index, modified_index, key, ""), false),
    })
}
