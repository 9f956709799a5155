//! Typed decoding of LMS collections.
//!
//! Each collection may come back as a bare JSON array or wrapped in an
//! object (`{"users": [...], "warnings": []}`). A payload of any other shape
//! is a [`LmsError::MalformedPayload`]; individual records that do not
//! decode are dropped so one bad row cannot blank a whole source.

use super::LmsApi;
use crate::error::LmsError;
use crate::models::{RawRole, SourceData, SourceKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Web service function invoked for each source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNames {
    #[serde(default = "default_users")]
    pub users: String,
    #[serde(default = "default_courses")]
    pub courses: String,
    #[serde(default = "default_categories")]
    pub categories: String,
    #[serde(default = "default_enrollments")]
    pub enrollments: String,
    #[serde(default = "default_completions")]
    pub completions: String,
    #[serde(default = "default_activity")]
    pub activity: String,
    #[serde(default = "default_user_roles")]
    pub user_roles: String,
}

impl Default for FunctionNames {
    fn default() -> Self {
        Self {
            users: default_users(),
            courses: default_courses(),
            categories: default_categories(),
            enrollments: default_enrollments(),
            completions: default_completions(),
            activity: default_activity(),
            user_roles: default_user_roles(),
        }
    }
}

fn default_users() -> String {
    "core_user_get_users".to_string()
}

fn default_courses() -> String {
    "core_course_get_courses".to_string()
}

fn default_categories() -> String {
    "core_course_get_categories".to_string()
}

fn default_enrollments() -> String {
    "local_edudash_get_enrollments".to_string()
}

fn default_completions() -> String {
    "local_edudash_get_completions".to_string()
}

fn default_activity() -> String {
    "local_edudash_get_activity".to_string()
}

fn default_user_roles() -> String {
    "local_edudash_get_user_roles".to_string()
}

impl FunctionNames {
    pub fn for_kind(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Users => &self.users,
            SourceKind::Courses => &self.courses,
            SourceKind::Categories => &self.categories,
            SourceKind::Enrollments => &self.enrollments,
            SourceKind::Completions => &self.completions,
            SourceKind::Activity => &self.activity,
            SourceKind::Roles => &self.user_roles,
        }
    }
}

/// Parameters every call for `kind` needs regardless of the caller.
fn base_params(kind: SourceKind) -> Vec<(String, String)> {
    match kind {
        // core_user_get_users refuses to run without at least one criterion.
        SourceKind::Users => vec![
            ("criteria[0][key]".to_string(), "email".to_string()),
            ("criteria[0][value]".to_string(), "%".to_string()),
        ],
        _ => Vec::new(),
    }
}

/// Decode a list of `T` from a bare array or an object wrapping it under `wrapper`.
pub fn decode_collection<T: DeserializeOwned>(
    payload: Value,
    wrapper: &str,
) -> Result<Vec<T>, LmsError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(wrapper) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(LmsError::MalformedPayload(format!(
                    "'{}' is not a list",
                    wrapper
                )))
            }
            None => {
                return Err(LmsError::MalformedPayload(format!(
                    "missing '{}' list",
                    wrapper
                )))
            }
        },
        other => {
            return Err(LmsError::MalformedPayload(format!(
                "expected a '{}' list, got {}",
                wrapper,
                json_type(&other)
            )))
        }
    };

    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Dropping malformed '{}' record: {}", wrapper, e);
                None
            }
        })
        .collect();

    if records.len() < total {
        debug!(
            "Decoded {}/{} '{}' records",
            records.len(),
            total,
            wrapper
        );
    }

    Ok(records)
}

/// Fetch and decode one site-wide collection.
pub async fn fetch_source(
    api: &dyn LmsApi,
    names: &FunctionNames,
    kind: SourceKind,
) -> Result<SourceData, LmsError> {
    let payload = api.call(names.for_kind(kind), &base_params(kind)).await?;
    let wrapper = kind.key();

    let data = match kind {
        SourceKind::Users => SourceData::Users(decode_collection(payload, wrapper)?),
        SourceKind::Courses => SourceData::Courses(decode_collection(payload, wrapper)?),
        SourceKind::Categories => SourceData::Categories(decode_collection(payload, wrapper)?),
        SourceKind::Enrollments => SourceData::Enrollments(decode_collection(payload, wrapper)?),
        SourceKind::Completions => SourceData::Completions(decode_collection(payload, wrapper)?),
        SourceKind::Activity => SourceData::Activity(decode_collection(payload, wrapper)?),
        SourceKind::Roles => SourceData::Roles(decode_collection(payload, wrapper)?),
    };
    Ok(data)
}

/// Fetch the raw role assignments of one user.
pub async fn fetch_user_roles(
    api: &dyn LmsApi,
    names: &FunctionNames,
    user_id: i64,
) -> Result<Vec<RawRole>, LmsError> {
    let params = vec![("userid".to_string(), user_id.to_string())];
    let payload = api.call(&names.user_roles, &params).await?;
    decode_collection(payload, SourceKind::Roles.key())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
