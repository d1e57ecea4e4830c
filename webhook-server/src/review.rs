//! `admission.k8s.io/v1` wire types.
//!
//! The request half of the envelope is decoded only as far as the handler
//! needs: embedded objects stay raw JSON so that the review echoed back to the
//! API server carries them unchanged, and so that a malformed object can be
//! reported as a denial instead of failing the whole review.

use k8s_openapi::{
    api::authentication::v1::UserInfo,
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, Status},
};
use kube::core::{admission::Operation, GroupVersionKind, GroupVersionResource};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub request: AdmissionRequest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Correlates the response with this request; echoed verbatim.
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<GroupVersionResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_kind: Option<GroupVersionKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_resource: Option<GroupVersionResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_sub_resource: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Box<RawValue>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AdmissionResponse {
    pub uid: String,

    pub allowed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// The slice of a `core/v1` Pod that admission decisions look at. All other
/// fields are ignored when decoding.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pod {
    /// Absent and `null` metadata both read as empty.
    #[serde(default)]
    pub metadata: Option<ObjectMeta>,
}

// === impl AdmissionRequest ===

impl AdmissionRequest {
    /// Decodes the embedded object as a Pod.
    ///
    /// An absent object is decoded from an empty document, so it fails like
    /// any other unreadable payload.
    pub fn pod(&self) -> serde_json::Result<Pod> {
        let raw = self.object.as_deref().map(RawValue::get).unwrap_or_default();
        serde_json::from_str(raw)
    }
}

// === impl AdmissionResponse ===

impl AdmissionResponse {
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            status: None,
        }
    }

    pub fn deny(uid: impl Into<String>, message: impl ToString) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            status: Some(Status {
                message: Some(message.to_string()),
                ..Status::default()
            }),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref()?.message.as_deref()
    }
}

// === impl Pod ===

impl Pod {
    pub fn name(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.name.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(object: &str) -> AdmissionRequest {
        serde_json::from_str(&format!(r#"{{"uid":"abc","object":{object}}}"#))
            .expect("request must decode")
    }

    #[test]
    fn pod_name_from_metadata() {
        let pod = request(
            r#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"web"},"spec":{"containers":[]}}"#,
        )
        .pod()
        .expect("pod must decode");
        assert_eq!(pod.name(), "web");
    }

    #[test]
    fn pod_without_metadata_has_empty_name() {
        let pod = request("{}").pod().expect("pod must decode");
        assert_eq!(pod.name(), "");
    }

    #[test]
    fn pod_with_null_metadata_has_empty_name() {
        let pod = request(r#"{"metadata":null}"#)
            .pod()
            .expect("pod must decode");
        assert_eq!(pod.name(), "");
    }

    #[test]
    fn array_object_is_not_a_pod() {
        assert!(request("[1,2,3]").pod().is_err());
    }

    #[test]
    fn missing_object_is_not_a_pod() {
        let req: AdmissionRequest = serde_json::from_str(r#"{"uid":"abc"}"#).unwrap();
        assert!(req.object.is_none());
        assert!(req.pod().is_err());
    }

    #[test]
    fn request_requires_uid() {
        assert!(serde_json::from_str::<AdmissionRequest>(r#"{"object":{}}"#).is_err());
    }

    #[test]
    fn allowed_response_omits_status() {
        let json = serde_json::to_value(AdmissionResponse::allow("abc")).unwrap();
        assert_eq!(json, serde_json::json!({"uid": "abc", "allowed": true}));
    }

    #[test]
    fn denied_response_carries_message() {
        let rsp = AdmissionResponse::deny("abc", "nope");
        assert!(!rsp.allowed);
        assert_eq!(rsp.message(), Some("nope"));

        let json = serde_json::to_value(&rsp).unwrap();
        assert_eq!(json["status"]["message"], "nope");
    }

    #[test]
    fn raw_object_round_trips_verbatim() {
        let object = r#"{"metadata":{"name":"web"},"spec":{"nodeName":"n1"}}"#;
        let req = request(object);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(object), "{json}");
    }
}
