use serde::{Deserialize, Serialize};

/// Body of an upload request (POST/PUT).
///
/// Only `code` is read; any other field is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub code: Option<String>,
}

impl UploadRequest {
    /// The body's `code`, if present and non-empty
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.is_empty())
    }
}

/// Response to an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// URL the client PUTs the object to
    pub presigned_url: String,
    /// Key the object will be stored under
    pub object_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upload_request_code() {
        let request: UploadRequest = serde_json::from_value(json!({ "code": "XYZ", "extra": 1 })).unwrap();
        assert_eq!(request.code(), Some("XYZ"));

        let request: UploadRequest = serde_json::from_value(json!({ "code": "" })).unwrap();
        assert_eq!(request.code(), None);

        let request: UploadRequest = serde_json::from_value(json!({ "code": null })).unwrap();
        assert_eq!(request.code(), None);

        let request: UploadRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.code(), None);
    }

    #[test]
    fn test_presigned_upload_field_names() {
        let body = PresignedUpload {
            presigned_url: "https://example.com/u".to_string(),
            object_path: "XYZ/logo/photo.jpg".to_string(),
        };

        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"presignedUrl":"https://example.com/u","objectPath":"XYZ/logo/photo.jpg"}"#
        );
    }
}
