//! The object dispatcher.
//!
//! Every request other than `GET /healthz` lands here. The dispatcher checks the `code`
//! header, turns the path into an object name and hands off by method to exactly one storage
//! call: a presign, a listing or a deletion.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{Method, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::{
    AppState,
    api::models::objects::{PresignedUpload, UploadRequest},
    errors::{Error, Result},
    routing::{Category, ReadTarget, gallery_prefix, header_text, upload_key},
    storage::PresignOptions,
};

/// Header carrying the caller's namespace identifier
pub const CODE_HEADER: &str = "code";

const JSON_UTF8: &str = "application/json; charset=UTF-8";

/// Route a request by method.
///
/// The `code` header is required for every method and checked before anything else, including
/// reading the body, so a request without it never reaches the storage backend.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Result<Response> {
    let Some(code) = header_text(request.headers(), CODE_HEADER) else {
        return Err(Error::bad_request("code header is missing or empty"));
    };
    let code = code.into_owned();

    let object_name = object_name(request.uri()).to_string();

    match request.method().clone() {
        Method::GET => read_object(&state, &object_name, &code).await,
        Method::POST | Method::PUT => request_upload(&state, &object_name, request).await,
        Method::DELETE => delete_object(&state, &object_name).await,
        _ => Err(Error::bad_request("Unsupported method")),
    }
}

/// The request path without its leading `/`, exactly as sent.
fn object_name(uri: &Uri) -> &str {
    let path = uri.path();
    path.strip_prefix('/').unwrap_or(path)
}

#[instrument(skip(state, code))]
async fn read_object(state: &AppState, object_name: &str, code: &str) -> Result<Response> {
    match ReadTarget::for_object(object_name) {
        Some(ReadTarget::Standards) => {
            let url = state
                .storage
                .presign_put(object_name, PresignOptions::default())
                .await
                .map_err(|source| Error::Storage {
                    message: "Error fetching presigned URL",
                    source,
                })?;

            Ok(url.into_response())
        }
        Some(ReadTarget::Gallery) => {
            let prefix = gallery_prefix(code);
            let objects = state.storage.list_objects(&prefix).await.map_err(|source| Error::Storage {
                message: "Internal Server Error",
                source,
            })?;

            let total_bytes: i64 = objects.iter().filter_map(|object| object.size).sum();
            let keys: Vec<String> = objects.into_iter().filter_map(|object| object.key).collect();
            debug!(prefix = %prefix, count = keys.len(), total_bytes, "Listed gallery");

            let body = serde_json::to_string(&keys).map_err(|e| Error::Internal {
                operation: format!("serialize gallery listing: {e}"),
            })?;

            Ok(([(CONTENT_TYPE, JSON_UTF8)], body).into_response())
        }
        None => Err(Error::bad_request("Invalid GET request")),
    }
}

#[instrument(skip(state, request))]
async fn request_upload(state: &AppState, object_name: &str, request: Request) -> Result<Response> {
    let headers = request.headers().clone();

    // Buffering goes through the `Bytes` extractor so the router's body limit applies
    let body = match Bytes::from_request(request, state).await {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let upload: UploadRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting unparseable upload body");
        Error::bad_request("invalid request body")
    })?;

    let Some(code) = upload.code() else {
        return Err(Error::bad_request("code is missing in the request body"));
    };

    let Some(category) = Category::from_headers(&headers) else {
        return Err(Error::bad_request(missing_category_message()));
    };

    let object_path = upload_key(code, category, object_name);
    let options = PresignOptions {
        acl: state.config.presign.upload_acl,
        expires_in: Some(state.config.presign.upload_expiry),
    };

    let presigned_url = state
        .storage
        .presign_put(&object_path, options)
        .await
        .map_err(|source| Error::Storage {
            message: "Error generating presigned URL",
            source,
        })?;

    debug!(object_path = %object_path, %category, "Issued upload URL");

    let body = serde_json::to_string(&PresignedUpload {
        presigned_url,
        object_path,
    })
    .map_err(|e| Error::Internal {
        operation: format!("serialize presigned upload: {e}"),
    })?;

    // The serialized JSON is the whole body; clients parse it themselves, no content-type is sent
    Ok(Response::new(Body::from(body)))
}

#[instrument(skip(state))]
async fn delete_object(state: &AppState, object_name: &str) -> Result<Response> {
    state.storage.delete_object(object_name).await.map_err(|source| Error::Storage {
        message: "Error deleting object",
        source,
    })?;

    Ok("Object deleted successfully".into_response())
}

fn missing_category_message() -> String {
    let names: Vec<&str> = Category::PRIORITY.iter().map(Category::as_str).collect();
    format!("One of the following headers must be present: {}", names.join(", "))
}
