use crate::review::{AdmissionResponse, AdmissionReview};
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use thiserror::Error;
use tracing::{debug, info, trace, warn};


/// Pods with this name are refused admission.
pub const INVALID_POD_NAME: &str = "pod-with-an-invalid-name";

const ROOT_GREETING: &str = "Hello from root endpoint!\n";

/// Serves `/validate` and the root greeting.
///
/// The service holds no mutable state, so every connection gets a clone.
#[derive(Clone, Debug, Default)]
pub struct Admission {
    dump_reviews: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),
}

type Body = http_body_util::Full<Bytes>;

// === impl Admission ===

impl<B> tower::Service<Request<B>> for Admission
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), path = %req.uri().path());
        if req.uri().path() != "/validate" {
            return Box::pin(future::ok(text_response(
                http::StatusCode::OK,
                ROOT_GREETING,
            )));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Body(e.into()))?
                .to_bytes();
            Ok(admission.handle(&bytes))
        })
    }
}

impl Admission {
    /// `dump_reviews` logs every decoded review in full.
    pub fn new(dump_reviews: bool) -> Self {
        Self { dump_reviews }
    }

    /// Decodes a review, decides it and encodes the answered review.
    fn handle(&self, body: &[u8]) -> Response<Body> {
        let mut review: AdmissionReview = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return text_response(
                    http::StatusCode::BAD_REQUEST,
                    format!("could not decode request: {error}\n"),
                );
            }
        };

        if self.dump_reviews {
            match serde_json::to_string_pretty(&review) {
                Ok(json) => info!("Received AdmissionReview: {json}"),
                Err(error) => warn!(%error, "Failed to format AdmissionReview"),
            }
        }

        review.response = Some(self.admit(&review));

        match serde_json::to_vec(&review) {
            Ok(bytes) => json_response(bytes),
            Err(error) => {
                warn!(%error, uid = %review.request.uid, "Failed to encode response");
                text_response(
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    format!("could not encode response: {error}\n"),
                )
            }
        }
    }

    fn admit(&self, review: &AdmissionReview) -> AdmissionResponse {
        let uid = review.request.uid.as_str();
        let pod = match review.request.pod() {
            Ok(pod) => pod,
            Err(error) => {
                info!(%uid, %error, "Denied undecodable pod");
                return AdmissionResponse::deny(
                    uid,
                    format_args!("could not decode pod object: {error}"),
                );
            }
        };

        let name = pod.name();
        if name == INVALID_POD_NAME {
            info!(%uid, %name, "Denied");
            return AdmissionResponse::deny(uid, "Pod with an invalid name is not allowed");
        }

        debug!(%uid, %name, "Allowed");
        AdmissionResponse::allow(uid)
    }
}

fn json_response(bytes: Vec<u8>) -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid")
}

fn text_response(status: http::StatusCode, body: impl Into<Bytes>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::new(body.into()))
        .expect("text response must be valid")
}
