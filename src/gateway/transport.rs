// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport used by the Guacamole client.
//!
//! Any tower `Service` answering `Request<Full<Bytes>>` with a fully buffered
//! `Response<Bytes>` can act as transport, which lets tests swap in a mock.

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::{BoxError, Service, ServiceExt};

pub type HttpRequest = Request<Full<Bytes>>;
pub type HttpResponse = Response<Bytes>;

/// Object-safe view over a cloneable tower service
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>>;
}

impl<S> Transport for S
where
    S: Service<HttpRequest, Response = HttpResponse, Error = BoxError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>> {
        let svc = self.clone();
        Box::pin(async move { svc.oneshot(request).await })
    }
}

/// Build the production transport: HTTP/1 over rustls with the platform trust store
pub fn https_transport() -> std::io::Result<impl Transport> {
    let https = HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();

    let client: Client<_, Full<Bytes>> = Client::builder(TokioExecutor::new()).build(https);

    Ok(tower::service_fn(move |request: HttpRequest| {
        let client = client.clone();
        async move {
            let response: hyper::Response<hyper::body::Incoming> = client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok::<_, BoxError>(Response::from_parts(parts, body))
        }
    }))
}
