// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes and Guacamole API responses.

use crate::gateway::{HttpRequest, HttpResponse};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::{BoxError, Service};

/// A request seen by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

/// A mock HTTP service that returns predefined responses based on request paths.
/// It serves both kube clients and the Guacamole transport, and records every request.
/// Registering the same method and path again queues a follow-up response; the last one sticks.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), VecDeque<(u16, String)>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received for a given method
    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let mut responses = self.responses.lock().unwrap();

        // Try exact match first, then prefix match for paths like /api/v1/namespaces/foo
        let key = (method.to_string(), path.to_string());
        let key = if responses.contains_key(&key) {
            key
        } else {
            responses
                .keys()
                .find(|(m, p)| m == method && path.starts_with(p.as_str()))
                .cloned()?
        };

        let queue = responses.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn respond(&self, method: &str, path: &str, query: Option<&str>, body: &[u8]) -> (u16, String) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            query: query.map(str::to_string),
            body: String::from_utf8_lossy(body).to_string(),
        });

        // Default 404 for unmatched requests
        self.find_response(method, path).unwrap_or_else(|| {
            (
                404,
                r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#
                    .to_string(),
            )
        })
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
            let (status, text) =
                this.respond(parts.method.as_str(), parts.uri.path(), parts.uri.query(), &body);
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(text.into_bytes()))
                .unwrap())
        })
    }
}

impl Service<HttpRequest> for MockService {
    type Response = HttpResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
            let (status, text) =
                this.respond(parts.method.as_str(), parts.uri.path(), parts.uri.query(), &body);
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Bytes::from(text))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a Guacamole token response for the `postgresql` data source
pub fn auth_token_json(token: &str) -> String {
    serde_json::json!({
        "authToken": token,
        "username": "guacadmin",
        "dataSource": "postgresql",
        "availableDataSources": ["postgresql"]
    })
    .to_string()
}

/// Create a Guacamole connection document as returned by create and list
pub fn connection_json(identifier: &str, name: &str, protocol: &str) -> serde_json::Value {
    serde_json::json!({
        "identifier": identifier,
        "name": name,
        "parentIdentifier": "ROOT",
        "protocol": protocol,
        "attributes": {},
        "activeConnections": 0
    })
}
