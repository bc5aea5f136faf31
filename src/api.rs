//! HTTP Lookup API
//!
//! Maps request paths onto the resilient cache, plus the health and metrics
//! endpoints the binary exposes.
//!
//! | Path                                              | Response              |
//! |---------------------------------------------------|-----------------------|
//! | `/keyspaces/{cell}`                               | JSON keyspace names   |
//! | `/keyspace/{cell}/{keyspace}`                     | JSON `SrvKeyspace`    |
//! | `/endpoints/{cell}/{keyspace}/{shard}/{type}`     | JSON `EndPoints`      |
//! | `/debug/cache`                                    | JSON `CacheStats`     |
//! | `/metrics`                                        | Prometheus text       |
//! | `/healthz`, `/livez`, `/readyz`                   | `ok`                  |

use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use tracing::debug;

use crate::domain::TabletType;
use crate::error::Error;
use crate::resilient::ResilientSrvTopoServer;

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Metrics,
    CacheStats,
    KeyspaceNames {
        cell: String,
    },
    SrvKeyspace {
        cell: String,
        keyspace: String,
    },
    EndPoints {
        cell: String,
        keyspace: String,
        shard: String,
        tablet_type: TabletType,
    },
}

/// Why a path could not be routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    BadRequest(String),
}

impl Route {
    /// Parse a request path; segments are percent-decoded.
    pub fn parse(path: &str) -> Result<Route, RouteError> {
        let segments = path
            .trim_matches('/')
            .split('/')
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .map_err(|e| RouteError::BadRequest(format!("invalid path segment: {}", e)))
            })
            .collect::<Result<Vec<String>, RouteError>>()?;

        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let route = match segments.as_slice() {
            ["healthz"] | ["livez"] | ["readyz"] => Route::Health,
            ["metrics"] => Route::Metrics,
            ["debug", "cache"] => Route::CacheStats,
            ["keyspaces", cell] => Route::KeyspaceNames {
                cell: cell.to_string(),
            },
            ["keyspace", cell, keyspace] => Route::SrvKeyspace {
                cell: cell.to_string(),
                keyspace: keyspace.to_string(),
            },
            ["endpoints", cell, keyspace, shard, tablet_type] => Route::EndPoints {
                cell: cell.to_string(),
                keyspace: keyspace.to_string(),
                shard: shard.to_string(),
                tablet_type: tablet_type
                    .parse()
                    .map_err(|e: Error| RouteError::BadRequest(e.to_string()))?,
            },
            _ => return Err(RouteError::NotFound),
        };

        if route_has_empty_segment(&route) {
            return Err(RouteError::NotFound);
        }
        Ok(route)
    }
}

fn route_has_empty_segment(route: &Route) -> bool {
    match route {
        Route::KeyspaceNames { cell } => cell.is_empty(),
        Route::SrvKeyspace { cell, keyspace } => cell.is_empty() || keyspace.is_empty(),
        Route::EndPoints {
            cell,
            keyspace,
            shard,
            ..
        } => cell.is_empty() || keyspace.is_empty() || shard.is_empty(),
        _ => false,
    }
}

/// Answer a request for `path`.
pub async fn handle(
    server: &ResilientSrvTopoServer,
    registry: &Registry,
    path: &str,
) -> Response<Full<Bytes>> {
    let route = match Route::parse(path) {
        Ok(route) => route,
        Err(RouteError::NotFound) => return text(StatusCode::NOT_FOUND, "not found"),
        Err(RouteError::BadRequest(reason)) => {
            return json_error(StatusCode::BAD_REQUEST, &reason)
        }
    };
    debug!(?route, "handling request");

    match route {
        Route::Health => text(StatusCode::OK, "ok"),
        Route::Metrics => metrics(registry),
        Route::CacheStats => json(&server.stats()),
        Route::KeyspaceNames { cell } => lookup(server.get_srv_keyspace_names(&cell).await),
        Route::SrvKeyspace { cell, keyspace } => {
            lookup(server.get_srv_keyspace(&cell, &keyspace).await)
        }
        Route::EndPoints {
            cell,
            keyspace,
            shard,
            tablet_type,
        } => lookup(
            server
                .get_end_points(&cell, &keyspace, &shard, tablet_type)
                .await,
        ),
    }
}

fn lookup<T: Serialize>(result: crate::Result<Arc<T>>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => json(&*value),
        Err(e) => {
            let status = match e.topo_source() {
                Some(source) if source.is_no_node() => StatusCode::NOT_FOUND,
                Some(_) => StatusCode::SERVICE_UNAVAILABLE,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_error(status, &e.to_string())
        }
    }
}

fn metrics(registry: &Registry) -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }
    respond(StatusCode::OK, encoder.format_type(), buffer)
}

fn json<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    respond(status, "application/json", body)
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    respond(status, "text/plain; charset=utf-8", body)
}

fn respond(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
