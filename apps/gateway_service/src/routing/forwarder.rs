use std::{io, net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    BoxError,
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Version},
    response::Response,
};
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client as LegacyClient},
    rt::TokioExecutor,
};

use super::route_table::RouteEntry;
use crate::core::error::GatewayError;

pub type Client = LegacyClient<HttpConnector, Body>;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn build_client() -> Client {
    LegacyClient::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Relays a request to the backend chosen by the route table.
///
/// One attempt per request. The response headers must arrive within `timeout`,
/// and so must every body chunk after them. Dropping the returned future
/// (client went away) drops the outbound call with it.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn forward(
        &self,
        route: &RouteEntry,
        mut request: Request,
        peer: Option<SocketAddr>,
    ) -> Result<Response, GatewayError> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        let target = route.target_uri(path_and_query)?;

        let original_host = request
            .headers()
            .get(header::HOST)
            .cloned()
            .or_else(|| {
                request
                    .uri()
                    .authority()
                    .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
            });

        *request.uri_mut() = target.clone();
        *request.version_mut() = Version::HTTP_11;

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        headers.remove(header::HOST);
        append_forwarded_headers(headers, original_host, peer);

        tracing::debug!(route = %route.id, target = %target, "forwarding request");

        let outcome = tokio::time::timeout(self.timeout, self.client.request(request)).await;
        let response: hyper::Response<Incoming> = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(GatewayError::BackendUnavailable {
                    route_id: route.id.clone(),
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(GatewayError::BackendUnavailable {
                    route_id: route.id.clone(),
                    reason: format!("no response within {:?}", self.timeout),
                })
            }
        };

        let timeout = self.timeout;
        let mut response = response.map(|body| with_idle_timeout(body, timeout));
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}

/// Ends the relayed body with an error once the backend goes quiet for longer
/// than `timeout`, so a stalled backend cannot hold the client open.
fn with_idle_timeout(body: Incoming, timeout: Duration) -> Body {
    let chunks = Body::new(body).into_data_stream();
    let bounded = stream::unfold(Some(chunks), move |state| async move {
        let mut chunks = state?;
        match tokio::time::timeout(timeout, chunks.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(chunks))),
            Ok(Some(Err(err))) => Some((Err(BoxError::from(err)), None)),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(?timeout, "backend stalled mid-body");
                let err = io::Error::new(io::ErrorKind::TimedOut, "backend body stalled");
                Some((Err(BoxError::from(err)), None))
            }
        }
    });
    Body::from_stream(bounded)
}

/// Removes connection-scoped headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_headers(
    headers: &mut HeaderMap,
    original_host: Option<HeaderValue>,
    peer: Option<SocketAddr>,
) {
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    if let Some(peer) = peer {
        let client_ip = peer.ip().to_string();
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|value| value.to_str().ok()) {
            Some(existing) => format!("{existing}, {client_ip}"),
            None => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
}
