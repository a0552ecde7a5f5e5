#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;


pub use self::metrics::HttpMetrics;
use futures::future;
use hyper::{header, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, time};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use volm_controller_core::{Authority, ClaimRecord, Error, Selector};
use volm_controller_index::{Gateway, Index};

type Body = http_body_util::Full<bytes::Bytes>;

/// Serves volume queries and deletions over HTTP.
///
/// - `GET /` describes the running service.
/// - `GET /vol` lists the selected volumes.
/// - `GET /vol/{name}` describes a single volume.
/// - `DELETE /vol/{name}` deletes a volume's claim.
pub struct Api<A> {
    index: Index,
    gateway: Arc<Gateway<A>>,
    selector: Arc<Selector>,
    info: Arc<ServiceInfo>,
    metrics: HttpMetrics,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceInfo {
    pub version: String,
    pub mode: String,
    pub service: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct DeleteBody {
    status: bool,
}

// === impl Api ===

impl<A> Clone for Api<A> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            gateway: self.gateway.clone(),
            selector: self.selector.clone(),
            info: self.info.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<A> Api<A>
where
    A: Authority<ClaimRecord> + 'static,
{
    pub fn new(
        index: Index,
        gateway: Gateway<A>,
        selector: Selector,
        info: ServiceInfo,
        metrics: HttpMetrics,
    ) -> Self {
        Self {
            index,
            gateway: Arc::new(gateway),
            selector: Arc::new(selector),
            info: Arc::new(info),
            metrics,
        }
    }

    /// Handles a request, returning the matched route template with the response.
    async fn route(&self, method: &Method, path: &str) -> (&'static str, Response<Body>) {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let route = match segments.as_slice() {
            [] => "/",
            ["vol"] => "/vol",
            ["vol", _] => "/vol/:name",
            _ => return ("unmatched", empty_response(StatusCode::NOT_FOUND)),
        };

        let rsp = match (method, segments.as_slice()) {
            (&Method::GET, []) => json_response(StatusCode::OK, &*self.info),
            (&Method::GET, ["vol"]) => {
                let volumes = self.index.list_volumes(&self.selector);
                json_response(StatusCode::OK, &volumes)
            }
            (&Method::GET, ["vol", name]) => match self.index.get_volume(name, &self.selector) {
                Ok(volume) => json_response(StatusCode::OK, &volume),
                Err(error) => error_response(error),
            },
            (&Method::DELETE, ["vol", name]) => {
                match self.gateway.delete_volume(name, &self.selector).await {
                    Ok(()) => json_response(StatusCode::OK, &DeleteBody { status: true }),
                    Err(error) => error_response(error),
                }
            }
            _ => empty_response(StatusCode::METHOD_NOT_ALLOWED),
        };
        (route, rsp)
    }
}

impl<A, B> tower::Service<Request<B>> for Api<A>
where
    A: Authority<ClaimRecord> + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let api = self.clone();
        Box::pin(async move {
            let start = time::Instant::now();
            let (route, rsp) = api.route(&method, &path).await;
            let elapsed = start.elapsed();
            api.metrics.record(route, &method, rsp.status(), elapsed);
            info!(
                %method,
                %path,
                status = rsp.status().as_u16(),
                latency = ?elapsed,
                "Handled request"
            );
            Ok(rsp)
        })
    }
}

/// Serves `api` on `addr` until `drain` is signaled, then waits for open connections to finish.
///
/// Connections that do not send a complete request head within `read_timeout` are closed.
#[instrument(skip_all, fields(port = %addr.port()))]
pub async fn serve<A>(
    addr: SocketAddr,
    api: Api<A>,
    read_timeout: time::Duration,
    drain: drain::Watch,
) -> anyhow::Result<()>
where
    A: Authority<ClaimRecord> + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API server listening");

    let shutdown = drain.clone().signaled();
    tokio::pin!(shutdown);

    loop {
        let (io, client) = tokio::select! {
            release = &mut shutdown => {
                drop(listener);
                drop(release);
                return Ok(());
            }
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Failed to accept connection");
                    continue;
                }
            },
        };

        let api = api.clone();
        let drain = drain.clone();
        tokio::spawn(
            async move {
                let svc = hyper::service::service_fn(move |req| {
                    let mut api = api.clone();
                    tower::Service::call(&mut api, req)
                });
                let conn = hyper::server::conn::http1::Builder::new()
                    .timer(hyper_util::rt::TokioTimer::new())
                    .header_read_timeout(read_timeout)
                    .serve_connection(hyper_util::rt::TokioIo::new(io), svc);
                tokio::pin!(conn);

                tokio::select! {
                    res = &mut conn => {
                        if let Err(error) = res {
                            debug!(%error, "Connection closed with error");
                        }
                    }
                    release = drain.signaled() => {
                        conn.as_mut().graceful_shutdown();
                        if let Err(error) = release.release_after(conn).await {
                            debug!(%error, "Connection closed with error");
                        }
                    }
                }
            }
            .instrument(info_span!("conn", %client)),
        );
    }
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("json response must be valid"),
        Err(error) => {
            warn!(%error, "Failed to encode response");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_response(error: Error) -> Response<Body> {
    let status = match error {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::SelectorMismatch { .. } => StatusCode::FORBIDDEN,
        Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_response(
        status,
        &ErrorBody {
            error: error.to_string(),
        },
    )
}

fn empty_response(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}
