use std::{convert::Infallible, net::SocketAddr};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, TextEncoder};

/// Render every registered metric in the Prometheus text format
fn render() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(buffer)
}

fn respond(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

/// Handle an HTTP request
async fn handle_request(request: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Only the metrics endpoint exists
    if request.method() != Method::GET || request.uri().path() != "/metrics" {
        return Ok(respond(StatusCode::NOT_FOUND, "Not found"));
    }

    Ok(match render() {
        Ok(body) => respond(StatusCode::OK, body),
        Err(error) => {
            log::error!("Failed to encode metrics: {}", error);
            respond(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    })
}

/// Bring up an HTTP server that listens for metrics requests
pub async fn serve_metrics(bind_addr: SocketAddr) {
    let make_service =
        make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(handle_request)) });

    log::info!("Serving metrics on http://{}/metrics", bind_addr);
    match Server::try_bind(&bind_addr) {
        Ok(builder) => {
            if let Err(error) = builder.serve(make_service).await {
                log::error!("Metrics server error: {}", error);
            }
        }
        Err(error) => log::error!("Failed to bind metrics server to {}: {}", bind_addr, error),
    }
}
