use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use hyper::{
    header,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use ipam_metrics::metrics::label_values::{
    OPERATION_RELEASE_ADDRESS, OPERATION_REQUEST_ADDRESS, OPERATION_REQUEST_POOL,
};
use serde::{de::DeserializeOwned, Serialize};

use super::types::{
    ActivateResponse, AddressSpacesResponse, CapabilitiesResponse, EmptyResponse, ErrorResponse,
    ReleaseAddressRequest, ReleasePoolRequest, RequestAddressRequest, RequestAddressResponse,
    RequestPoolRequest, RequestPoolResponse,
};
use crate::driver::IpamDriver;

/// Media type of every plugin protocol message
pub const CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

/// Plugin subsystems this driver implements
const IMPLEMENTS: &[&str] = &["IpamDriver"];

/// Build a JSON response
fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(body) {
        Ok(body) => (status, body),
        Err(error) => {
            log::error!("Failed to encode response: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"Err":"failed to encode response"}"#.to_vec(),
            )
        }
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(CONTENT_TYPE),
    );
    response
}

fn reply_error(status: StatusCode, err: impl ToString) -> Response<Body> {
    reply(status, &ErrorResponse { err: err.to_string() })
}

/// Turn a driver result into a response, counting it against `$operation`
macro_rules! finish {
    ($operation: ident, $result: expr $(,)?) => {
        match $result {
            Ok(body) => {
                ipam_metrics::metric!(REQUEST_COUNTER, $operation, STATUS_OK).inc();
                reply(StatusCode::OK, &body)
            }
            Err(error) => {
                ipam_metrics::metric!(REQUEST_COUNTER, $operation, STATUS_FAILED).inc();
                log::warn!("{} failed: {}", $operation, error);
                reply_error(StatusCode::INTERNAL_SERVER_ERROR, error)
            }
        }
    };
}

/// Decode a request body. An empty body decodes as `{}`.
async fn decode<T: DeserializeOwned>(body: Body) -> Result<T, Response<Body>> {
    let bytes = hyper::body::to_bytes(body)
        .await
        .map_err(|error| reply_error(StatusCode::BAD_REQUEST, error))?;
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };
    serde_json::from_slice(bytes).map_err(|error| {
        log::warn!("Rejecting malformed request body: {}", error);
        reply_error(StatusCode::BAD_REQUEST, error)
    })
}

/// Route a single plugin API call
async fn route(driver: &IpamDriver, request: Request<Body>) -> Result<Response<Body>, Response<Body>> {
    if request.method() != Method::POST {
        return Ok(reply_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }
    let path = request.uri().path().to_string();
    let body = request.into_body();
    log::trace!("Handling {}", path);

    Ok(match path.as_str() {
        "/Plugin.Activate" => reply(
            StatusCode::OK,
            &ActivateResponse {
                implements: IMPLEMENTS.to_vec(),
            },
        ),
        "/IpamDriver.GetCapabilities" => {
            let capabilities = driver.capabilities();
            reply(
                StatusCode::OK,
                &CapabilitiesResponse {
                    requires_mac_address: capabilities.requires_mac_address,
                },
            )
        }
        "/IpamDriver.GetDefaultAddressSpaces" => {
            let spaces = driver.default_address_spaces();
            reply(
                StatusCode::OK,
                &AddressSpacesResponse {
                    local_default_address_space: spaces.local,
                    global_default_address_space: spaces.global,
                },
            )
        }
        "/IpamDriver.RequestPool" => {
            let request: RequestPoolRequest = decode(body).await?;
            if !request.sub_pool.is_empty() {
                log::warn!("Sub pools are not supported, ignoring {}", request.sub_pool);
            }
            log::trace!("Pool request options: {:?}", request.options);
            finish!(
                OPERATION_REQUEST_POOL,
                driver
                    .request_pool(&request.address_space, Some(request.pool.as_str()), request.v6)
                    .map(|grant| RequestPoolResponse {
                        pool_id: grant.pool_id.into(),
                        pool: grant.pool,
                        data: grant.data,
                    }),
            )
        }
        "/IpamDriver.ReleasePool" => {
            let request: ReleasePoolRequest = decode(body).await?;
            driver.release_pool(&request.pool_id);
            ipam_metrics::metric!(REQUEST_COUNTER, OPERATION_RELEASE_POOL, STATUS_OK).inc();
            reply(StatusCode::OK, &EmptyResponse {})
        }
        "/IpamDriver.RequestAddress" => {
            let request: RequestAddressRequest = decode(body).await?;
            let options = request.options.unwrap_or_default();
            finish!(
                OPERATION_REQUEST_ADDRESS,
                driver
                    .request_address(&request.pool_id, Some(request.address.as_str()), &options)
                    .map(|grant| RequestAddressResponse {
                        address: grant.address,
                        data: grant.data,
                    }),
            )
        }
        "/IpamDriver.ReleaseAddress" => {
            let request: ReleaseAddressRequest = decode(body).await?;
            finish!(
                OPERATION_RELEASE_ADDRESS,
                driver
                    .release_address(&request.pool_id, &request.address)
                    .map(|()| EmptyResponse {}),
            )
        }
        _ => reply_error(StatusCode::NOT_FOUND, format!("unknown endpoint {path}")),
    })
}

/// Handle an HTTP request
async fn handle_request(
    driver: Arc<IpamDriver>,
    request: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    Ok(route(&driver, request).await.unwrap_or_else(|response| response))
}

/// Serve the plugin API until Ctrl-C is received
pub async fn serve(bind_addr: SocketAddr, driver: Arc<IpamDriver>) -> Result<(), hyper::Error> {
    let make_service = make_service_fn(move |_| {
        let driver = Arc::clone(&driver);
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                handle_request(Arc::clone(&driver), request)
            }))
        }
    });

    let server = Server::try_bind(&bind_addr)?.serve(make_service);
    log::info!("Plugin API listening on {}", server.local_addr());

    server
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", error);
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down");
        })
        .await
}
