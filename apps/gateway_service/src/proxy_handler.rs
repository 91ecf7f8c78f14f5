use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    response::Response,
};

use crate::{app_module::AppState, core::error::GatewayError};

pub struct GatewayProxyHandler;

impl GatewayProxyHandler {
    /// Forwards whatever the access layer let through to the backend owning
    /// the path.
    pub async fn handle(
        State(state): State<AppState>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        request: Request,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path();
        let route = state
            .routes
            .resolve(path)
            .ok_or_else(|| GatewayError::NoRouteMatched {
                path: path.to_owned(),
            })?;

        let peer = connect_info.map(|ConnectInfo(addr)| addr);
        state.forwarder.forward(route, request, peer).await
    }
}
