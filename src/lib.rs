#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
#[cfg(feature = "overlay")]
pub mod overlay;
pub(crate) mod serde_helpers;
#[cfg(feature = "sniper")]
pub mod sniper;
#[cfg(feature = "overlay")]
pub mod ws;

#[cfg(feature = "sniper")]
use reqwest::{Request, StatusCode, header::HeaderMap};
#[cfg(feature = "sniper")]
use serde::de::DeserializeOwned;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable holding the overlay WebSocket endpoint.
pub const OVERLAY_WS_HOST_VAR: &str = "CLR_OVERLAY_WS_HOST";

/// Environment variable holding the web host of the bot's REST API.
pub const API_HOST_VAR: &str = "CLR_API_HOST";

#[cfg(feature = "sniper")]
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip(client, request, headers),
        fields(
            method = %request.method(),
            path = request.url().path(),
            status_code
        )
    )
)]
async fn request<Response: DeserializeOwned>(
    client: &reqwest::Client,
    mut request: Request,
    headers: Option<HeaderMap>,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    if let Some(h) = headers {
        request.headers_mut().extend(h);
    }

    let response = client.execute(request).await?;
    let status_code = response.status();

    #[cfg(feature = "tracing")]
    tracing::Span::current().record("status_code", status_code.as_u16());

    if !status_code.is_success() {
        let body = response.text().await.unwrap_or_default();
        // The API answers with a bare JSON string; fall back to the raw body otherwise.
        let message = serde_json::from_str::<String>(&body).unwrap_or(body);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = %message,
            "API request failed"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    let json_value = response.json::<serde_json::Value>().await?;
    let response_data: Option<Response> = serde_helpers::deserialize_with_warnings(json_value)?;

    if let Some(response) = response_data {
        Ok(response)
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!(method = %method, path = %path, "API resource not found");
        Err(Error::status(
            StatusCode::NOT_FOUND,
            method,
            path,
            "Unable to find requested resource",
        ))
    }
}
