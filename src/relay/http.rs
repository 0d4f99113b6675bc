//! HTTP upstream sources
//!
//! Sources configured with a `url` are fetched with a plain GET and their
//! body is copied to the client chunk by chunk.

use super::sink::OutputSink;
use super::StreamEnd;
use crate::error::{RelayError, StreamError};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::io;
use tracing::debug;
use url::Url;

/// Request `url` and return the response once the status is known to be a success
pub async fn open_http(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, RelayError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| RelayError::Upstream {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::Upstream {
            url: url.to_string(),
            reason: format!("upstream returned {}", status),
        });
    }

    debug!("Upstream {} answered {}", url, status);
    Ok(response)
}

/// Content type advertised by the upstream, if any
pub fn upstream_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Copy an upstream body into `sink` until it ends or the client leaves
pub async fn copy_body<S>(response: reqwest::Response, sink: &mut S) -> Result<StreamEnd, StreamError>
where
    S: OutputSink + ?Sized,
{
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamError::Read(io::Error::new(io::ErrorKind::Other, e)))?;
        if sink.write(chunk).await.is_err() {
            debug!("Client gone, dropping upstream");
            return Ok(StreamEnd::ClientGone);
        }
    }

    Ok(StreamEnd::UpstreamClosed)
}

/// Fetch `url` and relay its body into `sink`
pub async fn relay_http<S>(client: &reqwest::Client, url: &Url, sink: &mut S) -> Result<StreamEnd, RelayError>
where
    S: OutputSink + ?Sized,
{
    let response = open_http(client, url).await?;
    Ok(copy_body(response, sink).await?)
}
