//! SharePoint REST API client
//!
//! Provides a thin authenticated HTTP client over a site's `_api` root.
//! Handles the Accept header, bearer authentication, JSON
//! deserialization, and error mapping.
//!
//! Non-2xx responses are turned into errors that carry the response body,
//! not just the status line. The engine classifies the row-cap refusal by
//! message signature, and SharePoint puts that signature in the body.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Accept header requesting plain JSON without OData envelopes
const ACCEPT_JSON: &str = "application/json;odata=nometadata";

/// Doubles single quotes so a value is safe inside an OData string literal
pub(crate) fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// HTTP client for SharePoint `_api` calls
///
/// Wraps `reqwest::Client` with the site's API base URL and a bearer
/// token. The token is issued elsewhere and consumed as-is; this client
/// performs no authentication handshake of its own.
pub struct SpClient {
    client: Client,
    api_base: String,
    bearer_token: String,
}

impl SpClient {
    /// Creates a client for the given site URL
    ///
    /// # Arguments
    /// * `site_url` - Site root, e.g. `https://acme.example.com/sites/acme`
    /// * `bearer_token` - A valid bearer token for that site
    pub fn new(site_url: &str, bearer_token: impl Into<String>) -> Result<Self> {
        let site = site_url.trim_end_matches('/');
        Url::parse(site).with_context(|| format!("invalid site URL '{site_url}'"))?;
        Ok(Self {
            client: Client::new(),
            api_base: format!("{site}/_api"),
            bearer_token: bearer_token.into(),
        })
    }

    /// The `_api` base URL requests are built on
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Creates an authenticated GET request builder for an `_api` path
    ///
    /// `path` is relative to the API base, e.g. `/web/lists`.
    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_JSON)
            .bearer_auth(&self.bearer_token)
    }

    /// Sends a request and maps non-2xx responses to body-carrying errors
    async fn send_checked(&self, path: &str) -> Result<Response> {
        debug!(path, "GET");
        let response = self
            .request(path)
            .send()
            .await
            .with_context(|| format!("request failed: GET {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {path} returned {status}: {body}");
        }
        Ok(response)
    }

    /// GETs a JSON document and deserializes it
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_checked(path)
            .await?
            .json()
            .await
            .with_context(|| format!("cannot parse response of GET {path}"))
    }

    /// GETs a JSON document, mapping 404 to `None`
    ///
    /// Used by the lookups whose "not found" is a classification answer
    /// rather than a failure.
    pub async fn get_json_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        debug!(path, "GET (optional)");
        let response = self
            .request(path)
            .send()
            .await
            .with_context(|| format!("request failed: GET {path}"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {path} returned {status}: {body}");
        }
        let value = response
            .json()
            .await
            .with_context(|| format!("cannot parse response of GET {path}"))?;
        Ok(Some(value))
    }

    /// GETs raw bytes (file content)
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let bytes = self
            .send_checked(path)
            .await?
            .bytes()
            .await
            .with_context(|| format!("cannot read body of GET {path}"))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_strips_trailing_slash() {
        let client = SpClient::new("https://acme.example.com/sites/acme/", "tok").unwrap();
        assert_eq!(client.api_base(), "https://acme.example.com/sites/acme/_api");
    }

    #[test]
    fn test_invalid_site_url_rejected() {
        assert!(SpClient::new("not a url", "tok").is_err());
    }

    #[test]
    fn test_odata_quote_doubles_single_quotes() {
        assert_eq!(odata_quote("O'Brien's"), "O''Brien''s");
        assert_eq!(odata_quote("plain"), "plain");
    }
}
