//! One-shot HTTP effects over reqwest.

use reqwest::{Client, Method};
use tether_types::HttpMethod;

use crate::{
    HttpProvider, HttpRequest, HttpResponse, HttpSettings, ProviderFut, TransportError,
    build_http_client,
};

#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: Client,
}

impl ReqwestHttp {
    pub fn new(settings: &HttpSettings) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_http_client(settings)?,
        })
    }
}

pub(crate) fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Connect => Method::CONNECT,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Trace => Method::TRACE,
        HttpMethod::Patch => Method::PATCH,
    }
}

impl HttpProvider for ReqwestHttp {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> ProviderFut<'a, HttpResponse> {
        Box::pin(async move {
            let url = request.url.as_str();
            let mut builder = self
                .client
                .request(reqwest_method(request.method), url);
            for header in &request.headers {
                builder = builder.header(header.name.as_str(), header.value.as_str());
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body.clone());
            }

            let response = builder
                .send()
                .await
                .map_err(|source| TransportError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|source| TransportError::Body {
                    url: url.to_string(),
                    source,
                })?;

            tracing::debug!(
                method = %request.method,
                url,
                status,
                body_bytes = body.len(),
                "HTTP effect completed"
            );
            Ok(HttpResponse::new(status, body.to_vec()))
        })
    }
}
