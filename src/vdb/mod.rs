//! Vulnerability database queries
//!
//! Thin wrappers over the database API. Responses are returned as opaque
//! JSON apart from the ecosystem list. Requests always use the signing
//! method, so every call carries a bearer token from the exchange.

use serde_json::Value;

use vulnetix_protocol::ops::{Ecosystem, EcosystemsResponse};
use vulnetix_protocol::paths;

use crate::auth::{AuthMethod, CredentialError};
use crate::client::{ApiClient, ApiResult, RateLimit};

/// Percent-encode one path segment
///
/// Unreserved characters and `$&+:=@` pass through; everything else,
/// including `/`, is escaped.
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b':' | b'=' | b'@');
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// `?limit=&offset=` for the positive values only
pub fn pagination_query(limit: u32, offset: u32) -> String {
    let mut params = Vec::new();
    if limit > 0 {
        params.push(format!("limit={}", limit));
    }
    if offset > 0 {
        params.push(format!("offset={}", offset));
    }
    if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    }
}

pub struct VdbClient {
    api: ApiClient,
}

impl VdbClient {
    /// Wrap a client holding signing credentials
    pub fn new(api: ApiClient) -> ApiResult<Self> {
        if api.credentials().method() != AuthMethod::SigV4 {
            return Err(CredentialError::Incomplete(
                "vulnerability database queries require sigv4 credentials (VVD_ORG + VVD_SECRET)"
                    .to_string(),
            )
            .into());
        }
        Ok(Self { api })
    }

    pub fn last_rate_limit(&self) -> Option<RateLimit> {
        self.api.last_rate_limit()
    }

    /// Details for one CVE
    pub fn cve(&self, cve_id: &str) -> ApiResult<Value> {
        self.api
            .get_json(&format!("/vuln/{}", encode_path_segment(cve_id)))
    }

    pub fn ecosystems(&self) -> ApiResult<Vec<Ecosystem>> {
        let response: EcosystemsResponse = self.api.get_json(paths::ECOSYSTEMS)?;
        Ok(response.ecosystems)
    }

    pub fn product_versions(&self, product: &str, limit: u32, offset: u32) -> ApiResult<Value> {
        self.api.get_json(&format!(
            "/product/{}{}",
            encode_path_segment(product),
            pagination_query(limit, offset)
        ))
    }

    pub fn product_version(&self, product: &str, version: &str) -> ApiResult<Value> {
        self.api.get_json(&format!(
            "/product/{}/{}",
            encode_path_segment(product),
            encode_path_segment(version)
        ))
    }

    pub fn package_vulnerabilities(&self, package: &str, limit: u32, offset: u32) -> ApiResult<Value> {
        self.api.get_json(&format!(
            "/{}/vulns{}",
            encode_path_segment(package),
            pagination_query(limit, offset)
        ))
    }

    pub fn openapi_spec(&self) -> ApiResult<Value> {
        self.api.get_json(paths::OPENAPI_SPEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::client::ApiError;
    use crate::mock::{MockService, Route};
    use std::sync::Arc;

    fn client(service: &Arc<MockService>) -> VdbClient {
        let api = ApiClient::new(service.clone(), "https://vdb.test/v1", Credentials::signing("org", "s"))
            .with_token_url("https://vdb.test/v1");
        VdbClient::new(api).unwrap()
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("CVE-2024-1234"), "CVE-2024-1234");
        assert_eq!(encode_path_segment("@scope/pkg"), "@scope%2Fpkg");
        assert_eq!(encode_path_segment("a b?c#d"), "a%20b%3Fc%23d");
        assert_eq!(encode_path_segment("ü"), "%C3%BC");
    }

    #[test]
    fn test_pagination_query() {
        assert_eq!(pagination_query(0, 0), "");
        assert_eq!(pagination_query(10, 0), "?limit=10");
        assert_eq!(pagination_query(0, 20), "?offset=20");
        assert_eq!(pagination_query(10, 20), "?limit=10&offset=20");
    }

    #[test]
    fn test_requires_signing_credentials() {
        let service = Arc::new(MockService::new());
        let api = ApiClient::new(service.clone(), "https://vdb.test/v1", Credentials::api_key("org", "k"));
        assert!(matches!(VdbClient::new(api), Err(ApiError::Credentials(_))));
    }

    #[test]
    fn test_query_paths() {
        let service = Arc::new(MockService::new());
        let vdb = client(&service);

        vdb.cve("CVE-2024-1234").unwrap();
        vdb.product_versions("express", 5, 10).unwrap();
        vdb.product_version("@angular/core", "17.0.0").unwrap();
        vdb.package_vulnerabilities("lodash", 0, 0).unwrap();
        vdb.openapi_spec().unwrap();

        let urls: Vec<String> = service.requests_for(Route::Vdb).into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://vdb.test/v1/vuln/CVE-2024-1234",
                "https://vdb.test/v1/product/express?limit=5&offset=10",
                "https://vdb.test/v1/product/@angular%2Fcore/17.0.0",
                "https://vdb.test/v1/lodash/vulns",
                "https://vdb.test/v1/spec",
            ]
        );
        // One token exchange serves every query
        assert_eq!(service.count(Route::AuthToken), 1);
    }

    #[test]
    fn test_ecosystems() {
        let service = Arc::new(MockService::new());
        service.inject_status(
            Route::Vdb,
            200,
            r#"{"timestamp":1700000000,"ecosystems":[{"name":"npm","count":12},{"name":"pypi","count":3}]}"#,
        );
        let ecosystems = client(&service).ecosystems().unwrap();
        assert_eq!(ecosystems.len(), 2);
        assert_eq!(ecosystems[0].name, "npm");
        assert_eq!(ecosystems[0].count, 12);
    }

    #[test]
    fn test_records_rate_limit() {
        let service = Arc::new(MockService::new());
        service.set_response_headers(&[
            ("RateLimit-MinuteLimit", "60"),
            ("RateLimit-Remaining", "59"),
            ("RateLimit-Reset", "42"),
        ]);
        let vdb = client(&service);
        assert!(vdb.last_rate_limit().is_none());
        vdb.cve("CVE-2024-1234").unwrap();
        let rate = vdb.last_rate_limit().unwrap();
        assert_eq!(rate.minute_limit, 60);
        assert_eq!(rate.remaining, 59);
    }
}
