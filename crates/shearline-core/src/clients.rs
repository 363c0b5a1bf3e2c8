//! CRUD clients for backend resource collections.
//!
//! These add no credential or retry handling of their own; every error from
//! the gateway is returned as is.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::transport::RequestSpec;

/// Client bound to one collection, e.g. `/appointments`.
#[derive(Clone)]
pub struct ResourceClient {
    gateway: Gateway,
    base_path: String,
}

impl ResourceClient {
    pub fn new(gateway: Gateway, base_path: &str) -> Self {
        let base_path = format!("/{}", base_path.trim_matches('/'));
        Self { gateway, base_path }
    }

    /// Collection path, e.g. `/barbers`.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.base_path, id)
    }

    /// `GET /<collection>?<query>`
    pub async fn list<T: DeserializeOwned>(&self, query: &[(&str, &str)]) -> GatewayResult<T> {
        let spec = query
            .iter()
            .fold(RequestSpec::get(self.base_path.clone()), |spec, (key, value)| {
                spec.query(*key, *value)
            });
        self.gateway.send_json(spec).await
    }

    /// `GET /<collection>/<id>`
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> GatewayResult<T> {
        self.gateway.send_json(RequestSpec::get(self.item_path(id))).await
    }

    /// `POST /<collection>`
    pub async fn create<B, T>(&self, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.gateway.send_json(RequestSpec::post(self.base_path.clone()).json(body)?).await
    }

    /// `PUT /<collection>/<id>`
    pub async fn update<B, T>(&self, id: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.gateway.send_json(RequestSpec::put(self.item_path(id)).json(body)?).await
    }

    /// `PATCH /<collection>/<id>`
    pub async fn patch<B, T>(&self, id: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.gateway.send_json(RequestSpec::patch(self.item_path(id)).json(body)?).await
    }

    /// `DELETE /<collection>/<id>`
    pub async fn delete(&self, id: &str) -> GatewayResult<()> {
        self.gateway.send(RequestSpec::delete(self.item_path(id))).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::error::GatewayError;
    use crate::refresh::DEFAULT_REFRESH_PATH;
    use crate::transport::{OutboundRequest, RawOutcome, Transport};
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::{Arc, Mutex};

    /// Echoes back 200 `{}` (or a fixed status) and records requests.
    struct EchoTransport {
        status: u16,
        seen: Mutex<Vec<RequestSpec>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn execute(&self, request: OutboundRequest) -> RawOutcome {
            self.seen.lock().unwrap().push(request.spec);
            RawOutcome::Response { status: self.status, body: "{}".to_string() }
        }
    }

    fn client(status: u16, base: &str) -> (ResourceClient, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport { status, seen: Mutex::new(Vec::new()) });
        let gateway =
            Gateway::new(transport.clone(), CredentialStore::in_memory(), DEFAULT_REFRESH_PATH);
        (ResourceClient::new(gateway, base), transport)
    }

    #[test]
    fn test_base_path_normalized() {
        let (client, _) = client(200, "appointments/");
        assert_eq!(client.base_path(), "/appointments");
    }

    #[tokio::test]
    async fn test_crud_requests_shape() {
        let (client, transport) = client(200, "/appointments");
        let body = serde_json::json!({ "status": "confirmed" });

        let _: serde_json::Value = client.list(&[("date", "2026-10-18")]).await.unwrap();
        let _: serde_json::Value = client.get("a1").await.unwrap();
        let _: serde_json::Value = client.create(&body).await.unwrap();
        let _: serde_json::Value = client.update("a1", &body).await.unwrap();
        let _: serde_json::Value = client.patch("a1", &body).await.unwrap();
        client.delete("a1").await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let shape: Vec<(Method, &str)> =
            seen.iter().map(|spec| (spec.method.clone(), spec.path.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (Method::GET, "/appointments"),
                (Method::GET, "/appointments/a1"),
                (Method::POST, "/appointments"),
                (Method::PUT, "/appointments/a1"),
                (Method::PATCH, "/appointments/a1"),
                (Method::DELETE, "/appointments/a1"),
            ]
        );
        assert_eq!(seen[0].query, vec![("date".to_string(), "2026-10-18".to_string())]);
        assert_eq!(seen[2].body, Some(body));
    }

    #[tokio::test]
    async fn test_errors_propagate_unchanged() {
        let (client, _) = client(403, "/barbers");
        let result: GatewayResult<serde_json::Value> = client.get("b1").await;
        assert_eq!(result, Err(GatewayError::AuthorizationDenied));
    }
}
