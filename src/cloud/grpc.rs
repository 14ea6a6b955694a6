//! gRPC implementation of [`CloudApi`] on top of `tonic`.
//!
//! Channels are created lazily, so building an [`Sdk`] never blocks on the
//! network; the first call on a channel establishes the connection.

use std::sync::Arc;

use async_trait::async_trait;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Status;
use tracing::{debug, info};

use super::auth::TokenSource;
use super::proto::iam::{
    CreateServiceAccountRequest, DeleteServiceAccountRequest, GetServiceAccountRequest,
    ListServiceAccountsRequest, ListServiceAccountsResponse, ServiceAccount,
    UpdateServiceAccountRequest,
};
use super::proto::mdb::{ListClustersRequest, ListClustersResponse};
use super::proto::operation::{GetOperationRequest, Operation};
use super::{ClusterFlavor, ClusterService, CloudApi, OperationService, ServiceAccountService};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::operation::Deadline;

/// User agent attached to every channel.
pub const USER_AGENT: &str = concat!("yandex-provider/", env!("CARGO_PKG_VERSION"));

/// Issue a single unary call on `channel`.
pub(crate) async fn unary<Req, Resp>(
    channel: Channel,
    path: &'static str,
    request: tonic::Request<Req>,
) -> Result<Resp, Status>
where
    Req: prost::Message + Send + Sync + 'static,
    Resp: prost::Message + Default + Send + Sync + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;
    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let response = grpc
        .unary(request, PathAndQuery::from_static(path), codec)
        .await?;
    Ok(response.into_inner())
}

/// Address of one API service, given the configured endpoint.
///
/// The public endpoint `api.<domain>` hosts each service under its own
/// subdomain (`iam.api.<domain>`); any other endpoint is assumed to serve
/// every service itself.
pub fn service_address(endpoint: &str, service: &str) -> String {
    if endpoint.starts_with("api.") {
        format!("{}.{}", service, endpoint)
    } else {
        endpoint.to_string()
    }
}

fn channel(address: &str, plaintext: bool) -> Result<Channel, ProviderError> {
    let scheme = if plaintext { "http" } else { "https" };
    let mut endpoint =
        Endpoint::from_shared(format!("{}://{}", scheme, address))?.user_agent(USER_AGENT)?;
    if !plaintext {
        endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
    }
    Ok(endpoint.connect_lazy())
}

/// An authenticated channel to one API service.
#[derive(Clone)]
struct Client {
    channel: Channel,
    tokens: Arc<TokenSource>,
}

impl Client {
    async fn call<Req, Resp>(
        &self,
        ctx: &Deadline,
        path: &'static str,
        message: Req,
    ) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let token = self.tokens.token(ctx).await?;
        let bearer: AsciiMetadataValue = format!("Bearer {}", token)
            .parse()
            .map_err(|_| Status::unauthenticated("IAM token is not valid ASCII"))?;

        let mut request = tonic::Request::new(message);
        request.set_timeout(ctx.remaining());
        request.metadata_mut().insert("authorization", bearer);

        debug!(method = path, "calling cloud API");
        unary(self.channel.clone(), path, request).await
    }
}

struct GrpcServiceAccounts(Client);

#[async_trait]
impl ServiceAccountService for GrpcServiceAccounts {
    async fn get(
        &self,
        ctx: &Deadline,
        request: GetServiceAccountRequest,
    ) -> Result<ServiceAccount, Status> {
        self.0
            .call(ctx, "/yandex.cloud.iam.v1.ServiceAccountService/Get", request)
            .await
    }

    async fn list(
        &self,
        ctx: &Deadline,
        request: ListServiceAccountsRequest,
    ) -> Result<ListServiceAccountsResponse, Status> {
        self.0
            .call(ctx, "/yandex.cloud.iam.v1.ServiceAccountService/List", request)
            .await
    }

    async fn create(
        &self,
        ctx: &Deadline,
        request: CreateServiceAccountRequest,
    ) -> Result<Operation, Status> {
        self.0
            .call(ctx, "/yandex.cloud.iam.v1.ServiceAccountService/Create", request)
            .await
    }

    async fn update(
        &self,
        ctx: &Deadline,
        request: UpdateServiceAccountRequest,
    ) -> Result<Operation, Status> {
        self.0
            .call(ctx, "/yandex.cloud.iam.v1.ServiceAccountService/Update", request)
            .await
    }

    async fn delete(
        &self,
        ctx: &Deadline,
        request: DeleteServiceAccountRequest,
    ) -> Result<Operation, Status> {
        self.0
            .call(ctx, "/yandex.cloud.iam.v1.ServiceAccountService/Delete", request)
            .await
    }
}

struct GrpcOperations(Client);

#[async_trait]
impl OperationService for GrpcOperations {
    async fn get(&self, ctx: &Deadline, operation_id: &str) -> Result<Operation, Status> {
        let request = GetOperationRequest {
            operation_id: operation_id.to_string(),
        };
        self.0
            .call(ctx, "/yandex.cloud.operation.OperationService/Get", request)
            .await
    }
}

struct GrpcClusters {
    client: Client,
    list_path: &'static str,
}

impl GrpcClusters {
    fn new(client: Client, flavor: ClusterFlavor) -> Self {
        let list_path = match flavor {
            ClusterFlavor::PostgreSql => "/yandex.cloud.mdb.postgresql.v1.ClusterService/List",
            ClusterFlavor::MongoDb => "/yandex.cloud.mdb.mongodb.v1.ClusterService/List",
            ClusterFlavor::ClickHouse => "/yandex.cloud.mdb.clickhouse.v1.ClusterService/List",
        };
        Self { client, list_path }
    }
}

#[async_trait]
impl ClusterService for GrpcClusters {
    async fn list(
        &self,
        ctx: &Deadline,
        request: ListClustersRequest,
    ) -> Result<ListClustersResponse, Status> {
        self.client.call(ctx, self.list_path, request).await
    }
}

/// The live cloud client, shared by every reconciler in the process.
pub struct Sdk {
    service_accounts: GrpcServiceAccounts,
    operations: GrpcOperations,
    postgresql: GrpcClusters,
    mongodb: GrpcClusters,
    clickhouse: GrpcClusters,
}

impl Sdk {
    /// Build a client from provider configuration.
    ///
    /// Fails with [`ProviderError::Auth`] when no credentials are configured.
    /// Must be called from within a Tokio runtime.
    pub fn build(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let credentials = config.credentials()?;
        let endpoint = config.endpoint();
        info!(endpoint, plaintext = config.plaintext, "building cloud client");

        let iam = channel(&service_address(endpoint, "iam"), config.plaintext)?;
        let operation = channel(&service_address(endpoint, "operation"), config.plaintext)?;
        let mdb = channel(&service_address(endpoint, "mdb"), config.plaintext)?;

        let tokens = Arc::new(TokenSource::new(credentials, iam.clone()));
        let client = |channel: Channel| Client {
            channel,
            tokens: Arc::clone(&tokens),
        };

        Ok(Self {
            service_accounts: GrpcServiceAccounts(client(iam)),
            operations: GrpcOperations(client(operation)),
            postgresql: GrpcClusters::new(client(mdb.clone()), ClusterFlavor::PostgreSql),
            mongodb: GrpcClusters::new(client(mdb.clone()), ClusterFlavor::MongoDb),
            clickhouse: GrpcClusters::new(client(mdb), ClusterFlavor::ClickHouse),
        })
    }
}

impl CloudApi for Sdk {
    fn service_accounts(&self) -> &dyn ServiceAccountService {
        &self.service_accounts
    }

    fn operations(&self) -> &dyn OperationService {
        &self.operations
    }

    fn clusters(&self, flavor: ClusterFlavor) -> &dyn ClusterService {
        match flavor {
            ClusterFlavor::PostgreSql => &self.postgresql,
            ClusterFlavor::MongoDb => &self.mongodb,
            ClusterFlavor::ClickHouse => &self.clickhouse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_address_for_public_endpoint() {
        assert_eq!(
            service_address("api.cloud.yandex.net:443", "iam"),
            "iam.api.cloud.yandex.net:443"
        );
        assert_eq!(
            service_address("api.cloud.yandex.net:443", "operation"),
            "operation.api.cloud.yandex.net:443"
        );
    }

    #[test]
    fn test_service_address_for_custom_endpoint() {
        assert_eq!(service_address("localhost:4443", "mdb"), "localhost:4443");
    }

    #[tokio::test]
    async fn test_build_requires_credentials() {
        let err = Sdk::build(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_build_with_iam_token() {
        let config = ProviderConfig {
            iam_token: Some("t1".to_string()),
            ..Default::default()
        };
        assert!(Sdk::build(&config).is_ok());
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("yandex-provider/"));
    }
}
