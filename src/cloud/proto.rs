//! Wire messages for the Yandex Cloud gRPC API.
//!
//! These mirror the cloud's published protobuf definitions field-for-field
//! (same tags, same types) for the subset of services this provider talks to.
//! Fields the provider never reads are omitted; prost skips unknown fields
//! on decode.

/// `google.rpc`
pub mod rpc {
    /// `google.rpc.Status`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Status {
        #[prost(int32, tag = "1")]
        pub code: i32,
        #[prost(string, tag = "2")]
        pub message: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "3")]
        pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
    }
}

/// `google.protobuf.Empty`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

impl ::prost::Name for Empty {
    const NAME: &'static str = "Empty";
    const PACKAGE: &'static str = "google.protobuf";
    fn full_name() -> ::prost::alloc::string::String {
        "google.protobuf.Empty".into()
    }
    fn type_url() -> ::prost::alloc::string::String {
        "type.googleapis.com/google.protobuf.Empty".into()
    }
}

/// `yandex.cloud.operation`
pub mod operation {
    /// `yandex.cloud.operation.Operation`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Operation {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub description: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "3")]
        pub created_at: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(string, tag = "4")]
        pub created_by: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "5")]
        pub modified_at: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(bool, tag = "6")]
        pub done: bool,
        #[prost(message, optional, tag = "7")]
        pub metadata: ::core::option::Option<::prost_types::Any>,
        #[prost(oneof = "operation::Result", tags = "8, 9")]
        pub result: ::core::option::Option<operation::Result>,
    }

    /// Nested types of [`Operation`].
    pub mod operation {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(message, tag = "8")]
            Error(super::super::rpc::Status),
            #[prost(message, tag = "9")]
            Response(::prost_types::Any),
        }
    }

    /// `yandex.cloud.operation.GetOperationRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetOperationRequest {
        #[prost(string, tag = "1")]
        pub operation_id: ::prost::alloc::string::String,
    }
}

/// `yandex.cloud.iam.v1`
pub mod iam {
    /// `yandex.cloud.iam.v1.ServiceAccount`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ServiceAccount {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub folder_id: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "3")]
        pub created_at: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(string, tag = "4")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "5")]
        pub description: ::prost::alloc::string::String,
    }

    impl ::prost::Name for ServiceAccount {
        const NAME: &'static str = "ServiceAccount";
        const PACKAGE: &'static str = "yandex.cloud.iam.v1";
        fn full_name() -> ::prost::alloc::string::String {
            "yandex.cloud.iam.v1.ServiceAccount".into()
        }
        fn type_url() -> ::prost::alloc::string::String {
            "type.googleapis.com/yandex.cloud.iam.v1.ServiceAccount".into()
        }
    }

    /// `yandex.cloud.iam.v1.GetServiceAccountRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetServiceAccountRequest {
        #[prost(string, tag = "1")]
        pub service_account_id: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.ListServiceAccountsRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListServiceAccountsRequest {
        #[prost(string, tag = "1")]
        pub folder_id: ::prost::alloc::string::String,
        #[prost(int64, tag = "2")]
        pub page_size: i64,
        #[prost(string, tag = "3")]
        pub page_token: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub filter: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.ListServiceAccountsResponse`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListServiceAccountsResponse {
        #[prost(message, repeated, tag = "1")]
        pub service_accounts: ::prost::alloc::vec::Vec<ServiceAccount>,
        #[prost(string, tag = "2")]
        pub next_page_token: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.CreateServiceAccountRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateServiceAccountRequest {
        #[prost(string, tag = "1")]
        pub folder_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub description: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.UpdateServiceAccountRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct UpdateServiceAccountRequest {
        #[prost(string, tag = "1")]
        pub service_account_id: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub update_mask: ::core::option::Option<::prost_types::FieldMask>,
        #[prost(string, tag = "3")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub description: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.DeleteServiceAccountRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DeleteServiceAccountRequest {
        #[prost(string, tag = "1")]
        pub service_account_id: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.iam.v1.CreateIamTokenRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateIamTokenRequest {
        #[prost(oneof = "create_iam_token_request::Identity", tags = "1, 2")]
        pub identity: ::core::option::Option<create_iam_token_request::Identity>,
    }

    /// Nested types of [`CreateIamTokenRequest`].
    pub mod create_iam_token_request {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Identity {
            #[prost(string, tag = "1")]
            YandexPassportOauthToken(::prost::alloc::string::String),
            #[prost(string, tag = "2")]
            Jwt(::prost::alloc::string::String),
        }
    }

    /// `yandex.cloud.iam.v1.CreateIamTokenResponse`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateIamTokenResponse {
        #[prost(string, tag = "1")]
        pub iam_token: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub expires_at: ::core::option::Option<::prost_types::Timestamp>,
    }
}

/// `yandex.cloud.mdb.{postgresql,mongodb,clickhouse}.v1`
///
/// The three flavors share the listing shape, so one set of messages serves
/// all of them on the wire.
pub mod mdb {
    /// `yandex.cloud.mdb.*.v1.Cluster`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Cluster {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub folder_id: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "3")]
        pub created_at: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(string, tag = "4")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "5")]
        pub description: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.mdb.*.v1.ListClustersRequest`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListClustersRequest {
        #[prost(string, tag = "1")]
        pub folder_id: ::prost::alloc::string::String,
        #[prost(int64, tag = "2")]
        pub page_size: i64,
        #[prost(string, tag = "3")]
        pub page_token: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub filter: ::prost::alloc::string::String,
    }

    /// `yandex.cloud.mdb.*.v1.ListClustersResponse`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ListClustersResponse {
        #[prost(message, repeated, tag = "1")]
        pub clusters: ::prost::alloc::vec::Vec<Cluster>,
        #[prost(string, tag = "2")]
        pub next_page_token: ::prost::alloc::string::String,
    }
}
