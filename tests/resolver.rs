//! Name resolution and the lookup data sources.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use yandex_provider::cloud::ClusterFlavor;
use yandex_provider::operation::Deadline;
use yandex_provider::resolver::{ResolveKind, Resolver};
use yandex_provider::testing::{
    sample_cluster, sample_service_account, Call, FakeCloud, Method, ProviderTester,
};
use yandex_provider::{ProviderError, YandexProvider};

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

async fn configured(cloud: &Arc<FakeCloud>) -> ProviderTester<YandexProvider> {
    let tester = ProviderTester::new(YandexProvider::with_cloud(cloud.clone()));
    assert_ok!(
        tester
            .configure(json!({"token": "t", "folder_id": "f-1"}))
            .await
    );
    tester
}

#[tokio::test]
async fn single_match_resolves_to_its_id() {
    let cloud = FakeCloud::new();
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", "ci"));
    cloud.insert_service_account(sample_service_account("sa-2", "f-1", "deploy"));
    cloud.insert_service_account(sample_service_account("sa-3", "f-2", "ci"));

    let id = assert_ok!(
        Resolver::new(&cloud)
            .resolve(&deadline(), ResolveKind::ServiceAccount, "ci", "f-1")
            .await
    );

    assert_eq!(id, "sa-1");
}

#[tokio::test]
async fn duplicate_names_are_ambiguous() {
    let cloud = FakeCloud::new();
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", "ci"));
    cloud.insert_service_account(sample_service_account("sa-2", "f-1", "ci"));

    let err = assert_err!(
        Resolver::new(&cloud)
            .resolve(&deadline(), ResolveKind::ServiceAccount, "ci", "f-1")
            .await
    );

    assert!(matches!(err, ProviderError::AmbiguousName(_)), "{:?}", err);
}

#[tokio::test]
async fn missing_name_is_not_found() {
    let cloud = FakeCloud::new();
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", "deploy"));

    let err = assert_err!(
        Resolver::new(&cloud)
            .resolve(&deadline(), ResolveKind::ServiceAccount, "ci", "f-1")
            .await
    );

    assert!(err.is_not_found());
}

#[tokio::test]
async fn empty_name_or_folder_is_rejected_without_listing() {
    let cloud = FakeCloud::new();
    let resolver = Resolver::new(&cloud);

    let err = assert_err!(
        resolver
            .resolve(&deadline(), ResolveKind::ServiceAccount, "", "f-1")
            .await
    );
    assert!(matches!(err, ProviderError::Configuration(_)));

    let err = assert_err!(
        resolver
            .resolve(&deadline(), ResolveKind::ServiceAccount, "ci", "")
            .await
    );
    assert!(matches!(err, ProviderError::Configuration(_)));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn listing_walks_every_page() {
    let cloud = FakeCloud::new();
    for i in 0..5 {
        cloud.insert_cluster(
            ClusterFlavor::PostgreSql,
            sample_cluster(&format!("c-{}", i), "f-1", "db"),
        );
    }

    let err = assert_err!(
        Resolver::new(&cloud)
            .with_page_size(2)
            .resolve(
                &deadline(),
                ResolveKind::Cluster(ClusterFlavor::PostgreSql),
                "db",
                "f-1"
            )
            .await
    );

    assert!(matches!(err, ProviderError::AmbiguousName(_)));
    assert_eq!(cloud.call_count(Method::ListClusters), 3);
    let tokens: Vec<_> = cloud
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ListClusters(_, req) => Some(req.page_token),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec!["".to_string(), "2".to_string(), "4".to_string()]);
}

#[tokio::test]
async fn duplicates_on_separate_pages_are_ambiguous() {
    let cloud = FakeCloud::new();
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", "ci"));
    cloud.insert_service_account(sample_service_account("sa-2", "f-1", "ci"));

    let err = assert_err!(
        Resolver::new(&cloud)
            .with_page_size(1)
            .resolve(&deadline(), ResolveKind::ServiceAccount, "ci", "f-1")
            .await
    );

    assert!(matches!(err, ProviderError::AmbiguousName(_)), "{:?}", err);
    assert_eq!(cloud.call_count(Method::ListServiceAccounts), 2);
}

#[tokio::test]
async fn single_item_pages_still_resolve() {
    let cloud = FakeCloud::new();
    cloud.insert_cluster(ClusterFlavor::MongoDb, sample_cluster("m-1", "f-1", "other"));
    cloud.insert_cluster(ClusterFlavor::MongoDb, sample_cluster("m-2", "f-1", "other"));
    cloud.insert_cluster(ClusterFlavor::MongoDb, sample_cluster("m-3", "f-1", "docs"));

    let entry = assert_ok!(
        Resolver::new(&cloud)
            .with_page_size(1)
            .resolve_entry(
                &deadline(),
                ResolveKind::Cluster(ClusterFlavor::MongoDb),
                "docs",
                "f-1"
            )
            .await
    );

    assert_eq!(entry.id, "m-3");
    assert_eq!(entry.name, "docs");
}

#[tokio::test]
async fn names_with_quotes_and_backslashes_are_escaped() {
    let cloud = FakeCloud::new();
    let tricky = r#"say "hi" \o/"#;
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", tricky));
    cloud.insert_service_account(sample_service_account("sa-2", "f-1", "say"));

    let id = assert_ok!(
        Resolver::new(&cloud)
            .resolve(&deadline(), ResolveKind::ServiceAccount, tricky, "f-1")
            .await
    );

    assert_eq!(id, "sa-1");
    match &cloud.calls()[0] {
        Call::ListServiceAccounts(req) => {
            assert_eq!(req.filter, r#"name = "say ""hi"" \\o/""#);
            assert_eq!(req.folder_id, "f-1");
            assert_eq!(req.page_size, 100);
        }
        other => panic!("expected list, got {:?}", other),
    }
}

#[tokio::test]
async fn clusters_are_resolved_per_flavor() {
    let cloud = FakeCloud::new();
    cloud.insert_cluster(ClusterFlavor::ClickHouse, sample_cluster("ch-1", "f-1", "db"));
    cloud.insert_cluster(ClusterFlavor::PostgreSql, sample_cluster("pg-1", "f-1", "db"));

    let id = assert_ok!(
        Resolver::new(&cloud)
            .resolve(
                &deadline(),
                ResolveKind::Cluster(ClusterFlavor::ClickHouse),
                "db",
                "f-1"
            )
            .await
    );

    assert_eq!(id, "ch-1");
}

#[tokio::test]
async fn cluster_data_source_reads_by_name() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.insert_cluster(ClusterFlavor::PostgreSql, sample_cluster("pg-1", "f-1", "main"));
    let tester = configured(&cloud).await;

    let result = assert_ok!(
        tester
            .read_data_source("yandex_mdb_postgresql_cluster", json!({"name": "main"}))
            .await
    );

    assert_eq!(
        result,
        json!({
            "cluster_id": "pg-1",
            "name": "main",
            "folder_id": "f-1",
            "description": "",
            "created_at": "2019-01-01T00:00:00Z",
        })
    );
}

#[tokio::test]
async fn cluster_data_source_reports_ambiguity() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.insert_cluster(ClusterFlavor::MongoDb, sample_cluster("m-1", "f-1", "db"));
    cloud.insert_cluster(ClusterFlavor::MongoDb, sample_cluster("m-2", "f-1", "db"));
    let tester = configured(&cloud).await;

    let err = assert_err!(
        tester
            .read_data_source("yandex_mdb_mongodb_cluster", json!({"name": "db"}))
            .await
    );

    assert!(matches!(err, ProviderError::AmbiguousName(_)));
}

#[tokio::test]
async fn service_account_data_source_by_name_or_id() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.insert_service_account(sample_service_account("sa-1", "f-1", "ci"));
    let tester = configured(&cloud).await;

    let by_name = assert_ok!(
        tester
            .read_data_source("yandex_iam_service_account", json!({"name": "ci"}))
            .await
    );
    let by_id = assert_ok!(
        tester
            .read_data_source(
                "yandex_iam_service_account",
                json!({"service_account_id": "sa-1"})
            )
            .await
    );

    assert_eq!(by_name, by_id);
    assert_eq!(by_name["service_account_id"], "sa-1");
    assert_eq!(by_name["folder_id"], "f-1");
}

#[tokio::test]
async fn service_account_data_source_needs_exactly_one_key() {
    let cloud = Arc::new(FakeCloud::new());
    let tester = configured(&cloud).await;

    for config in [
        json!({}),
        json!({"name": "ci", "service_account_id": "sa-1"}),
    ] {
        let err = assert_err!(
            tester
                .read_data_source("yandex_iam_service_account", config)
                .await
        );
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn unknown_data_source_is_rejected() {
    let cloud = Arc::new(FakeCloud::new());
    let tester = configured(&cloud).await;

    let err = assert_err!(
        tester
            .read_data_source("yandex_mdb_redis_cluster", json!({"name": "db"}))
            .await
    );

    assert!(matches!(err, ProviderError::UnknownResource(_)));
}
