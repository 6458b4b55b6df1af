use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use contact_tv::filter::FilterName;
use contact_tv::query::BackendQuery;
use contact_tv::service::resolve;
use contact_tv::sync::Account;
use contact_tv::{ContactService, HttpContactService, ListConfig, ListError, QueryParams, RouteData, RouteSynchronizer, Router};

fn service(server: &MockServer) -> HttpContactService {
    let config = ListConfig::new(Url::parse(&server.uri()).unwrap());
    HttpContactService::new(&config).unwrap()
}

fn first_page() -> BackendQuery {
    BackendQuery {
        page: 0,
        size: 20,
        sort: vec!["id,asc".to_string()],
        filters: Vec::new(),
    }
}

fn contacts() -> serde_json::Value {
    json!([
        {"id": 1, "nom": "Martin", "prenom": "Alice", "age": 34, "address": "1 rue Haute", "codepostal": 75001},
        {"id": 2, "nom": "Bernard", "prenom": "Bob", "age": null}
    ])
}

#[tokio::test]
async fn query_sends_backend_params_and_reads_total_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .and(query_param("page", "2"))
        .and(query_param("size", "20"))
        .and(query_param("sort", "nom,desc"))
        .and(query_param("nom.contains", "ar"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(contacts())
                .insert_header("X-Total-Count", "93"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = BackendQuery {
        page: 2,
        size: 20,
        sort: vec!["nom,desc".to_string()],
        filters: vec![("nom.contains".parse::<FilterName>().unwrap(), vec!["ar".to_string()])],
    };
    let page = service(&server).query(&query).await.unwrap();
    assert_eq!(page.total_count, 93);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].nom.as_deref(), Some("Martin"));
    assert_eq!(page.items[0].codepostal, Some(75001));
    assert_eq!(page.items[1].age, None);
}

#[tokio::test]
async fn missing_count_and_empty_body_give_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let page = service(&server).query(&first_page()).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn null_body_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("null")
                .insert_header("X-Total-Count", "not-a-number"),
        )
        .mount(&server)
        .await;

    let page = service(&server).query(&first_page()).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn status_codes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad sort"))
        .mount(&server)
        .await;

    let service = service(&server);
    let unavailable = service.query(&first_page()).await.unwrap_err();
    assert!(matches!(unavailable, ListError::BackendUnavailable(_)));

    let query = BackendQuery { page: 1, ..first_page() };
    match service.query(&query).await.unwrap_err() {
        ListError::BackendRejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad sort");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\": "))
        .mount(&server)
        .await;

    let error = service(&server).query(&first_page()).await.unwrap_err();
    assert!(matches!(error, ListError::MalformedResponse(_)));
    assert!(error.is_backend());
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let config = ListConfig::new(Url::parse("http://127.0.0.1:1/").unwrap());
    let error = HttpContactService::new(&config)
        .unwrap()
        .query(&first_page())
        .await
        .unwrap_err();
    assert!(matches!(error, ListError::BackendUnavailable(_)));
}

#[tokio::test]
async fn find_maps_404_to_none_and_resolve_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "nom": "Martin"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/contacts/5"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = service(&server);
    let found = service.find(1).await.unwrap().unwrap();
    assert_eq!(found.nom.as_deref(), Some("Martin"));
    assert_eq!(service.find(5).await.unwrap(), None);
    assert!(matches!(resolve(&service, 5).await, Err(ListError::NotFound(5))));
}

#[tokio::test]
async fn delete_calls_the_record_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/contacts/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    service(&server).delete(7).await.unwrap();
}

#[tokio::test]
async fn synchronizer_loads_the_url_page_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/contacts"))
        .and(query_param("page", "1"))
        .and(query_param("sort", "prenom,asc"))
        .and(query_param("age.greaterThan", "30"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(contacts())
                .insert_header("X-Total-Count", "22"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ListConfig::new(Url::parse(&server.uri()).unwrap());
    let service = Arc::new(HttpContactService::new(&config).unwrap());
    let router = Router::new(
        QueryParams::parse("page=2&sort=prenom,asc&filter[age.greaterThan]=30"),
        RouteData::default(),
    );
    let mut sync = RouteSynchronizer::new(config, service, router);
    let (_auth_tx, auth_rx) = watch::channel(Some(Account::new("admin")));
    sync.mount(auth_rx);
    sync.settle().await;

    assert!(sync.last_error().is_none());
    assert_eq!(sync.total_items(), 22);
    assert_eq!(sync.total_pages(), 2);
    assert_eq!(sync.table().rows().len(), 2);
    assert_eq!(sync.table().rows()[1].age, "");
}
