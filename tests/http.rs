use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use warp::http::StatusCode;
use warp::test::request;
use warp::{Filter, Rejection, Reply};

use experiences::catalog::Catalog;
use experiences::config::{DataConfig, Mode};
use experiences::environment::Environment;
use experiences::routes;
use experiences::snapshot::STORAGE_KEY;

const PATH: &str = "experiences";

fn seed() -> Value {
    json!([
        {
            "id": "a",
            "enabled": true,
            "images": ["https://example.com/a.jpg"],
            "translations": {
                "en": { "title": "Olive oil tasting", "description": "Taste", "content": "* Bread\n* Oil" },
                "it": { "title": "Degustazione d'olio", "description": "Assaggi", "content": "1. Pane\n2. Olio" }
            },
            "price": 35,
            "duration": "2 hours",
            "location": "Ostuni",
            "rating": 4.8,
            "maxPeople": 12,
            "reviews": []
        },
        {
            "id": "b",
            "enabled": false,
            "images": [],
            "translations": {
                "en": { "title": "Cave walk", "description": "", "content": "" },
                "it": { "title": "Passeggiata nelle grotte", "description": "", "content": "" }
            },
            "price": "20",
            "maxPeople": "6"
        },
        {
            "id": "c",
            "translations": {
                "en": { "title": "Cooking class" },
                "it": { "title": "Corso di cucina" }
            },
            "price": 80,
            "reviews": [
                { "id": "r1", "name": "Giulia", "rating": 5, "comment": "Buonissimo", "date": "2024-05-02" }
            ]
        }
    ])
}

struct Fixture {
    dir: TempDir,
    environment: Environment,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temporary directory");
        let seed_path = dir.path().join("seed.json");
        fs::write(&seed_path, seed().to_string()).expect("write seed file");

        let config = DataConfig {
            mode: Mode::Json,
            connection_string: None,
            local_store_dir: Some(dir.path().join("store")),
            seed_path: Some(seed_path),
            bundled_seed: false,
        };

        let logger = Arc::new(log::discard());
        let catalog = Arc::new(Catalog::from_config(logger.clone(), &config).expect("create catalog"));

        Fixture {
            dir,
            environment: Environment::new(logger, catalog, PATH),
        }
    }

    fn api(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        let logger = self.environment.logger.clone();

        routes::make_catalog_routes(self.environment.clone())
            .recover(move |r| routes::format_rejection(logger.clone(), r))
    }

    fn snapshot_path(&self) -> std::path::PathBuf {
        self.dir
            .path()
            .join("store")
            .join(format!("{}.json", STORAGE_KEY))
    }
}

fn body(response: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(response.body()).expect("parse response body")
}

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("response is an array")
        .iter()
        .map(|e| e["id"].as_str().expect("id is a string").to_owned())
        .collect()
}

fn read_snapshot(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read snapshot")).expect("parse snapshot")
}

#[tokio::test]
async fn listing() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request().path("/experiences").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("server-timing"));
    assert_eq!(ids(&body(&response)), vec!["a", "b", "c"]);

    let response = request().path("/experiences/public").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&body(&response)), vec!["a", "c"]);

    // reads alone never write the snapshot
    assert!(!fixture.snapshot_path().exists());
}

#[tokio::test]
async fn retrieval() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request().path("/experiences/id/b").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);

    let experience = body(&response);
    assert_eq!(experience["price"], json!(20.0));
    assert_eq!(experience["maxPeople"], json!(6));
    assert_eq!(experience["images"], json!([]));

    let response = request().path("/experiences/id/missing").reply(&api).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body(&response),
        json!({ "id": "missing", "message": "Experience missing not found" })
    );
}

#[tokio::test]
async fn localized_views() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request().path("/experiences/id/a/view/en").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = body(&response);
    assert_eq!(view["title"], "Olive oil tasting");
    assert_eq!(view["content"], "<ul><li>Bread</li><li>Oil</li></ul>");
    assert_eq!(view["image"], "https://example.com/a.jpg");

    let response = request().path("/experiences/id/a/view/it").reply(&api).await;
    let view = body(&response);
    assert_eq!(view["title"], "Degustazione d'olio");
    assert_eq!(view["content"], "<ol><li>Pane</li><li>Olio</li></ol>");

    let response = request().path("/experiences/id/b/view/it").reply(&api).await;
    assert_eq!(body(&response)["image"], experiences::experience::DEFAULT_IMAGE);

    let response = request().path("/experiences/id/c/view/en").reply(&api).await;
    let view = body(&response);
    assert_eq!(view["reviewCount"], 1);
    assert_eq!(view["averageReviewRating"], json!(5.0));

    let response = request().path("/experiences/id/a/view/fr").reply(&api).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creation() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let submission = json!({
        "translations": {
            "en": { "title": "Boat trip", "description": "", "content": "" },
            "it": { "title": "Gita in barca", "description": "", "content": "" }
        },
        "price": "49.99",
        "maxPeople": "8"
    });

    let response = request()
        .method("POST")
        .path("/experiences")
        .json(&submission)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let id = body(&response)["id"].as_str().expect("created ID").to_owned();
    assert_eq!(
        response.headers()["location"],
        format!("/experiences/id/{}", id).as_str()
    );

    let response = request()
        .path(&format!("/experiences/id/{}", id))
        .reply(&api)
        .await;
    let created = body(&response);
    assert_eq!(created["price"], json!(49.99));
    assert_eq!(created["maxPeople"], json!(8));
    assert_eq!(created["enabled"], json!(true));

    let snapshot = read_snapshot(&fixture.snapshot_path());
    assert_eq!(ids(&snapshot), vec!["a".to_owned(), "b".to_owned(), "c".to_owned(), id]);
}

#[tokio::test]
async fn invalid_creation() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let duplicate = json!({
        "id": "a",
        "translations": { "en": { "title": "A" }, "it": { "title": "A" } }
    });

    let response = request()
        .method("POST")
        .path("/experiences")
        .json(&duplicate)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body(&response)["id"], "a");

    let response = request()
        .method("POST")
        .path("/experiences")
        .body("{ not json")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = request().path("/experiences").reply(&api).await;
    assert_eq!(ids(&body(&response)), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn updates() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let mut experience = body(&request().path("/experiences/id/a").reply(&api).await);
    experience["price"] = json!("42");
    experience["images"] = json!([]);

    let response = request()
        .method("PUT")
        .path("/experiences/id/a")
        .json(&experience)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(&response);
    assert_eq!(updated["price"], json!(42.0));
    assert_eq!(updated["images"], json!([]));

    let response = request()
        .method("PUT")
        .path("/experiences/id/b")
        .json(&experience)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    experience["id"] = json!("missing");
    let response = request()
        .method("PUT")
        .path("/experiences/id/missing")
        .json(&experience)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggling_and_deleting() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request()
        .method("POST")
        .path("/experiences/id/b/toggle")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "id": "b", "enabled": true }));

    let response = request().path("/experiences/public").reply(&api).await;
    assert_eq!(ids(&body(&response)), vec!["a", "b", "c"]);

    let response = request()
        .method("POST")
        .path("/experiences/id/missing/toggle")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = request()
        .method("DELETE")
        .path("/experiences/id/c")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = request()
        .method("DELETE")
        .path("/experiences/id/c")
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(ids(&read_snapshot(&fixture.snapshot_path())), vec!["a", "b"]);
}

#[tokio::test]
async fn reviews() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request()
        .method("POST")
        .path("/experiences/id/a/reviews")
        .json(&json!({ "name": "Anna", "rating": "4", "comment": "Bellissimo" }))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let review = body(&response);
    assert_eq!(review["rating"], 4);
    let review_id = review["id"].as_str().expect("review ID").to_owned();

    let experience = body(&request().path("/experiences/id/a").reply(&api).await);
    assert_eq!(experience["reviews"][0]["id"], review_id.as_str());

    let response = request()
        .method("POST")
        .path("/experiences/id/a/reviews")
        .json(&json!({ "name": "Anna", "rating": 9, "comment": "Troppo" }))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = request()
        .method("POST")
        .path("/experiences/id/missing/reviews")
        .json(&json!({ "name": "Anna", "rating": 5, "comment": "Bello" }))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = request()
        .method("DELETE")
        .path(&format!("/experiences/id/a/reviews/{}", review_id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = request()
        .method("DELETE")
        .path(&format!("/experiences/id/a/reviews/{}", review_id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_and_import() {
    let fixture = Fixture::new();
    let api = fixture.api();

    let response = request().path("/experiences/export").reply(&api).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"experiences.json\""
    );
    let exported = response.body().clone();
    assert_eq!(ids(&serde_json::from_slice(&exported).unwrap()), vec!["a", "b", "c"]);

    let response = request()
        .method("POST")
        .path("/experiences/import")
        .body(r#"[{"id":"z","translations":{"en":{"title":"Z"}}}]"#)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response)["message"]
        .as_str()
        .unwrap()
        .starts_with("Malformed import"));

    let response = request().path("/experiences").reply(&api).await;
    assert_eq!(ids(&body(&response)), vec!["a", "b", "c"]);

    let response = request()
        .method("POST")
        .path("/experiences/import")
        .body(r#"[{"id":"z","translations":{"en":{"title":"Z"},"it":{"title":"Zeta"}}}]"#)
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "count": 1 }));

    let response = request().path("/experiences").reply(&api).await;
    assert_eq!(ids(&body(&response)), vec!["z"]);

    let response = request()
        .method("POST")
        .path("/experiences/import")
        .body(exported)
        .reply(&api)
        .await;
    assert_eq!(body(&response), json!({ "count": 3 }));
    assert_eq!(ids(&read_snapshot(&fixture.snapshot_path())), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn health_check() {
    let fixture = Fixture::new();
    let healthz = routes::admin::make_healthz_route(fixture.environment.clone());

    let response = request().path("/healthz").reply(&healthz).await;
    assert_eq!(response.status(), StatusCode::OK);

    let health = body(&response);
    assert_eq!(health["version"], info::VERSION);
    assert_eq!(health["mode"], "json");
    assert_eq!(health["sources"], json!(["local", "seed-file"]));
}

#[tokio::test]
async fn mutations_notify_subscribers() {
    let fixture = Fixture::new();
    let api = fixture.api();
    let mut subscription = fixture.environment.catalog.subscribe();

    request()
        .method("POST")
        .path("/experiences/id/a/toggle")
        .reply(&api)
        .await;
    request()
        .method("DELETE")
        .path("/experiences/id/b")
        .reply(&api)
        .await;

    assert_eq!(subscription.drain(), 2);
}
