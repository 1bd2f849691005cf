use anyhow::{Context, Result};
use axum::http::StatusCode;
use diesel::RunQueryDsl;
use serde_json::{Value, json};

mod common;

use common::{TestApp, long_content};

async fn publish(app: &TestApp, token: &str, title: &str, extra: Value) -> Result<String> {
    let mut body = json!({
        "title": title,
        "content": long_content(title),
        "published": true,
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    let created = app.create_news(token, body).await;
    let id = created["id"].as_str().context("created item has no id")?;
    Ok(id.to_string())
}

fn titles(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_empty_listing() {
    let app = TestApp::new();
    let page = app.server.get("/api/v1/news").await.json::<Value>();

    assert_eq!(page["data"], json!([]));
    assert_eq!(
        page["pagination"],
        json!({ "page": 1, "limit": 10, "total": 0, "totalPages": 0 })
    );
}

#[tokio::test]
async fn test_featured_items_lead_the_listing() -> Result<()> {
    let app = TestApp::new();
    let token = app.admin();

    publish(&app, token, "First plain", json!({})).await?;
    publish(&app, token, "Featured", json!({ "featured": true })).await?;
    publish(&app, token, "Second plain", json!({})).await?;

    let page = app.server.get("/api/v1/news").await.json::<Value>();
    assert_eq!(
        titles(&page),
        vec!["Featured", "Second plain", "First plain"]
    );

    let recent = app.server.get("/api/v1/news/recent").await.json::<Value>();
    let recent_titles: Vec<&str> = recent
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(recent_titles, vec!["Second plain", "Featured", "First plain"]);

    let featured = app
        .server
        .get("/api/v1/news/featured")
        .await
        .json::<Value>();
    assert_eq!(featured.as_array().unwrap().len(), 1);
    assert_eq!(featured[0]["title"], "Featured");
    Ok(())
}

#[tokio::test]
async fn test_pagination_splits_results() -> Result<()> {
    let app = TestApp::new();
    let token = app.admin();
    for n in 0..5 {
        publish(&app, token, &format!("Item {n}"), json!({})).await?;
    }

    let second = app
        .server
        .get("/api/v1/news")
        .add_query_param("page", 2)
        .add_query_param("limit", 2)
        .await
        .json::<Value>();
    assert_eq!(titles(&second), vec!["Item 2", "Item 1"]);
    assert_eq!(
        second["pagination"],
        json!({ "page": 2, "limit": 2, "total": 5, "totalPages": 3 })
    );

    let past_end = app
        .server
        .get("/api/v1/news")
        .add_query_param("page", 9)
        .add_query_param("limit", 2)
        .await
        .json::<Value>();
    assert_eq!(past_end["data"], json!([]));
    assert_eq!(past_end["pagination"]["total"], 5);
    Ok(())
}

#[tokio::test]
async fn test_filters_combine() -> Result<()> {
    let app = TestApp::new();
    let token = app.admin();

    publish(
        &app,
        token,
        "Glycerin workshop",
        json!({ "category": "workshops", "tags": ["glycerin", "class"] }),
    )
    .await?;
    publish(
        &app,
        token,
        "Science fair win",
        json!({ "category": "achievements", "tags": ["fair"], "excerpt": "Gold for 100% olive" }),
    )
    .await?;
    publish(&app, token, "Open house", json!({ "category": "events" })).await?;

    let by_category = app
        .server
        .get("/api/v1/news")
        .add_query_param("category", "workshops")
        .await
        .json::<Value>();
    assert_eq!(titles(&by_category), vec!["Glycerin workshop"]);

    let by_tags = app
        .server
        .get("/api/v1/news")
        .add_query_param("tags", "fair,glycerin")
        .await
        .json::<Value>();
    assert_eq!(by_tags["pagination"]["total"], 2);

    // `%` is matched literally, not as a wildcard.
    let by_search = app
        .server
        .get("/api/v1/news")
        .add_query_param("search", "100%")
        .await
        .json::<Value>();
    assert_eq!(titles(&by_search), vec!["Science fair win"]);

    let nothing = app
        .server
        .get("/api/v1/news")
        .add_query_param("category", "events")
        .add_query_param("tags", "fair")
        .await
        .json::<Value>();
    assert_eq!(nothing["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn test_date_range_uses_publish_time() -> Result<()> {
    let app = TestApp::new();
    let token = app.admin();
    publish(&app, token, "Today", json!({})).await?;

    let future = app
        .server
        .get("/api/v1/news")
        .add_query_param("date_from", "2999-01-01T00:00:00Z")
        .await
        .json::<Value>();
    assert_eq!(future["pagination"]["total"], 0);

    let past = app
        .server
        .get("/api/v1/news")
        .add_query_param("date_from", "2000-01-01T00:00:00Z")
        .add_query_param("date_to", "2999-01-01T00:00:00Z")
        .await
        .json::<Value>();
    assert_eq!(past["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_query_parameters_are_400() {
    let app = TestApp::new();

    for (key, value) in [
        ("page", "0"),
        ("limit", "0"),
        ("limit", "many"),
        ("category", "sports"),
        ("date_to", "last week"),
        ("featured", "maybe"),
    ] {
        let response = app
            .server
            .get("/api/v1/news")
            .add_query_param(key, value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    app.server
        .get("/api/v1/news/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_lookup_by_id() -> Result<()> {
    let app = TestApp::new();
    let token = app.admin();
    let id = publish(&app, token, "Visible", json!({})).await?;

    let item = app
        .server
        .get(&format!("/api/v1/news/{id}"))
        .await
        .json::<Value>();
    assert_eq!(item["title"], "Visible");
    assert_eq!(item["category"], "general");
    assert_eq!(item["tags"], json!([]));

    app.server
        .get(&format!("/api/v1/news/{}", uuid::Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_outdated_schema_is_503() -> Result<()> {
    let app = TestApp::new();
    {
        let mut conn = app.db.lock().unwrap();
        diesel::sql_query("ALTER TABLE news DROP COLUMN image_url").execute(&mut *conn)?;
    }

    let response = app.server.get("/api/v1/news").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["code"], "schema_out_of_date");
    Ok(())
}

#[tokio::test]
async fn test_profile_read_update_and_sign_out() {
    let app = TestApp::new();
    let user_id = app.user_with_role("reader-token", "member");

    app.server
        .get("/api/v1/profile")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let profile = app
        .server
        .get("/api/v1/profile")
        .authorization_bearer("reader-token")
        .await
        .json::<Value>();
    assert_eq!(profile["id"], user_id.to_string());
    assert_eq!(profile["role"], "member");

    let updated = app
        .server
        .put("/api/v1/profile")
        .authorization_bearer("reader-token")
        .json(&json!({
            "full_name": "  Ada Saponin ",
            "avatar_url": "https://cdn.soaplab.test/ada.png",
        }))
        .await
        .json::<Value>();
    assert_eq!(updated["full_name"], "Ada Saponin");

    // The cached copy was invalidated, so the new name is visible.
    let reread = app
        .server
        .get("/api/v1/profile")
        .authorization_bearer("reader-token")
        .await
        .json::<Value>();
    assert_eq!(reread["full_name"], "Ada Saponin");

    app.server
        .put("/api/v1/profile")
        .authorization_bearer("reader-token")
        .json(&json!({ "avatar_url": "javascript:alert(1)" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/session/signout")
        .authorization_bearer("reader-token")
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_profile_without_record_is_profile_missing() {
    let app = TestApp::new();
    app.signed_in_without_profile("new-user");

    let response = app
        .server
        .get("/api/v1/profile")
        .authorization_bearer("new-user")
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["code"], "profile_missing");
}
