use actix_web::{
    cookie::Cookie,
    http::{header, StatusCode},
    test, web, App,
};
use serde_json::{json, Value};
use std::sync::Arc;

use zaintech::members::StaticMemberProvider;
use zaintech::models::Collection;
use zaintech::server;
use zaintech::templates::{load_templates, TemplateCache};
use zaintech::{EntityStore, MemoryStore, StoreStateManager};

fn state() -> Arc<StoreStateManager> {
    Arc::new(StoreStateManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StaticMemberProvider::new()),
    ))
}

fn templates() -> TemplateCache {
    load_templates(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).expect("templates load")
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .app_data(web::Data::new(templates()))
                .configure(server::routes),
        )
        .await
    };
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

macro_rules! admin_token {
    ($app:expr, $email:expr, $password:expr) => {{
        let login: Value = test::call_and_read_body_json(
            &$app,
            test::TestRequest::post()
                .uri("/api/admin/login")
                .set_json(json!({ "email": $email, "password": $password }))
                .to_request(),
        )
        .await;
        login["token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn anonymous_visitor_is_redirected_from_protected_pages() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/dashboard/bookings").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login?next=%2Fdashboard%2Fbookings");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/admin/bookings").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login?next=%2Fadmin%2Fbookings");

    // a stale cookie is no better than none
    let req = test::TestRequest::get()
        .uri("/dashboard")
        .cookie(Cookie::new("member_session", "stale"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_web::test]
async fn unknown_paths_redirect_home_and_public_pages_render() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/no/such/page").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/academy").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let health: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(health["status"], "ok");
}

#[actix_web::test]
async fn admin_api_requires_a_session() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/admin/stats").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::get()
        .uri("/api/admin/stats")
        .insert_header(bearer("made-up-token"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn public_catalogue_hides_unpublished_items() {
    let state = state();
    state.seed_admin("admin@example.com", "secret").await.unwrap();
    let app = app!(state);

    let login: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/admin/login")
            .set_json(json!({ "email": "admin@example.com", "password": "secret" }))
            .to_request(),
    )
    .await;
    let admin_token = login["token"].as_str().unwrap().to_string();

    for (name, published) in [("Rust Basics", true), ("Draft Course", false)] {
        let req = test::TestRequest::post()
            .uri("/api/admin/courses")
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "courseName": name, "isPublished": published }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let public: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/courses").to_request()).await;
    let names: Vec<&str> = public["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["courseName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rust Basics"]);

    let all: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/admin/courses")
            .insert_header(bearer(&admin_token))
            .to_request(),
    )
    .await;
    assert_eq!(all["courses"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn booking_lifecycle_with_single_owner() {
    let state = state();
    state.seed_admin("alice@example.com", "alice-pw").await.unwrap();
    state.seed_admin("bob@example.com", "bob-pw").await.unwrap();
    let app = app!(state);

    let admin_login = |email: &'static str, password: &'static str| {
        test::TestRequest::post()
            .uri("/api/admin/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request()
    };
    let alice: Value = test::call_and_read_body_json(&app, admin_login("alice@example.com", "alice-pw")).await;
    let alice = alice["token"].as_str().unwrap().to_string();
    let bob: Value = test::call_and_read_body_json(&app, admin_login("bob@example.com", "bob-pw")).await;
    let bob = bob["token"].as_str().unwrap().to_string();

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/admin/services")
            .insert_header(bearer(&alice))
            .set_json(json!({ "serviceName": "Security audit", "isAvailable": true, "price": 500.0 }))
            .to_request(),
    )
    .await;
    let service_id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/member/register")
        .set_json(json!({
            "email": "sara@example.com",
            "password": "member-pw",
            "firstName": "Sara",
            "lastName": "Khan",
            "phone": "+971 4 000 0000"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let login: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/member/login")
            .set_json(json!({ "email": "sara@example.com", "password": "member-pw" }))
            .to_request(),
    )
    .await;
    let member = login["token"].as_str().unwrap().to_string();

    let booked: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/member/bookings")
            .insert_header(bearer(&member))
            .set_json(json!({ "itemType": "service", "itemId": service_id }))
            .to_request(),
    )
    .await;
    let booking_id = booked["booking"]["_id"].as_str().unwrap().to_string();
    assert_eq!(booked["booking"]["status"], "pending");
    assert_eq!(booked["booking"]["statusLabel"], "Pending");
    assert_eq!(booked["booking"]["userContactPhone"], "+971 4 000 0000");

    let pending: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/admin/bookings?status=pending")
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert_eq!(pending["bookings"].as_array().unwrap().len(), 1);

    let started: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/bookings/{}/start", booking_id))
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert_eq!(started["booking"]["status"], "in progress");
    assert_eq!(started["booking"]["statusIcon"], "clock");

    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/bookings/{}/complete", booking_id))
        .insert_header(bearer(&bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let done: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/bookings/{}/complete", booking_id))
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert_eq!(done["booking"]["status"], "completed");
    assert_eq!(done["booking"]["statusLabel"], "Completed");

    let in_progress: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/admin/bookings?status=in%20progress")
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert!(in_progress["bookings"].as_array().unwrap().is_empty());

    let mine: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/member/bookings")
            .insert_header(bearer(&member))
            .to_request(),
    )
    .await;
    assert_eq!(mine["bookings"][0]["statusLabel"], "Completed");

    let dashboard: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/member/dashboard")
            .insert_header(bearer(&member))
            .to_request(),
    )
    .await;
    assert_eq!(dashboard["profile"]["fullName"], "Sara Khan");
    assert_eq!(dashboard["services"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn contact_form_rejects_invalid_email() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({ "name": "Omar", "email": "nope", "message": "Hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({ "name": "Omar", "email": "omar@example.com", "message": "Hello" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn unknown_blog_slug_is_not_found() {
    let state = state();
    zaintech::catalog::seed_blog_posts(state.store()).await.unwrap();
    let app = app!(state);

    let post: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/blog/future-of-ai").to_request(),
    )
    .await;
    assert_eq!(post["post"]["author"], "Zain Admin");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/blog/missing-post").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn malformed_stored_record_is_a_server_error() {
    let state = state();
    let record = json!({ "_id": "c1", "courseName": "Broken", "isPublished": "true" });
    state
        .store()
        .create(Collection::Courses, record.as_object().unwrap().clone())
        .await
        .unwrap();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/courses").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorMessage"], "Internal server error");
}

#[actix_web::test]
async fn member_settings_update_and_logout() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/member/register")
        .set_json(json!({ "email": "lina@example.com", "password": "member-pw", "firstName": "Lina" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let login: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/member/login")
            .set_json(json!({ "email": "lina@example.com", "password": "member-pw" }))
            .to_request(),
    )
    .await;
    let member = login["token"].as_str().unwrap().to_string();

    let updated: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/member/settings")
            .insert_header(bearer(&member))
            .set_json(json!({ "fullName": "Lina Haddad", "phoneNumber": "+971 55 123 4567", "languagePreference": "ar" }))
            .to_request(),
    )
    .await;
    assert_eq!(updated["success"], true);
    assert_eq!(updated["profile"]["fullName"], "Lina Haddad");

    let settings: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/member/settings")
            .insert_header(bearer(&member))
            .to_request(),
    )
    .await;
    assert_eq!(settings["profile"]["phoneNumber"], "+971 55 123 4567");
    assert_eq!(settings["profile"]["languagePreference"], "ar");

    let req = test::TestRequest::post()
        .uri("/api/member/logout")
        .insert_header(bearer(&member))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/member/settings")
        .insert_header(bearer(&member))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_updates_and_deletes_services_and_posts() {
    let state = state();
    state.seed_admin("admin@example.com", "secret").await.unwrap();
    let app = app!(state);
    let token = admin_token!(app, "admin@example.com", "secret");

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/admin/services")
            .insert_header(bearer(&token))
            .set_json(json!({ "serviceName": "Cloud setup", "isAvailable": false }))
            .to_request(),
    )
    .await;
    let service_id = created["id"].as_str().unwrap().to_string();

    let updated: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/services/{}", service_id))
            .insert_header(bearer(&token))
            .set_json(json!({ "isAvailable": true, "price": 250.0 }))
            .to_request(),
    )
    .await;
    assert_eq!(updated["success"], true);
    assert_eq!(updated["service"]["serviceName"], "Cloud setup");
    assert_eq!(updated["service"]["isAvailable"], true);

    let public: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/services").to_request()).await;
    assert_eq!(public["services"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/services/{}", service_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/services/{}", service_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/admin/blog")
            .insert_header(bearer(&token))
            .set_json(json!({ "title": "Launch", "slug": "launch", "isPublished": true }))
            .to_request(),
    )
    .await;
    let post_id = created["id"].as_str().unwrap().to_string();

    let renamed: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/blog/{}", post_id))
            .insert_header(bearer(&token))
            .set_json(json!({ "slug": "we-launched" }))
            .to_request(),
    )
    .await;
    assert_eq!(renamed["post"]["slug"], "we-launched");
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/blog/we-launched").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/blog/{}", post_id))
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/blog/we-launched").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_course_update_is_wrapped_in_an_envelope() {
    let state = state();
    state.seed_admin("admin@example.com", "secret").await.unwrap();
    let app = app!(state);
    let token = admin_token!(app, "admin@example.com", "secret");

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/admin/courses")
            .insert_header(bearer(&token))
            .set_json(json!({ "courseName": "Rust Basics" }))
            .to_request(),
    )
    .await;
    let course_id = created["id"].as_str().unwrap().to_string();

    let updated: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/courses/{}", course_id))
            .insert_header(bearer(&token))
            .set_json(json!({ "isPublished": true }))
            .to_request(),
    )
    .await;
    assert_eq!(updated["success"], true);
    assert_eq!(updated["course"]["courseName"], "Rust Basics");
    assert_eq!(updated["course"]["isPublished"], true);
}
