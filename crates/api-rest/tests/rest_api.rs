//! End-to-end tests of the REST router against an in-memory store.

use std::sync::Arc;

use api_rest::{router, AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use physihome_core::{CoreConfig, Environment, LogMailer};
use physihome_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const PASSWORD: &str = "Str0ng!pass";

fn app() -> Router {
    let cfg = CoreConfig::new(
        Environment::Test,
        "test-secret".into(),
        vec!["admin@physihome.test".into()],
    )
    .unwrap()
    .with_session("sid".into(), 60)
    .unwrap();
    router(AppState::new(
        Arc::new(cfg),
        Arc::new(MemoryStore::new()),
        Arc::new(LogMailer),
    ))
}

struct Reply {
    status: StatusCode,
    body: Value,
    cookie: Option<String>,
}

async fn call(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(String::from);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply {
        status,
        body,
        cookie,
    }
}

fn account(first: &str, email: &str, phone: &str) -> Value {
    json!({
        "first_name": first,
        "last_name": "Test",
        "dob": "01-02-1990",
        "phone": phone,
        "email": email,
        "password": PASSWORD,
    })
}

/// Signs up and confirms the OTP, returning the session cookie and the user id.
async fn signed_in(app: &Router, path: &str, body: Value) -> (String, String) {
    let email = body["email"].as_str().unwrap().to_string();
    let challenge = call(app, Method::POST, path, None, Some(body)).await;
    assert_eq!(challenge.status, StatusCode::OK, "{}", challenge.body);
    let otp = challenge.body["otp_debug"]
        .as_str()
        .expect("otp is surfaced when mail is not configured")
        .to_string();

    let verified = call(
        app,
        Method::POST,
        "/api/auth/verify-otp",
        None,
        Some(json!({ "email": email, "otp": otp })),
    )
    .await;
    assert_eq!(verified.status, StatusCode::OK, "{}", verified.body);
    let id = verified.body["user"]["id"].as_str().unwrap().to_string();
    (verified.cookie.expect("session cookie"), id)
}

fn doctor(first: &str, email: &str, phone: &str) -> Value {
    let mut body = account(first, email, phone);
    body["specialization"] = json!("Physiotherapy");
    body["license"] = json!("LIC-1");
    body["city"] = json!("Pune");
    body["preferred_pin"] = json!("411001");
    body
}

#[tokio::test]
async fn health_reports_alive() {
    let app = app();
    let reply = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["ok"], json!(true));
}

#[tokio::test]
async fn messaging_requires_a_session() {
    let app = app();
    let reply = call(&app, Method::GET, "/api/messages/threads", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = call(&app, Method::GET, "/api/profile", Some("sid=forged.token"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let uri = format!("/api/messages/threads/{}?since=yesterday", "0".repeat(32));
    let reply = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_login_lands_on_profile() {
    let app = app();
    let (cookie, _) = signed_in(&app, "/api/auth/signup", account("Pat", "pat@x.com", "9000000001")).await;

    let profile = call(&app, Method::GET, "/api/profile", Some(&cookie), None).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["email"], json!("pat@x.com"));
    assert_eq!(profile.body["role"], json!("patient"));

    let bad = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "pat@x.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.body["error"], json!("Invalid email or password"));

    let good = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "PAT@x.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(good.status, StatusCode::OK);
    assert_eq!(good.body["landing"], json!("/profile"));
    assert!(good.cookie.is_some());
}

#[tokio::test]
async fn patient_messages_an_approved_doctor() {
    let app = app();
    let (admin, _) = signed_in(
        &app,
        "/api/auth/signup",
        account("Ada", "admin@physihome.test", "9000000000"),
    )
    .await;
    let (patient, _) = signed_in(&app, "/api/auth/signup", account("Pat", "pat@x.com", "9000000001")).await;
    let (doc, doc_id) = signed_in(
        &app,
        "/api/auth/doctor-signup",
        doctor("Dee", "dee@x.com", "9000000002"),
    )
    .await;

    // Unverified doctors are not listed.
    let listed = call(&app, Method::GET, "/api/doctors?city=Pune", None, None).await;
    assert_eq!(listed.body["doctors"], json!([]));

    let approve = call(
        &app,
        Method::POST,
        "/api/auth/admin/approve-doctor",
        Some(&admin),
        Some(json!({ "user_id": doc_id })),
    )
    .await;
    assert_eq!(approve.status, StatusCode::OK, "{}", approve.body);
    assert_eq!(approve.body["status"], json!("approved"));

    let listed = call(&app, Method::GET, "/api/doctors?pin=411005", None, None).await;
    assert_eq!(listed.body["doctors"][0]["display_name"], json!("Dr. Dee Test"));

    let started = call(
        &app,
        Method::POST,
        "/api/messages/start",
        Some(&patient),
        Some(json!({ "user_id": doc_id })),
    )
    .await;
    assert_eq!(started.status, StatusCode::OK, "{}", started.body);
    assert_eq!(started.body["redirected"], json!(false));
    let thread = started.body["conversation_id"].as_str().unwrap().to_string();
    let thread_uri = format!("/api/messages/threads/{}", thread);

    let sent = call(
        &app,
        Method::POST,
        &thread_uri,
        Some(&patient),
        Some(json!({ "body": "Knee hurts after running" })),
    )
    .await;
    assert_eq!(sent.status, StatusCode::OK, "{}", sent.body);
    assert_eq!(sent.body["is_mine"], json!(true));

    let inbox = call(&app, Method::GET, "/api/messages/threads", Some(&doc), None).await;
    let first = &inbox.body["threads"][0];
    assert_eq!(first["id"], json!(thread));
    assert_eq!(first["unread_count"], json!(1));
    assert_eq!(first["last_message"]["body"], json!("Knee hurts after running"));

    let history = call(&app, Method::GET, &thread_uri, Some(&doc), None).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body["messages"][0]["is_mine"], json!(false));

    let inbox = call(&app, Method::GET, "/api/messages/threads", Some(&doc), None).await;
    assert_eq!(inbox.body["threads"][0]["unread_count"], json!(0));

    let empty = call(
        &app,
        Method::POST,
        &thread_uri,
        Some(&patient),
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    // Once rejected, the doctor is held to the admin thread.
    let reject = call(
        &app,
        Method::POST,
        "/api/auth/admin/reject-doctor",
        Some(&admin),
        Some(json!({ "user_id": doc_id })),
    )
    .await;
    assert_eq!(reject.body["status"], json!("rejected"));

    let denied = call(
        &app,
        Method::POST,
        &thread_uri,
        Some(&doc),
        Some(json!({ "body": "hello?" })),
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(
        denied.body["error"],
        json!("Please wait for admin to verify your account")
    );
}

#[tokio::test]
async fn pending_doctor_is_sent_to_the_admin_thread() {
    let app = app();
    signed_in(
        &app,
        "/api/auth/signup",
        account("Ada", "admin@physihome.test", "9000000000"),
    )
    .await;
    let (_, patient_id) = signed_in(&app, "/api/auth/signup", account("Pat", "pat@x.com", "9000000001")).await;
    let (doc, _) = signed_in(
        &app,
        "/api/auth/doctor-signup",
        doctor("Dee", "dee@x.com", "9000000002"),
    )
    .await;

    let started = call(
        &app,
        Method::POST,
        "/api/messages/start",
        Some(&doc),
        Some(json!({ "user_id": patient_id })),
    )
    .await;
    assert_eq!(started.status, StatusCode::OK, "{}", started.body);
    assert_eq!(started.body["redirected"], json!(true));

    let admin_thread = call(&app, Method::POST, "/api/messages/admin", Some(&doc), None).await;
    assert_eq!(admin_thread.body["conversation_id"], started.body["conversation_id"]);
}

#[tokio::test]
async fn unknown_threads_and_bad_input_are_reported() {
    let app = app();
    let (cookie, _) = signed_in(&app, "/api/auth/signup", account("Pat", "pat@x.com", "9000000001")).await;

    let missing = call(&app, Method::GET, "/api/messages/threads/not-an-id", Some(&cookie), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], json!("Conversation not found"));

    let bad_since = call(
        &app,
        Method::GET,
        "/api/messages/threads/not-an-id?since=yesterday",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(bad_since.status, StatusCode::BAD_REQUEST);

    let weak = call(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "first_name": "W",
            "last_name": "Eak",
            "dob": "1990-01-01",
            "phone": "9000000009",
            "email": "weak@x.com",
            "password": "short",
        })),
    )
    .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let logout = call(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.cookie.as_deref(), Some("sid="));
}

const BOUNDARY: &str = "physihome-boundary";

/// Posts `parts` as `multipart/form-data`, each `(field, filename, contents)`.
async fn upload(app: &Router, cookie: &str, parts: &[(&str, &str, &str)]) -> Reply {
    let mut body = Vec::new();
    for (field, filename, contents) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/doctor/update-documents")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        cookie: None,
    }
}

#[tokio::test]
async fn new_degree_upload_restricts_a_verified_doctor() {
    let app = app();
    let (admin, _) = signed_in(
        &app,
        "/api/auth/signup",
        account("Ada", "admin@physihome.test", "9000000000"),
    )
    .await;
    let (patient, patient_id) =
        signed_in(&app, "/api/auth/signup", account("Pat", "pat@x.com", "9000000001")).await;
    let (doc, doc_id) = signed_in(
        &app,
        "/api/auth/doctor-signup",
        doctor("Dee", "dee@x.com", "9000000002"),
    )
    .await;
    let approve = call(
        &app,
        Method::POST,
        "/api/auth/admin/approve-doctor",
        Some(&admin),
        Some(json!({ "user_id": doc_id })),
    )
    .await;
    assert_eq!(approve.status, StatusCode::OK, "{}", approve.body);

    let card = upload(
        &app,
        &doc,
        &[("visiting_card", "card.png", "card"), ("notes", "n.txt", "x")],
    )
    .await;
    assert_eq!(card.status, StatusCode::OK, "{}", card.body);
    assert_eq!(card.body["requires_reverification"], json!(false));
    assert_eq!(card.body["landing"], json!("/profile?documents_updated=1"));
    assert_eq!(card.body["documents"][0]["kind"], json!("visiting_card"));
    assert_eq!(card.body["documents"][0]["byte_len"], json!(4));

    let degree = upload(&app, &doc, &[("degree_photo", "degree.png", "degree")]).await;
    assert_eq!(degree.status, StatusCode::OK, "{}", degree.body);
    assert_eq!(degree.body["requires_reverification"], json!(true));
    assert_eq!(
        degree.body["landing"],
        json!("/profile?documents_updated=1&pending_verification=1&reverify_notice=1")
    );
    assert_eq!(degree.body["profile"]["doctor_verification_status"], json!("pending"));
    assert_eq!(degree.body["documents"].as_array().unwrap().len(), 2);

    // Back in review: hidden from the directory and sent to the admins instead of the patient.
    let listed = call(&app, Method::GET, "/api/doctors?city=Pune", None, None).await;
    assert_eq!(listed.body["doctors"], json!([]));
    let redirected = call(
        &app,
        Method::POST,
        "/api/messages/start",
        Some(&doc),
        Some(json!({ "user_id": patient_id })),
    )
    .await;
    assert_eq!(redirected.status, StatusCode::OK, "{}", redirected.body);
    assert_eq!(redirected.body["redirected"], json!(true));

    let empty = upload(&app, &doc, &[("degree_photo", "degree.png", "")]).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    let not_doctor = upload(&app, &patient, &[("degree_photo", "degree.png", "x")]).await;
    assert_eq!(not_doctor.status, StatusCode::FORBIDDEN);
}
