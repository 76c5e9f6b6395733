mod support_server;

use std::sync::Arc;
use std::time::{Duration, Instant};

use negfuzz_core::config::Config;
use negfuzz_core::context::GlobalContext;
use negfuzz_core::http::{HttpMethod, ServiceData};
use negfuzz_runner::{Caller, ServiceCaller};

use support_server::{Reply, always, closed_port_url, spawn_http_server};

fn caller_for(base_url: &str, tweak: impl FnOnce(&mut Config)) -> Result<ServiceCaller, String> {
    let mut config = Config {
        base_url: base_url.to_owned(),
        ..Config::default()
    };
    config.http.timeout_secs = 5;
    config.http.retries = 0;
    tweak(&mut config);
    ServiceCaller::new(&config, Arc::new(GlobalContext::new(10)))
        .map_err(|err| format!("caller init failed: {}", err))
}

#[test]
fn e2e_query_fields_reach_the_url() -> Result<(), String> {
    let (url, server) = spawn_http_server(always(200, "{}"))?;
    let caller = caller_for(&url, |_| {})?;
    let data = ServiceData::builder("/pets/{id}", HttpMethod::Get)
        .payload(r#"{"id":"1","limit":2,"no":null}"#)
        .query_params(["limit", "no"])
        .build();

    let exchange = caller.call(&data).map_err(|err| err.to_string())?;

    assert!(exchange.request.url.ends_with("/pets/1?limit=2"));
    assert_eq!(exchange.response.status_code, 200);
    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "GET");
    assert_eq!(received[0].target, "/pets/1?limit=2");
    assert!(received[0].body.is_empty());
    Ok(())
}

#[test]
fn e2e_body_and_headers_are_sent() -> Result<(), String> {
    let (url, server) = spawn_http_server(always(201, r#"{"id":"7"}"#))?;
    let caller = caller_for(&url, |_| {})?;
    let data = ServiceData::builder("/pets", HttpMethod::Post)
        .test_id("Test 12")
        .payload(r#"{"name":"rex"}"#)
        .header("X-Tenant", "acme")
        .build();

    let exchange = caller.call(&data).map_err(|err| err.to_string())?;

    assert_eq!(exchange.response.status_code, 201);
    assert_eq!(exchange.response.json_body["id"], "7");
    let received = server.received();
    assert_eq!(received[0].body, r#"{"name":"rex"}"#);
    assert_eq!(received[0].header("x-tenant"), Some("acme"));
    assert!(received[0].header("content-type").is_some_and(|v| v.starts_with("application/json")));
    Ok(())
}

#[test]
fn e2e_hangup_becomes_synthetic_response() -> Result<(), String> {
    let (url, _server) = spawn_http_server(|_| Reply::Hangup)?;
    let caller = caller_for(&url, |_| {})?;
    let data = ServiceData::builder("/pets", HttpMethod::Post)
        .payload("{}")
        .build();

    let exchange = caller.call(&data).map_err(|err| err.to_string())?;

    assert!((900..=999).contains(&exchange.response.status_code));
    assert!(!exchange.response.body.is_empty());
    assert!(exchange.response.is_synthetic());
    Ok(())
}

#[test]
fn e2e_refused_connection_becomes_synthetic_response() -> Result<(), String> {
    let url = closed_port_url()?;
    let caller = caller_for(&url, |_| {})?;
    let data = ServiceData::builder("/pets", HttpMethod::Get).build();

    let exchange = caller.call(&data).map_err(|err| err.to_string())?;

    assert!((900..=999).contains(&exchange.response.status_code));
    assert!(!exchange.response.body.is_empty());
    Ok(())
}

#[test]
fn e2e_rate_limit_spaces_requests() -> Result<(), String> {
    let (url, server) = spawn_http_server(always(200, "{}"))?;
    let caller = caller_for(&url, |config| {
        config.rate_limit_per_minute = Some(60);
        config.rate_limit_burst = 1;
    })?;
    let data = ServiceData::builder("/pets", HttpMethod::Get).build();

    let started = Instant::now();
    for _ in 0..3 {
        caller.call(&data).map_err(|err| err.to_string())?;
    }

    assert!(started.elapsed() >= Duration::from_millis(1900));
    assert_eq!(server.received().len(), 3);
    Ok(())
}

#[test]
fn e2e_delete_uses_id_from_stored_post() -> Result<(), String> {
    let (url, server) = spawn_http_server(|req| match req.method.as_str() {
        "POST" => Reply::Json(201, r#"{"id":"abc-1","name":"rex"}"#.to_owned()),
        _ => Reply::Json(204, String::new()),
    })?;
    let caller = caller_for(&url, |_| {})?;

    let post = ServiceData::builder("/items", HttpMethod::Post)
        .payload(r#"{"name":"rex"}"#)
        .build();
    caller.call(&post).map_err(|err| err.to_string())?;
    assert_eq!(caller.global().stored_posts("/items"), 1);

    let delete = ServiceData::builder("/items/{id}", HttpMethod::Delete)
        .payload(r#"{"id":"from-example"}"#)
        .build();
    let exchange = caller.call(&delete).map_err(|err| err.to_string())?;

    let received = server.received();
    assert_eq!(received[1].method, "DELETE");
    assert_eq!(received[1].target, "/items/abc-1");
    assert_eq!(caller.global().stored_posts("/items"), 0);
    let deletes = caller.global().drain_successful_deletes();
    assert!(deletes.contains(&exchange.request.url));
    Ok(())
}

#[test]
fn e2e_failed_post_is_not_stored() -> Result<(), String> {
    let (url, _server) = spawn_http_server(always(500, r#"{"error":"boom"}"#))?;
    let caller = caller_for(&url, |_| {})?;
    let post = ServiceData::builder("/items", HttpMethod::Post)
        .payload(r#"{"name":"rex"}"#)
        .build();

    caller.call(&post).map_err(|err| err.to_string())?;

    assert_eq!(caller.global().stored_posts("/items"), 0);
    Ok(())
}
