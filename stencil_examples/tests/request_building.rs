mod common;
use common::*;

use core::time::Duration;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderValue, Method};
use stencil_core::prelude::*;
use stencil_test_support::*;

#[tokio::test]
async fn sends_to_configured_host_with_template_query() {
    let (c, h) = client(vec![MockReply::ok_text("ok")]);
    let resp = c
        .get("/apis/v1/messages/{message}?Action=GetMessage&Version=2020-01-01")
        .param("message", "m-1")
        .await
        .unwrap();
    assert_eq!(resp.body.as_ref(), b"ok");

    let req = h.single();
    assert_request(&req)
        .method(Method::GET)
        .host(HOST)
        .path("/apis/v1/messages/m-1")
        .query_keys_exact(&["Action", "Version"])
        .query_has("Action", "GetMessage")
        .query_has("Version", "2020-01-01")
        .operation("/apis/v1/messages/{message}?Action=GetMessage&Version=2020-01-01")
        .body_absent();
    assert_eq!(req.url.scheme(), "https");
}

#[tokio::test]
async fn path_values_are_encoded_as_one_segment() {
    let (c, h) = client(vec![MockReply::ok_text("")]);
    c.get("/files/{name}").param("name", "a/b c?.txt").send().await.unwrap();
    assert_request(&h.single()).raw_target("/files/a%2Fb%20c%3F.txt");
}

#[tokio::test]
async fn replace_merge_overrides_template_values() {
    let (c, h) = client(vec![MockReply::ok_text("")]);
    c.get("/s?Version=2020-01-01&tag=a")
        .query("Version", "2024-06-01")
        .query("page", 2)
        .send()
        .await
        .unwrap();
    assert_request(&h.single())
        .query_values("Version", &["2024-06-01"])
        .query_values("tag", &["a"])
        .query_values("page", &["2"]);
}

#[tokio::test]
async fn append_merge_keeps_template_values_first() {
    let config = ClientConfig::https(HOST).with_query_merge(QueryMerge::Append);
    let (c, h) = client_with(config, vec![MockReply::ok_text("")]);
    c.get("/s?tag=a").query("tag", "b").query("tag", "c").send().await.unwrap();
    assert_request(&h.single()).query_values("tag", &["a", "b", "c"]);
}

#[tokio::test]
async fn query_values_are_form_encoded() {
    let (c, h) = client(vec![MockReply::ok_text("")]);
    c.get("/search").query("q", "a b&c=d").send().await.unwrap();
    let req = h.single();
    assert_request(&req)
        .raw_target("/search?q=a+b%26c%3Dd")
        .query_values("q", &["a b&c=d"]);
}

#[tokio::test]
async fn default_headers_and_request_headers() {
    let config = ClientConfig::https(HOST)
        .with_header(USER_AGENT, HeaderValue::from_static("stencil-tests/1.0"))
        .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer default"));
    let (c, h) = client_with(config, vec![MockReply::ok_text("")]);
    c.get("/me")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer override"))
        .send()
        .await
        .unwrap();
    assert_request(&h.single())
        .header(USER_AGENT, "stencil-tests/1.0")
        .header(AUTHORIZATION, "Bearer override")
        .header_absent(ACCEPT);
}

#[tokio::test]
async fn typed_execution_sets_accept_and_content_type() {
    let (c, h) = client(vec![MockReply::ok_json(json_bytes(&serde_json::json!({"id": 7})))]);
    let v: serde_json::Value = c
        .post("/items")
        .json(&serde_json::json!({"name": "x"}))
        .execute::<Json, serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(v["id"], 7);
    assert_request(&h.single())
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .body(br#"{"name":"x"}"#);
}

#[tokio::test]
async fn timeout_layering() {
    let config = ClientConfig::https(HOST).with_timeout(Duration::from_secs(30));
    let (c, h) = client_with(
        config,
        vec![MockReply::ok_text(""), MockReply::ok_text(""), MockReply::ok_text("")],
    );
    c.get("/a").send().await.unwrap();
    c.get("/a").timeout(Duration::from_secs(2)).send().await.unwrap();
    c.get("/a").clear_timeout().send().await.unwrap();

    let reqs = h.recorded();
    assert_request(&reqs[0]).timeout(Some(Duration::from_secs(30)));
    assert_request(&reqs[1]).timeout(Some(Duration::from_secs(2)));
    assert_request(&reqs[2]).timeout(None);
}

#[tokio::test]
async fn resolution_errors_never_reach_the_transport() {
    let (c, h) = client(vec![]);
    let err = c.get("/m/{id}").operation("GetM").send().await.unwrap_err();
    let res = err.resolution().unwrap();
    assert_eq!(res.kind().missing_parameter(), Some("id"));

    let err = c.get("/m/{id").send().await.unwrap_err();
    assert!(err.resolution().unwrap().kind().is_malformed_template());
    h.assert_recorded_len(0);
}

#[tokio::test]
async fn template_cache_is_reused_across_requests() {
    let (c, h) = client(vec![MockReply::ok_text(""), MockReply::ok_text("")]);
    let t = "/apis/v1/messages/{message}";
    c.get(t).param("message", 1).send().await.unwrap();
    c.get(t).param("message", 2).send().await.unwrap();

    let stats = c.cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!((stats.hits, stats.misses), (1, 1));

    let reqs = h.recorded();
    assert_request(&reqs[0]).path("/apis/v1/messages/1");
    assert_request(&reqs[1]).path("/apis/v1/messages/2");
}

#[tokio::test]
async fn dot_segment_params_are_refused_before_sending() {
    let (c, h) = client(vec![MockReply::ok_text("")]);
    for v in ["..", "."] {
        let err = c.get("/users/{id}/files").param("id", v).send().await.unwrap_err();
        assert_eq!(err.resolution().unwrap().kind().invalid_parameter(), Some("id"));
    }
    h.assert_recorded_len(0);

    c.get("/users/{id}/files").param("id", "%2E%2E").send().await.unwrap();
    assert_request(&h.single()).raw_target("/users/%252E%252E/files");
}
