//! End-to-end dispatch through the async client over a scripted transport.

mod common;

use common::{client, FakeTransport, Reply};
use futures::StreamExt;
use spacetrack::schema::{greater_than, PredicateType};
use spacetrack::{Error, FilePart, Query, RateLimitCallback, TypedValue};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[tokio::test]
async fn unexpected_predicate_sends_no_query() {
    let fake = FakeTransport::new();
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("gp").predicate("onion", "layers"))
        .await
        .err()
        .unwrap();

    assert!(matches!(
        &err,
        Error::UnexpectedPredicate { class, predicate } if class == "gp" && predicate == "onion"
    ));
    assert_eq!(err.to_string(), "'gp' got an unexpected argument 'onion'");
    assert_eq!(fake.count("/modeldef/class/gp"), 1);
    assert_eq!(fake.count("/query/"), 0);
}

#[tokio::test]
async fn offline_class_validates_without_any_request() {
    let fake = FakeTransport::new();
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("dirs").predicate("bogus", 1))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::UnexpectedPredicate { .. }));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn offline_class_skips_schema_fetch() {
    let fake = FakeTransport::new();
    fake.route("/query/class/dirs", [Reply::ok(r#"["/", "/docs"]"#)]);
    let client = client(&fake);

    let json = client
        .generic_request(Query::new("dirs"))
        .await
        .unwrap()
        .into_json()
        .unwrap();

    assert_eq!(json, serde_json::json!(["/", "/docs"]));
    assert_eq!(
        fake.paths(),
        vec!["/ajaxauth/login", "/publicfiles/query/class/dirs"]
    );
}

#[tokio::test]
async fn predicates_render_into_path_segments() {
    let fake = FakeTransport::new();
    fake.route("/query/class/gp", [Reply::ok("1 25544U\n2 25544\n")]);
    let client = client(&fake);

    let text = client
        .generic_request(
            Query::new("gp")
                .predicate("norad_cat_id", [25544, 41335])
                .predicate("epoch", greater_than("now-30"))
                .predicate("orderby", "epoch desc")
                .predicate("format", "tle"),
        )
        .await
        .unwrap()
        .into_text()
        .unwrap();

    assert_eq!(text, "1 25544U\n2 25544\n");
    let last = fake.requests().pop().unwrap();
    assert_eq!(
        last.url.path(),
        "/basicspacedata/query/class/gp/norad_cat_id/25544,41335/epoch/%3Enow-30/orderby/epoch%20desc/format/tle"
    );
}

#[tokio::test(start_paused = true)]
async fn rate_violation_backs_off_and_retries_once() {
    let fake = FakeTransport::new();
    fake.route(
        "/query/class/satcat",
        [Reply::rate_violation(), Reply::ok(r#"[{"NORAD_CAT_ID": "25544"}]"#)],
    );
    let client = client(&fake);

    let notified: Arc<Mutex<Vec<SystemTime>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = notified.clone();
    let callback: RateLimitCallback = Arc::new(move |at| sink.lock().unwrap().push(at));
    client.set_callback(Some(callback));

    let started = tokio::time::Instant::now();
    let json = client
        .generic_request(Query::new("satcat"))
        .await
        .unwrap()
        .into_json()
        .unwrap();

    assert_eq!(json[0]["NORAD_CAT_ID"], "25544");
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(notified.lock().unwrap().len(), 1);
    assert_eq!(fake.count("/query/class/satcat"), 2);
}

#[tokio::test(start_paused = true)]
async fn second_rate_violation_is_a_request_failure() {
    let fake = FakeTransport::new();
    fake.route("/query/class/satcat", [Reply::rate_violation()]);
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("satcat"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::RequestFailed { status: 500, .. }));
    assert_eq!(fake.count("/query/class/satcat"), 2);
}

#[tokio::test]
async fn failed_request_carries_server_message() {
    let fake = FakeTransport::new();
    fake.route(
        "/query/class/decay",
        [Reply::status(400, r#"{"error": "invalid orderby field"}"#)],
    );
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("decay"))
        .await
        .err()
        .unwrap();

    match err {
        Error::RequestFailed { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid orderby field");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn iter_lines_joins_lines_across_chunks() {
    let fake = FakeTransport::new();
    fake.route(
        "/query/class/gp",
        [Reply::chunked([
            "ISS (ZARYA)\r\n1 25544U 98067A ",
            "  24001.5\r",
            "\n2 25544  51.64\r\n",
        ])],
    );
    let client = client(&fake);

    let lines: Vec<String> = client
        .generic_request(Query::new("gp").predicate("format", "3le").iter_lines())
        .await
        .unwrap()
        .into_lines()
        .unwrap()
        .map(|line| line.unwrap())
        .collect()
        .await;

    assert_eq!(
        lines,
        vec!["ISS (ZARYA)", "1 25544U 98067A   24001.5", "2 25544  51.64"]
    );
    assert!(fake.requests().last().unwrap().stream);
}

#[tokio::test]
async fn iter_content_on_binary_class_keeps_raw_bytes() {
    let fake = FakeTransport::new();
    fake.route(
        "/query/class/download",
        [Reply::chunked([&b"\x00\x01\r"[..], &b"\n\xff"[..]])],
    );
    let client = client(&fake);

    let chunks: Vec<bytes::Bytes> = client
        .generic_request(Query::new("download").predicate("file_id", 7).iter_content())
        .await
        .unwrap()
        .into_chunks()
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    assert_eq!(chunks.concat(), b"\x00\x01\r\n\xff".to_vec());
    assert_eq!(
        fake.paths().last().unwrap(),
        "/fileshare/query/class/download/file_id/7"
    );
}

#[tokio::test]
async fn iter_lines_on_binary_class_is_rejected_before_sending() {
    let fake = FakeTransport::new();
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("download").iter_lines())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::BinaryStream(_)));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn parse_types_converts_by_schema() {
    let fake = FakeTransport::new();
    fake.route(
        "/query/class/gp",
        [Reply::ok(
            r#"[{"NORAD_CAT_ID": "25544", "EPOCH": "2024-01-01T12:00:00", "OBJECT_NAME": "ISS (ZARYA)"}]"#,
        )],
    );
    let client = client(&fake);

    let rows = client
        .generic_request(Query::new("gp").parse_types())
        .await
        .unwrap()
        .into_typed()
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["NORAD_CAT_ID"], TypedValue::Int(25544));
    assert!(matches!(rows[0]["EPOCH"], TypedValue::DateTime(_)));
    assert_eq!(
        rows[0]["OBJECT_NAME"],
        TypedValue::Text("ISS (ZARYA)".into())
    );
}

#[tokio::test]
async fn parse_types_with_format_is_invalid() {
    let fake = FakeTransport::new();
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("gp").predicate("format", "json").parse_types())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::InvalidOptions(_)));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn failed_login_sends_nothing_else() {
    let fake = FakeTransport::new();
    fake.route("/ajaxauth/login", [Reply::ok(r#"{"Login": "Failed"}"#)]);
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("gp"))
        .await
        .err()
        .unwrap();

    assert!(matches!(
        &err,
        Error::Authentication { identity } if identity == "user@example.com"
    ));
    assert_eq!(fake.paths(), vec!["/ajaxauth/login"]);
}

#[tokio::test]
async fn concurrent_requests_share_one_login() {
    let fake = FakeTransport::new();
    fake.route("/query/class/satcat", [Reply::ok("[]")]);
    let client = client(&fake);

    let results = futures::future::join_all(
        (0..5).map(|_| client.generic_request(Query::new("satcat"))),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(fake.count("/ajaxauth/login"), 1);
    assert_eq!(fake.count("/query/class/satcat"), 5);
}

#[tokio::test]
async fn schema_failure_is_not_cached() {
    let fake = FakeTransport::new();
    fake.route(
        "/modeldef/class/gp",
        [
            Reply::status(503, "maintenance"),
            Reply::modeldef(&[("NORAD_CAT_ID", "int(10) unsigned")]),
        ],
    );
    fake.route("/query/class/gp", [Reply::ok("[]")]);
    let client = client(&fake);

    let err = client
        .generic_request(Query::new("gp"))
        .await
        .err()
        .unwrap();
    match err {
        Error::SchemaUnavailable { controller, class, source } => {
            assert_eq!(controller, "basicspacedata");
            assert_eq!(class, "gp");
            assert!(matches!(*source, Error::RequestFailed { status: 503, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(client.generic_request(Query::new("gp")).await.is_ok());
    assert!(client.generic_request(Query::new("gp")).await.is_ok());
    assert_eq!(fake.count("/modeldef/class/gp"), 2);
    assert_eq!(client.schema_cache_stats().fetches, 1);
}

#[tokio::test]
async fn enum_predicate_lists_its_values() {
    let fake = FakeTransport::new();
    fake.route(
        "/modeldef/class/satcat",
        [Reply::modeldef(&[
            ("INTLDES", "char(12)"),
            (
                "OBJECT_TYPE",
                "enum('PAYLOAD','ROCKET BODY','DEBRIS','UNKNOWN','OTHER')",
            ),
        ])],
    );
    let client = client(&fake);

    let predicates = client.get_predicates("satcat", None).await.unwrap();
    let object_type = predicates
        .iter()
        .find(|p| p.name == "object_type")
        .unwrap();
    assert_eq!(object_type.ty, PredicateType::Enum);
    assert_eq!(object_type.values.as_ref().map(Vec::len), Some(5));

    let again = client.get_predicates("satcat", None).await.unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(fake.count("/modeldef/class/satcat"), 1);
}

#[tokio::test]
async fn classes_resolve_in_controller_priority_order() {
    let fake = FakeTransport::new();
    fake.route("/query/class/file", [Reply::ok("[]")]);
    let client = client(&fake);

    client.generic_request(Query::new("file")).await.unwrap();
    assert!(fake
        .paths()
        .last()
        .unwrap()
        .starts_with("/fileshare/query/class/file"));

    let spephemeris = client.controller("spephemeris").unwrap();
    spephemeris.request(spephemeris.query("file")).await.unwrap();
    assert!(fake
        .paths()
        .last()
        .unwrap()
        .starts_with("/spephemeris/query/class/file"));

    assert!(matches!(
        client.controller("nonsense").err().unwrap(),
        Error::UnknownController { .. }
    ));
    assert!(matches!(
        client.generic_request(Query::new("nonsense")).await.err().unwrap(),
        Error::AmbiguousOrUnknownRequestClass { .. }
    ));
}

#[tokio::test]
async fn param_fields_go_to_the_query_string() {
    let fake = FakeTransport::new();
    fake.route("/query/class/download", [Reply::ok("zip bytes")]);
    let client = client(&fake);

    let bytes = client
        .generic_request(
            Query::new("download")
                .controller("publicfiles")
                .predicate("name", "catalog.zip"),
        )
        .await
        .unwrap()
        .into_bytes()
        .unwrap();

    assert_eq!(&bytes[..], b"zip bytes");
    let last = fake.requests().pop().unwrap();
    assert_eq!(last.url.path(), "/publicfiles/query/class/download");
    assert_eq!(last.query, vec![("name".to_string(), "catalog.zip".to_string())]);
}

#[tokio::test]
async fn upload_posts_the_attached_file() {
    let fake = FakeTransport::new();
    fake.route("/query/class/upload", [Reply::ok(r#"{"uploaded": true}"#)]);
    let client = client(&fake);

    let missing = client
        .generic_request(Query::new("upload").predicate("folder_id", 100))
        .await
        .err()
        .unwrap();
    assert!(matches!(missing, Error::MissingPredicate { .. }));

    client
        .generic_request(
            Query::new("upload")
                .predicate("folder_id", 100)
                .file(FilePart::new("notes.txt", "hello")),
        )
        .await
        .unwrap();

    let last = fake.requests().pop().unwrap();
    assert_eq!(last.method, reqwest::Method::POST);
    assert_eq!(last.file.unwrap().file_name, "notes.txt");
}

#[tokio::test]
async fn session_token_skips_login() {
    let fake = FakeTransport::new();
    fake.route("/query/class/satcat", [Reply::ok("[]")]);
    let client = common::builder()
        .session_token("cookie-value")
        .transport(fake.clone())
        .build()
        .unwrap();

    client.generic_request(Query::new("satcat")).await.unwrap();
    assert_eq!(fake.count("/ajaxauth/login"), 0);
}

#[tokio::test]
async fn close_logs_out_an_active_session() {
    let fake = FakeTransport::new();
    fake.route("/query/class/satcat", [Reply::ok("[]")]);
    let client = client(&fake);

    client.generic_request(Query::new("satcat")).await.unwrap();
    client.close().await.unwrap();

    assert_eq!(fake.paths().last().unwrap(), "/ajaxauth/logout");
    assert_eq!(fake.count("/ajaxauth/logout"), 1);
}

#[tokio::test]
async fn close_without_login_sends_nothing() {
    let fake = FakeTransport::new();
    let client = client(&fake);
    client.close().await.unwrap();
    assert!(fake.requests().is_empty());
}
