use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::{Matcher, Server};
use serde_json::json;

const RICK_QUERY: &str = r#"query Query ($name: String!) {
  characters(page: 2, filter: { name: $name }) {
    info { count }
    results { name }
  }
}"#;

fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[test]
fn test_graphql_end_to_end() {
    let mut server = Server::new();

    let mock = server
        .mock("POST", "/graphql")
        .match_header("content-type", "application/json")
        .match_header("user-agent", Matcher::Regex("^apiprobe/".to_string()))
        .match_body(Matcher::PartialJson(json!({"variables": {"name": "Rick"}})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": {"characters": {"info": {"count": 107}, "results": [{"name": "Rick Sanchez"}]}}}"#)
        .expect(1)
        .create();

    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.arg("graphql")
        .arg("--query")
        .arg(RICK_QUERY)
        .arg("--variables")
        .arg(r#"{"name": "Rick"}"#)
        .arg("--retry-status")
        .arg("500")
        .env("CONFIG_BASEURL", server.url());

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("HTTP 200"))
        .stdout(predicates::str::contains("Rick Sanchez"));

    mock.assert();
}

#[test]
fn test_retry_status_exhaustion_still_succeeds() {
    let mut server = Server::new();

    let mock = server
        .mock("GET", "/flaky")
        .with_status(500)
        .with_body("still warming up")
        .expect(3)
        .create();

    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.arg("--base-url")
        .arg(server.url())
        .arg("request")
        .arg("GET")
        .arg("flaky")
        .arg("--retry-status")
        .arg("500")
        .arg("--attempts")
        .arg("3")
        .arg("--delay-ms")
        .arg("10");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("HTTP 500"))
        .stdout(predicates::str::contains("still warming up"));

    mock.assert();
}

#[test]
fn test_non_retryable_status_is_sent_once() {
    let mut server = Server::new();

    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .expect(1)
        .create();

    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.arg("--base-url")
        .arg(server.url())
        .arg("request")
        .arg("GET")
        .arg("missing")
        .arg("--retry-status")
        .arg("500")
        .arg("--attempts")
        .arg("3")
        .arg("--delay-ms")
        .arg("10");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("HTTP 404"));

    mock.assert();
}

#[test]
fn test_multipart_form_request() {
    let mut server = Server::new();

    let mock = server
        .mock("POST", "/upload")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_header("x-trace", "e2e")
        .match_body(Matcher::Regex("name=\"title\"\r\n\r\nhello".to_string()))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 7}"#)
        .create();

    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.arg("--base-url")
        .arg(server.url())
        .arg("-H")
        .arg("X-Trace: e2e")
        .arg("request")
        .arg("POST")
        .arg("upload")
        .arg("--form")
        .arg("title=hello");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("HTTP 201"))
        .stdout(predicates::str::contains("\"id\": 7"));

    mock.assert();
}

#[test]
fn test_connection_failure_fails_the_command() {
    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.arg("--base-url")
        .arg(unused_local_url())
        .arg("request")
        .arg("GET")
        .arg("health")
        .arg("--attempts")
        .arg("2")
        .arg("--delay-ms")
        .arg("10");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Request failed"));
}

#[test]
fn test_missing_base_url_is_a_configuration_error() {
    let mut cmd = Command::new(cargo::cargo_bin!("apiprobe"));
    cmd.env_remove("CONFIG_BASEURL")
        .arg("request")
        .arg("GET")
        .arg("health");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Invalid configuration"));
}
