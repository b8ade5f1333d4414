use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spawn_sidecar(api_url: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_beltsd");
    let mut child = Command::new(exe)
        .env("BELTSD_API_URL", api_url)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn beltsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn user_json(id: i64, username: &str, is_admin: bool) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "username": username,
        "is_admin": is_admin,
        "last_login": "2021-11-13T12:34:56Z",
    })
}

fn belt_json(id: i64, rank: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "rank": rank,
        "name": name,
        "code": format!("{rank}{name}"),
        "color": "#012345",
    })
}

fn skill_domain_json(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "name": name,
        "code": format!("D{id}"),
    })
}

fn class_level_json(id: i64, prefix: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "prefix": prefix,
    })
}

fn school_class_json(id: i64, class_level_id: i64, suffix: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "class_level_id": class_level_id,
        "suffix": suffix,
    })
}

fn student_json(id: i64, school_class_id: i64, rank: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "user_id": 100 + id,
        "username": format!("student{id}"),
        "last_login": null,
        "school_class_id": school_class_id,
        "display_name": name,
        "rank": rank,
    })
}

fn waitlist_entry_json(
    id: i64,
    student_id: i64,
    skill_domain_id: i64,
    belt_id: i64,
) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "student_id": student_id,
        "skill_domain_id": skill_domain_id,
        "belt_id": belt_id,
    })
}

fn class_detail_json() -> serde_json::Value {
    json!({
        "belts": [belt_json(1, 1, "white"), belt_json(2, 2, "yellow")],
        "skill_domains": [skill_domain_json(1, "Algebra"), skill_domain_json(2, "Geometry")],
        "class_level": class_level_json(1, "4e"),
        "school_class": school_class_json(5, 1, "D"),
        "students": [
            student_json(10, 5, 1, "Alice"),
            student_json(11, 5, 2, "Bob"),
        ],
        "student_belts": [
            { "student_id": 10, "belts": [{ "skill_domain_id": 1, "belt_id": 1 }] },
            { "student_id": 11, "belts": [] },
        ],
    })
}

#[test]
fn convert_filters_rows_and_refetches_the_class_view() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());

    rt.block_on(async {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": { "user_id": 1, "exp": 1924992000.0 },
                "token": "token-1",
                "user": user_json(1, "admin", true),
                "student": null,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/school-classes/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(class_detail_json()))
            .mount(&server)
            .await;
        // the waitlist drains after the conversion
        Mock::given(method("GET"))
            .and(path("/school-classes/5/waitlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "waitlist_entries": [
                    waitlist_entry_json(1, 10, 1, 2),
                    waitlist_entry_json(2, 10, 2, 1),
                    waitlist_entry_json(3, 11, 1, 1),
                    waitlist_entry_json(4, 11, 2, 1),
                ],
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/school-classes/5/waitlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "waitlist_entries": [waitlist_entry_json(4, 11, 2, 1)],
            })))
            .mount(&server)
            .await;
        // only the completed rows with a usable date may reach the server
        Mock::given(method("POST"))
            .and(path("/waitlist/convert"))
            .and(body_json(json!({
                "completed_evaluations": [
                    { "waitlist_entry_id": 1, "date": "2021-11-13", "success": true },
                    { "waitlist_entry_id": 3, "date": "2021-12-01", "success": false },
                ],
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    });

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "username": "admin", "password": "secret" }),
    );

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schoolClass.view",
        json!({ "schoolClassId": 5 }),
    );
    assert_eq!(
        view["waitlist_entries"].as_array().map(Vec::len),
        Some(4)
    );

    let converted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "waitlist.convert",
        json!({
            "commonDate": "2021-12-01",
            "rows": [
                { "waitlistEntryId": 1, "date": "2021-11-13", "success": true },
                { "waitlistEntryId": 2, "completed": false, "date": "2021-11-13" },
                { "waitlistEntryId": 3 },
                { "waitlistEntryId": 4, "date": "not-a-date" },
            ],
        }),
    );
    assert_eq!(converted["converted"], json!(2));
    assert_eq!(converted["skipped"], json!(2));
    // the refetched view replaces the stale one wholesale
    assert_eq!(
        converted["class"]["waitlist_entries"].as_array().map(Vec::len),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn convert_with_nothing_completed_issues_no_request() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());

    rt.block_on(async {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": { "user_id": 1, "exp": 1924992000.0 },
                "token": "token-1",
                "user": user_json(1, "admin", true),
                "student": null,
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/waitlist/convert"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
    });

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "username": "admin", "password": "secret" }),
    );

    let converted = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "waitlist.convert",
        json!({
            "rows": [
                { "waitlistEntryId": 1, "completed": false, "date": "2021-11-13" },
                { "waitlistEntryId": 2 },
            ],
        }),
    );
    assert_eq!(converted["converted"], json!(0));
    assert_eq!(converted["skipped"], json!(2));
    assert_eq!(converted["class"], json!(null));

    drop(stdin);
    let _ = child.wait();
}
