use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use wiremock::matchers::{method, path};
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

fn exam_json(id: i64, class_level_id: i64, code: &str, filename: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created": "2021-11-13T12:34:56Z",
        "class_level_id": class_level_id,
        "skill_domain_id": 1,
        "belt_id": 1,
        "code": code,
        "filename": filename,
    })
}

fn mount_level_view(rt: &tokio::runtime::Runtime, server: &MockServer) {
    rt.block_on(async {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": { "user_id": 1, "exp": 1924992000.0 },
                "token": "token-1",
                "user": user_json(1, "admin", true),
                "student": null,
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/class-levels/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "belts": [belt_json(1, 1, "white")],
                "skill_domains": [skill_domain_json(1, "Algebra")],
                "class_level": class_level_json(1, "4e"),
                "school_classes": [],
                "exams": [exam_json(7, 1, "B", "algebra-white.pdf")],
            })))
            .mount(server)
            .await;
    });
}

fn open_level_view(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let _ = request_ok(
        stdin,
        reader,
        "login",
        "auth.login",
        json!({ "username": "admin", "password": "secret" }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "view",
        "classLevel.view",
        json!({ "classLevelId": 1 }),
    );
}

#[test]
fn downloaded_exam_spools_under_its_original_filename() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_level_view(&rt, &server);
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/exams/7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF-1.4 exam-doc".to_vec(), "application/pdf"),
            )
            .mount(&server),
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    open_level_view(&mut stdin, &mut reader);

    let downloaded = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.download",
        json!({ "examId": 7 }),
    );
    assert_eq!(downloaded["filename"], json!("algebra-white.pdf"));
    assert_eq!(downloaded["bytes"], json!(17));
    assert_eq!(
        downloaded["sha256"],
        json!("bed1b7552afc19a6b0b0af9d2935096f696f71704a249f07102930a91e0c2f22")
    );
    let spool_path = downloaded["path"].as_str().expect("path");
    assert!(spool_path.ends_with("algebra-white.pdf"));
    let on_disk = std::fs::read(spool_path).expect("spooled file");
    assert_eq!(on_disk, b"%PDF-1.4 exam-doc");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(std::path::Path::new(spool_path).parent().expect("parent"));
}

#[test]
fn class_exam_pdf_spools_for_the_shell() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_level_view(&rt, &server);
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/school-classes/5/exam-pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF-1.4 class-bundle".to_vec(), "application/pdf"),
            )
            .mount(&server),
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "login",
        "auth.login",
        json!({ "username": "admin", "password": "secret" }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schoolClass.examPdf",
        json!({ "schoolClassId": 5 }),
    );
    assert_eq!(exported["bytes"], json!(21));
    assert_eq!(
        exported["sha256"],
        json!("b3fdd70e7c65d00fa629123d00fcf6f26980fbf7ab7ca7d85aca2b456bcd8e1b")
    );
    let spool_path = exported["path"].as_str().expect("path");
    assert!(spool_path.ends_with("exam.pdf"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(std::path::Path::new(spool_path).parent().expect("parent"));
}

#[test]
fn uploaded_exam_joins_the_level_view() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_level_view(&rt, &server);
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/class-levels/1/exams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "exam": exam_json(8, 1, "C", "geometry-white.pdf"),
            })))
            .mount(&server),
    );

    let upload_dir = tempfile::tempdir().expect("tempdir");
    let upload_path = upload_dir.path().join("geometry-white.pdf");
    std::fs::write(&upload_path, b"%PDF-1.4 upload").expect("write upload");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    open_level_view(&mut stdin, &mut reader);

    let uploaded = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.upload",
        json!({
            "classLevelId": 1,
            "skillDomainId": 1,
            "beltId": 1,
            "code": "C",
            "path": upload_path.to_string_lossy(),
        }),
    );
    assert_eq!(uploaded["exam"]["id"], json!(8));
    let ids: Vec<i64> = uploaded["exams"]
        .as_array()
        .expect("exams")
        .iter()
        .map(|exam| exam["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![7, 8]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn bulk_upload_reports_per_row_diagnostics() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_level_view(&rt, &server);
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/class-levels/1/exams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "exam": exam_json(9, 1, "D", "fractions.pdf"),
            })))
            .mount(&server),
    );

    let upload_dir = tempfile::tempdir().expect("tempdir");
    let good_path = upload_dir.path().join("fractions.pdf");
    std::fs::write(&good_path, b"%PDF-1.4 bulk").expect("write upload");
    let missing_path = upload_dir.path().join("does-not-exist.pdf");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&server.uri());
    open_level_view(&mut stdin, &mut reader);

    let outcome = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exams.bulkUpload",
        json!({
            "classLevelId": 1,
            "files": [
                {
                    "path": good_path.to_string_lossy(),
                    "skillDomainId": 1,
                    "beltId": 1,
                    "code": "D",
                },
                { "skillDomainId": 1, "beltId": 1, "code": "E" },
                {
                    "path": missing_path.to_string_lossy(),
                    "skillDomainId": 1,
                    "beltId": 1,
                    "code": "F",
                },
            ],
        }),
    );
    assert_eq!(outcome["uploaded"], json!(1));
    assert_eq!(outcome["rejected"], json!(2));
    let errors = outcome["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .any(|e| e["code"] == json!("bad_params") && e["index"] == json!(1)));
    assert!(errors
        .iter()
        .any(|e| e["code"] == json!("io_error") && e["index"] == json!(2)));

    drop(stdin);
    let _ = child.wait();
}
