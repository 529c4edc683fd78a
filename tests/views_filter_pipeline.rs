use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/api")
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
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

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected error: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn names(snapshot: &serde_json::Value, field: &str) -> Vec<String> {
    snapshot["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r[field].as_str().unwrap_or("").to_string())
        .collect()
}

fn open_view(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    kind: &str,
) -> (String, serde_json::Value) {
    let snap = request_ok(stdin, reader, id, "view.open", json!({ "kind": kind }));
    assert_eq!(snap["kind"], kind);
    assert_eq!(snap["state"], "ready", "{}", snap);
    let view_id = snap["viewId"].as_str().expect("viewId").to_string();
    (view_id, snap)
}

#[test]
fn student_directory_search_select_and_reset() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": fixture_dir().to_string_lossy() }),
    );

    let (view_id, snap) = open_view(&mut stdin, &mut reader, "2", "studentDirectory");
    assert_eq!(snap["total"], 5);
    assert_eq!(snap["matched"], 5);
    assert_eq!(snap["resetVisible"], false);
    assert_eq!(snap["criteria"]["search"]["label"], "Search by name...");
    assert_eq!(
        snap["criteria"]["criteria"][0]["options"],
        json!(["All Grades", "Grade 9", "Grade 10", "Grade 11"])
    );
    assert_eq!(snap["rows"][4]["id"], 5);

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "setSearch", "term": "jo" } }),
    );
    assert_eq!(names(&snap, "name"), vec!["John Doe", "Alice Johnson"]);
    assert_eq!(snap["resetVisible"], true);

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "select", "dimension": "section", "value": "B" } }),
    );
    assert_eq!(names(&snap, "name"), vec!["Alice Johnson"]);

    let bad_value = request(
        &mut stdin,
        &mut reader,
        "5",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "select", "dimension": "grade", "value": "Grade 12" } }),
    );
    assert_eq!(error_code(&bad_value), "bad_params");
    let bad_dimension = request(
        &mut stdin,
        &mut reader,
        "6",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "select", "dimension": "subject", "value": "Science" } }),
    );
    assert_eq!(error_code(&bad_dimension), "bad_params");
    let bad_action = request(
        &mut stdin,
        &mut reader,
        "7",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "sort" } }),
    );
    assert_eq!(error_code(&bad_action), "bad_params");

    // Rejected transitions leave the criteria untouched.
    let snap = request_ok(&mut stdin, &mut reader, "8", "view.snapshot", json!({ "viewId": view_id }));
    assert_eq!(snap["matched"], 1);

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "select", "dimension": "grade", "value": "Grade 11" } }),
    );
    assert_eq!(snap["matched"], 0);
    assert_eq!(snap["rows"], json!([]));

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "view.update",
        json!({ "viewId": view_id, "action": { "type": "reset" } }),
    );
    assert_eq!(snap["matched"], 5);
    assert_eq!(snap["resetVisible"], false);
    assert_eq!(snap["criteria"]["search"]["term"], "");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn list_views_filter_on_their_own_fields() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": fixture_dir().to_string_lossy() }),
    );

    let (teachers, _) = open_view(&mut stdin, &mut reader, "2", "teacherList");
    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "view.update",
        json!({ "viewId": teachers, "action": { "type": "select", "dimension": "subject", "value": "Mathematics" } }),
    );
    assert_eq!(names(&snap, "name"), vec!["Mary Clark", "Nina Patel"]);
    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "view.update",
        json!({ "viewId": teachers, "action": { "type": "setSearch", "term": "TOM" } }),
    );
    assert_eq!(snap["matched"], 0);

    let (exams, snap) = open_view(&mut stdin, &mut reader, "5", "examSchedule");
    assert_eq!(snap["rows"][0]["duration"], "3 Hours");
    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "view.update",
        json!({ "viewId": exams, "action": { "type": "setSearch", "term": "sci" } }),
    );
    assert_eq!(names(&snap, "subject"), vec!["Science"]);
    assert_eq!(snap["rows"][0]["duration"], "2 Hours");

    let (fees, _) = open_view(&mut stdin, &mut reader, "7", "feeList");
    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "view.update",
        json!({ "viewId": fees, "action": { "type": "select", "dimension": "grade", "value": "Grade 10" } }),
    );
    assert_eq!(snap["matched"], 3);
    let summary = &snap["aggregates"]["feeSummary"];
    assert_eq!(summary["paidCount"], 1);
    assert_eq!(summary["unpaidCount"], 2);
    assert_eq!(summary["paidAmount"].as_f64(), Some(1200.0));
    assert_eq!(summary["outstandingAmount"].as_f64(), Some(1500.5));
    let by_status = request(
        &mut stdin,
        &mut reader,
        "8b",
        "view.update",
        json!({ "viewId": fees, "action": { "type": "select", "dimension": "status", "value": "Paid" } }),
    );
    assert_eq!(error_code(&by_status), "bad_params");

    let (notices, snap) = open_view(&mut stdin, &mut reader, "9", "noticeBoard");
    assert_eq!(snap["rows"][0]["date"], "2025-12-15");
    assert_eq!(snap["rows"][1]["date"], "N/A");
    assert!(snap["criteria"]["search"].is_null());
    let no_search = request(
        &mut stdin,
        &mut reader,
        "10",
        "view.update",
        json!({ "viewId": notices, "action": { "type": "setSearch", "term": "x" } }),
    );
    assert_eq!(error_code(&no_search), "bad_params");

    let listed = request_ok(&mut stdin, &mut reader, "11", "views.list", json!({}));
    assert_eq!(listed["views"].as_array().map(|v| v.len()), Some(4));

    let _ = request_ok(&mut stdin, &mut reader, "12", "view.close", json!({ "viewId": notices }));
    let gone = request(&mut stdin, &mut reader, "13", "view.snapshot", json!({ "viewId": notices }));
    assert_eq!(error_code(&gone), "not_found");
    let twice = request(&mut stdin, &mut reader, "14", "view.close", json!({ "viewId": notices }));
    assert_eq!(error_code(&twice), "not_found");

    let unknown_kind = request(&mut stdin, &mut reader, "15", "view.open", json!({ "kind": "timetable" }));
    assert_eq!(error_code(&unknown_kind), "bad_params");

    drop(stdin);
    let _ = child.wait();
}
