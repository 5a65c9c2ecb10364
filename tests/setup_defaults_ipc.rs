mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn setup_defaults_update_and_apply() {
    let workspace = temp_dir("gradebook-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let setup = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(setup["marks"]["defaultMaxMarks"], 100.0);
    assert_eq!(setup["marks"]["defaultAssessmentType"], "Assignment");
    assert_eq!(setup["analytics"]["topPerformersLimit"], 10);
    assert_eq!(setup["analytics"]["failingThreshold"], 40.0);

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "analytics", "patch": { "topPerformersLimit": 500 } }),
    );
    assert_eq!(error_code(&bad), "bad_params");
    let unknown = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(error_code(&unknown), "bad_params");

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "marks", "patch": { "defaultMaxMarks": 50, "defaultAssessmentType": "Quiz" } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "analytics", "patch": { "failingThreshold": 60 } }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "name": "Anita Desai", "classLabel": "11", "section": "A", "dateOfBirth": "2007-04-04" }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();
    let subject = request_ok(&mut stdin, &mut reader, "8", "subjects.create", json!({ "name": "History" }))
        ["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "marks.create",
        json!({ "studentId": student, "subjectId": subject, "marksObtained": 27, "assessmentDate": "2024-02-02" }),
    );

    let marks = request_ok(&mut stdin, &mut reader, "10", "marks.list", json!({}));
    assert_eq!(marks["marks"][0]["maxMarks"], 50.0);
    assert_eq!(marks["marks"][0]["assessmentType"], "Quiz");

    // 27/50 = 54%: passing at 40, failing at the configured 60.
    let failing = request_ok(&mut stdin, &mut reader, "11", "reports.failingStudents", json!({}));
    assert_eq!(failing["threshold"], 60.0);
    assert_eq!(failing["students"][0]["percentage"], 54.0);

    // Reopening the workspace keeps saved settings.
    request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "13", "setup.get", json!({}));
    assert_eq!(setup["marks"]["defaultAssessmentType"], "Quiz");
    assert_eq!(setup["analytics"]["failingThreshold"], 60.0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
