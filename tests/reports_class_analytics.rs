mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

/// Creates students in class 10 section A, one Mathematics mark each.
fn seed_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    marks: &[(&str, &str, i64, i64)],
) -> String {
    let subject = request_ok(stdin, reader, "seed-sub", "subjects.create", json!({ "name": "Mathematics" }))
        ["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    for (i, (name, section, obtained, max)) in marks.iter().enumerate() {
        let student = request_ok(
            stdin,
            reader,
            &format!("seed-st-{}", i),
            "students.create",
            json!({ "name": name, "classLabel": "10", "section": section, "dateOfBirth": "2008-01-01" }),
        )["studentId"]
            .as_str()
            .expect("studentId")
            .to_string();
        request_ok(
            stdin,
            reader,
            &format!("seed-mk-{}", i),
            "marks.create",
            json!({
                "studentId": student,
                "subjectId": subject,
                "marksObtained": obtained,
                "maxMarks": max,
                "assessmentDate": "2024-01-15"
            }),
        );
    }
    subject
}

#[test]
fn class_average_is_mean_of_student_percentages() {
    let workspace = temp_dir("gradebook-class-analytics");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_class(
        &mut stdin,
        &mut reader,
        &[
            ("Aarav Sharma", "A", 85, 100),
            ("Priya Patel", "A", 75, 100),
            ("Rohit Kumar", "A", 65, 100),
            ("Sneha Singh", "A", 55, 100),
            ("Vikram Rao", "A", 35, 100),
            ("Anita Desai", "B", 10, 100),
        ],
    );

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.classAnalytics",
        json!({ "classLabel": "10", "section": "A" }),
    );
    assert_eq!(report["classLabel"], "10");
    assert_eq!(report["section"], "A");
    assert_eq!(report["totalStudents"], 5);
    assert_eq!(report["studentsWithMarks"], 5);
    assert_eq!(report["classAverage"], 63.0);
    assert_eq!(report["passCount"], 4);
    assert_eq!(report["failCount"], 1);
    assert_eq!(report["passPercentage"], 80.0);
    let top: Vec<&str> = report["topPerformers"]
        .as_array()
        .expect("top")
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(top, vec!["Aarav Sharma", "Priya Patel", "Rohit Kumar"]);

    let whole = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.classAnalytics",
        json!({ "classLabel": "10" }),
    );
    assert_eq!(whole["section"], serde_json::Value::Null);
    assert_eq!(whole["studentsWithMarks"], 6);
    assert_eq!(whole["classAverage"], 54.17);

    request_ok(
        &mut stdin,
        &mut reader,
        "4a",
        "students.create",
        json!({ "name": "Meera Iyer", "classLabel": "12", "section": "C", "dateOfBirth": "2007-03-03" }),
    );
    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.classAnalytics",
        json!({ "classLabel": "12", "section": "C" }),
    );
    assert_eq!(empty["totalStudents"], 0);
    assert_eq!(empty["studentsWithMarks"], 0);
    assert_eq!(empty["classAverage"], 0.0);
    assert_eq!(empty["passPercentage"], 0.0);
    assert_eq!(empty["topPerformers"], json!([]));

    let missing = request(&mut stdin, &mut reader, "5", "reports.classAnalytics", json!({ "section": "A" }));
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn subject_comparison_weights_by_max_marks() {
    let workspace = temp_dir("gradebook-subject-comparison");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_class(
        &mut stdin,
        &mut reader,
        &[("Aarav Sharma", "A", 90, 100), ("Priya Patel", "A", 80, 100)],
    );
    request_ok(&mut stdin, &mut reader, "2", "subjects.create", json!({ "name": "Art" }));

    let cmp = request_ok(&mut stdin, &mut reader, "3", "reports.subjectComparison", json!({}));
    let subjects = cmp["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 1, "subjects without marks are omitted");
    assert_eq!(subjects[0]["subject"], "Mathematics");
    assert_eq!(subjects[0]["avgPercentage"], 85.0);
    assert_eq!(subjects[0]["avgMarks"], 85.0);
    assert_eq!(subjects[0]["highestMarks"], 90.0);
    assert_eq!(subjects[0]["lowestMarks"], 80.0);
    assert_eq!(subjects[0]["totalAssessments"], 2);
    assert_eq!(subjects[0]["grade"], "A");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
