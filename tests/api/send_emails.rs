use std::collections::HashSet;

use serde_json::{Value, json};
use wiremock::matchers::{any, body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{BatchForm, HEADER, spawn_app};

fn results(body: &Value) -> &Vec<Value> {
    body["results"].as_array().expect("results is not an array")
}

fn status_for<'a>(body: &'a Value, email: &str) -> &'a str {
    results(body)
        .iter()
        .find(|r| r["email"] == email)
        .and_then(|r| r["status"].as_str())
        .expect("no outcome for the email")
}

#[tokio::test]
async fn send_emails_returns_sent_for_a_single_recipient() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .and(body_partial_json(json!({
            "To": "a@x.com",
            "Subject": "Application for Software Developer Position",
            "TextBody": "Hi A from X",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[HEADER, &["A", "a@x.com", "X"]]))
        .await;

    // Assert
    assert_eq!(
        body,
        json!({
            "results": [{"index": 0, "email": "a@x.com", "status": "sent"}],
            "sent": 1,
            "failed": 0,
        })
    );
}

#[tokio::test]
async fn send_emails_attaches_the_uploaded_file() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .and(body_partial_json(json!({
            "Attachments": [{
                "Name": "resume.pdf",
                "ContentType": "application/pdf",
                "Content": "JVBERi0xLjQgcmVzdW1l",
            }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[HEADER, &["A", "a@x.com", "X"]]))
        .await;

    // Assert
    assert_eq!(body["sent"], 1);
}

#[tokio::test]
async fn send_emails_reports_authentication_failures() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[HEADER, &["A", "a@x.com", "X"]]))
        .await;

    // Assert
    let status = status_for(&body, "a@x.com");
    assert!(status.starts_with("failed - "), "{}", status);
    assert!(status.contains("authentication error"), "{}", status);
    assert_eq!(body["failed"], 1);
}

#[tokio::test]
async fn one_rejected_recipient_does_not_affect_the_others() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(body_partial_json(json!({"To": "bad@y.com"})))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[
            HEADER,
            &["A", "a@x.com", "X"],
            &["B", "bad@y.com", "Y"],
            &["C", "c@z.com", "Z"],
            &["D", "d@w.com", "W"],
        ]))
        .await;

    // Assert
    assert_eq!(results(&body).len(), 4);
    assert_eq!(status_for(&body, "a@x.com"), "sent");
    assert_eq!(status_for(&body, "c@z.com"), "sent");
    assert_eq!(status_for(&body, "d@w.com"), "sent");
    assert!(status_for(&body, "bad@y.com").starts_with("failed - transport error"));
}

#[tokio::test]
async fn invalid_addresses_fail_their_row_without_reaching_the_transport() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[
            HEADER,
            &["A", "a@x.com", "X"],
            &["B", "definitely-not-an-email", "Y"],
        ]))
        .await;

    // Assert
    assert_eq!(results(&body).len(), 2);
    assert!(
        status_for(&body, "definitely-not-an-email")
            .starts_with("failed - invalid destination address")
    );
}

#[tokio::test]
async fn duplicate_recipients_each_get_their_own_outcome() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app
        .post_send_emails_json(BatchForm::new(&[
            HEADER,
            &["A", "a@x.com", "X"],
            &["A", "a@x.com", "X"],
        ]))
        .await;

    // Assert
    let indices: HashSet<u64> = results(&body)
        .iter()
        .map(|r| r["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, HashSet::from([0, 1]));
    assert_eq!(body["sent"], 2);
}

#[tokio::test]
async fn sequential_batch_still_reports_every_row() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(body_partial_json(json!({"To": "r2@x.com"})))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;
    let mut form = BatchForm::new(&[
        HEADER,
        &["R1", "r1@x.com", "X"],
        &["R2", "r2@x.com", "X"],
        &["R3", "r3@x.com", "X"],
        &["R4", "r4@x.com", "X"],
        &["R5", "r5@x.com", "X"],
    ]);
    form.concurrency_limit = Some("1");

    // Act
    let body = app.post_send_emails_json(form).await;

    // Assert
    assert_eq!(results(&body).len(), 5);
    assert_eq!(body["sent"], 4);
    assert_eq!(body["failed"], 1);
}

#[tokio::test]
async fn header_only_spreadsheet_returns_an_empty_report() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    // Act
    let body = app.post_send_emails_json(BatchForm::new(&[HEADER])).await;

    // Assert
    assert_eq!(body, json!({"results": [], "sent": 0, "failed": 0}));
}

#[tokio::test]
async fn unknown_placeholder_fails_every_row_without_sending() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;
    let mut form = BatchForm::new(&[HEADER, &["A", "a@x.com", "X"], &["B", "b@y.com", "Y"]]);
    form.prompt = Some("Dear {title} {name}");

    // Act
    let body = app.post_send_emails_json(form).await;

    // Assert
    assert_eq!(body["failed"], 2);
    assert!(status_for(&body, "a@x.com").contains("{title}"));
}

#[tokio::test]
async fn missing_company_column_is_rejected_before_any_send() {
    // Arrange
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    // Act
    let response = app
        .post_send_emails(BatchForm::new(&[&["Name", "Email"], &["A", "a@x.com"]]))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("Excel must contain 'Name', 'Email', 'Company' columns")
    );
}

#[tokio::test]
async fn send_emails_returns_a_400_for_an_invalid_spreadsheet() {
    // Arrange
    let app = spawn_app().await;
    let mut form = BatchForm::new(&[HEADER]);
    form.excel_file = Some(b"Name,Email,Company\nA,a@x.com,X".to_vec());

    // Act
    let response = app.post_send_emails(form).await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Invalid Excel file format")
    );
}

#[tokio::test]
async fn send_emails_returns_a_422_when_data_is_missing() {
    // Arrange
    let app = spawn_app().await;
    let rows: &[&[&str]] = &[HEADER, &["A", "a@x.com", "X"]];
    let mut missing_prompt = BatchForm::new(rows);
    missing_prompt.prompt = None;
    let mut missing_subject = BatchForm::new(rows);
    missing_subject.subject = None;
    let mut missing_spreadsheet = BatchForm::new(rows);
    missing_spreadsheet.excel_file = None;
    let mut missing_attachment = BatchForm::new(rows);
    missing_attachment.resume_file = None;
    let test_cases = vec![
        (missing_prompt, "missing prompt"),
        (missing_subject, "missing subject"),
        (missing_spreadsheet, "missing spreadsheet"),
        (missing_attachment, "missing attachment"),
    ];

    for (invalid_body, error_message) in test_cases {
        // Act
        let response = app.post_send_emails(invalid_body).await;

        // Assert
        assert_eq!(
            422,
            response.status().as_u16(),
            "The API did not fail with 422 Unprocessable Entity when the payload was {}.",
            error_message
        );
    }
}

#[tokio::test]
async fn send_emails_returns_a_400_when_fields_are_present_but_invalid() {
    // Arrange
    let app = spawn_app().await;
    let rows: &[&[&str]] = &[HEADER, &["A", "a@x.com", "X"]];
    let mut empty_prompt = BatchForm::new(rows);
    empty_prompt.prompt = Some("   ");
    let mut empty_subject = BatchForm::new(rows);
    empty_subject.subject = Some("");
    let mut empty_attachment = BatchForm::new(rows);
    empty_attachment.resume_file = Some(Vec::new());
    let mut zero_limit = BatchForm::new(rows);
    zero_limit.concurrency_limit = Some("0");
    let mut garbage_limit = BatchForm::new(rows);
    garbage_limit.concurrency_limit = Some("three");
    let test_cases = vec![
        (empty_prompt, "empty prompt"),
        (empty_subject, "empty subject"),
        (empty_attachment, "empty attachment"),
        (zero_limit, "zero concurrency limit"),
        (garbage_limit, "non-numeric concurrency limit"),
    ];

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for (body, description) in test_cases {
        // Act
        let response = app.post_send_emails(body).await;

        // Assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not return a 400 Bad Request when the payload was {}.",
            description
        );
    }
}
