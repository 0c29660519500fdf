//! End-to-end pipeline tests against a seeded SQLite practice database.

mod common;

use common::{
    ASSIGNMENT_ID, FailingStore, RUNAWAY_QUERY, SLOW_QUERY, gateway, gateway_with_store,
    practice_db,
};
use serde_json::{Value as JsonValue, json};
use sql_studio_gateway::db::{MemoryAttemptStore, QueryExecutor};
use sql_studio_gateway::models::ExecuteRequest;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn request(query: &str) -> ExecuteRequest {
    ExecuteRequest::new(query, ASSIGNMENT_ID)
}

/// The body without the timing field, which varies between runs.
fn without_timing(mut body: JsonValue) -> JsonValue {
    if let Some(data) = body.get_mut("data").and_then(JsonValue::as_object_mut) {
        data.remove("executionTime");
    }
    if let Some(obj) = body.as_object_mut() {
        obj.remove("executionTime");
    }
    body
}

#[tokio::test]
async fn test_matching_rows_are_returned() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;

    let reply = gateway
        .execute(&request("SELECT * FROM employees WHERE salary > 50000"))
        .await;
    assert_eq!(reply.response.status, 200);

    let body = &reply.response.body;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["rowCount"], 3);

    let names: Vec<&str> = body["data"]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["id", "name", "department", "salary", "hire_date"]);

    let salaries: Vec<i64> = body["data"]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["salary"].as_i64().unwrap())
        .collect();
    assert_eq!(salaries, [75000, 80000, 55000]);
    assert!(body["data"]["executionTime"].is_u64());

    reply.recording.unwrap().await.unwrap();
    let attempts = store.attempts().await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].is_successful);
    assert_eq!(attempts[0].result_rows, 3);
    assert_eq!(attempts[0].assignment_id, ASSIGNMENT_ID);
}

#[tokio::test]
async fn test_sanitized_text_is_executed_and_recorded() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;

    let reply = gateway
        .execute(&request("  SELECT name FROM departments ORDER BY id;  "))
        .await;
    assert_eq!(reply.response.status, 200);
    assert_eq!(
        reply.response.body["data"]["rows"],
        json!([{"name": "Engineering"}, {"name": "Marketing"}, {"name": "HR"}])
    );

    reply.recording.unwrap().await.unwrap();
    assert_eq!(
        store.attempts().await[0].query,
        "SELECT name FROM departments ORDER BY id"
    );
}

#[tokio::test]
async fn test_empty_result_still_reports_columns() {
    let db = practice_db().await;
    let (gateway, _store) = gateway(&db).await;

    let reply = gateway
        .execute(&request("SELECT id, name FROM employees WHERE salary > 1000000"))
        .await;
    assert_eq!(reply.response.status, 200);
    let data = &reply.response.body["data"];
    assert_eq!(data["rowCount"], 0);
    assert_eq!(data["rows"], json!([]));
    assert_eq!(data["columns"].as_array().unwrap().len(), 2);
    assert_eq!(data["columns"][1]["name"], "name");
}

#[tokio::test]
async fn test_backend_error_is_client_error_with_timing() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;

    let reply = gateway.execute(&request("SELECT * FROM missing_table")).await;
    assert_eq!(reply.response.status, 400);
    let body = &reply.response.body;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("missing_table"));
    assert!(body["executionTime"].is_u64());

    reply.recording.unwrap().await.unwrap();
    let attempts = store.attempts().await;
    assert!(!attempts[0].is_successful);
    assert_eq!(attempts[0].result_rows, 0);
    assert!(attempts[0].error_message.as_deref().unwrap().contains("missing_table"));
}

#[tokio::test]
async fn test_rejections_skip_execution_and_recording() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;

    let cases = [
        ("DROP TABLE employees", "Dangerous operation detected: DROP. Only SELECT queries are allowed."),
        ("SELECT 1; SELECT 2", "Multiple statements are not allowed"),
        ("", "Query cannot be empty"),
    ];
    for (query, expected) in cases {
        let reply = gateway.execute(&request(query)).await;
        assert_eq!(reply.response.status, 400, "query: {query}");
        assert_eq!(reply.response.body, json!({"success": false, "error": expected}));
        assert!(reply.recording.is_none());
    }
    assert!(store.attempts().await.is_empty());
}

#[tokio::test]
async fn test_assignment_id_checked_after_query() {
    let db = practice_db().await;
    let (gateway, _store) = gateway(&db).await;

    let missing = ExecuteRequest {
        query: Some(json!("SELECT 1")),
        ..Default::default()
    };
    let reply = gateway.execute(&missing).await;
    assert_eq!(reply.response.status, 400);
    assert_eq!(reply.response.body["error"], "Valid assignment ID is required");

    let blank = ExecuteRequest::new("SELECT 1", "   ");
    let reply = gateway.execute(&blank).await;
    assert_eq!(reply.response.body["error"], "Valid assignment ID is required");

    // An invalid query is reported before the missing id.
    let both = ExecuteRequest {
        query: Some(json!("DELETE FROM employees")),
        ..Default::default()
    };
    let reply = gateway.execute(&both).await;
    assert!(reply.response.body["error"].as_str().unwrap().contains("DELETE"));
}

#[tokio::test]
async fn test_non_string_query_is_empty() {
    let db = practice_db().await;
    let (gateway, _store) = gateway(&db).await;

    let numeric = ExecuteRequest {
        query: Some(json!(42)),
        assignment_id: Some(json!(ASSIGNMENT_ID)),
        user_id: None,
    };
    let reply = gateway.execute(&numeric).await;
    assert_eq!(reply.response.body["error"], "Query cannot be empty");
}

#[tokio::test]
async fn test_store_failure_does_not_change_response() {
    let db = practice_db().await;
    let (healthy, _store) = gateway(&db).await;
    let failing = gateway_with_store(&db, 2, Arc::new(FailingStore)).await;

    for query in [
        "SELECT name FROM employees WHERE department = 'Engineering'",
        "SELECT * FROM missing_table",
    ] {
        let expected = healthy.execute(&request(query)).await;
        let actual = failing.execute(&request(query)).await;
        assert_eq!(actual.response.status, expected.response.status);
        assert_eq!(
            without_timing(actual.response.body),
            without_timing(expected.response.body)
        );
        // The failed write is swallowed on its own task.
        actual.recording.unwrap().await.unwrap();
    }
}

#[tokio::test]
async fn test_statement_timeout_is_reported_and_session_released() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;
    let gateway = gateway.with_executor(QueryExecutor::with_timeout(Duration::from_millis(50)));

    let reply = gateway.execute(&request(SLOW_QUERY)).await;
    assert_eq!(reply.response.status, 400);
    let body = &reply.response.body;
    assert!(body["error"].as_str().unwrap().contains("statement timeout"));
    assert!(body["executionTime"].as_u64().unwrap() >= 50);
    assert_eq!(gateway.pool().available(), gateway.pool().size());

    reply.recording.unwrap().await.unwrap();
    assert!(!store.attempts().await[0].is_successful);

    // A replacement session serves the next query.
    let next = gateway.execute(&request("SELECT count(*) AS n FROM departments")).await;
    assert_eq!(next.response.status, 200);
    assert_eq!(next.response.body["data"]["rows"][0]["n"], 3);
}

#[tokio::test]
async fn test_runaway_statements_stop_at_the_budget() {
    let db = practice_db().await;
    let store = Arc::new(MemoryAttemptStore::new());
    let gateway = gateway_with_store(&db, 1, store)
        .await
        .with_executor(QueryExecutor::with_timeout(Duration::from_millis(50)));

    let start = Instant::now();
    for _ in 0..6 {
        let reply = gateway.execute(&request(RUNAWAY_QUERY)).await;
        assert_eq!(reply.response.status, 400);
        assert!(
            reply.response.body["error"]
                .as_str()
                .unwrap()
                .contains("statement timeout")
        );
    }
    assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
    assert_eq!(gateway.pool().available(), 1);

    let next = gateway.execute(&request("SELECT count(*) AS n FROM employees")).await;
    assert_eq!(next.response.status, 200);
    assert_eq!(next.response.body["data"]["rows"][0]["n"], 4);
}

#[tokio::test]
async fn test_free_sessions_return_to_baseline() {
    let db = practice_db().await;
    let (gateway, _store) = gateway(&db).await;
    let gateway = gateway.with_executor(QueryExecutor::with_timeout(Duration::from_millis(50)));
    let baseline = gateway.pool().available();
    assert_eq!(baseline, 2);

    for query in [
        "SELECT * FROM employees",
        "SELECT nope FROM employees",
        SLOW_QUERY,
        "SELECT 1 AS one",
    ] {
        let _ = gateway.execute(&request(query)).await;
        assert_eq!(gateway.pool().available(), baseline, "query: {query}");
    }
}

#[tokio::test]
async fn test_closed_pool_is_an_opaque_fault() {
    let db = practice_db().await;
    let (gateway, store) = gateway(&db).await;
    gateway.pool().close().await;

    let reply = gateway.execute(&request("SELECT 1")).await;
    assert_eq!(reply.response.status, 500);
    assert_eq!(
        reply.response.body,
        json!({"success": false, "error": "Failed to execute query"})
    );

    // Faults are still recorded as failed attempts.
    reply.recording.unwrap().await.unwrap();
    let attempts = store.attempts().await;
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].is_successful);
}

#[tokio::test]
async fn test_stats_aggregate_recorded_attempts() {
    let db = practice_db().await;
    let (gateway, _store) = gateway(&db).await;

    for query in [
        "SELECT * FROM employees",
        "SELECT * FROM departments",
        "SELECT * FROM missing_table",
    ] {
        let reply = gateway.execute(&request(query)).await;
        reply.recording.unwrap().await.unwrap();
    }

    let stats = gateway.stats(ASSIGNMENT_ID).await;
    assert_eq!(stats.status, 200);
    assert_eq!(stats.body["success"], true);
    assert_eq!(stats.body["data"]["totalAttempts"], 3);
    assert_eq!(stats.body["data"]["successfulAttempts"], 2);
    assert_eq!(stats.body["data"]["totalHintsUsed"], 0);

    let failing = gateway_with_store(&db, 1, Arc::new(FailingStore)).await;
    let stats = failing.stats(ASSIGNMENT_ID).await;
    assert_eq!(stats.status, 500);
    assert_eq!(stats.body["error"], "Failed to fetch query statistics");
}
