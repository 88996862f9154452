use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use nested_todos::api::create_router;
use nested_todos::db::Database;
use nested_todos::models::*;
use serde_json::json;

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db);
    TestServer::new(app).expect("Failed to create test server")
}

fn sample_todos() -> Vec<TodoNode> {
    vec![TodoNode {
        id: "groceries".into(),
        text: "Groceries".to_string(),
        completed: false,
        children: vec![
            TodoNode {
                id: "milk".into(),
                text: "Milk".to_string(),
                completed: true,
                children: vec![],
            },
            TodoNode::leaf("bread".into(), "Bread"),
        ],
    }]
}

async fn put_sample(server: &TestServer, list_id: &str) -> TodoList {
    server
        .put(&format!("/list/{}", list_id))
        .json(&UpdateListInput {
            todos: sample_todos(),
        })
        .await
        .json::<TodoList>()
}

mod get_list {
    use super::*;

    #[tokio::test]
    async fn returns_empty_tree_for_unknown_list() {
        let server = setup();

        let response = server.get("/list/never-saved").await;

        response.assert_status_ok();
        let list: TodoList = response.json();
        assert_eq!(list.list_id, "never-saved");
        assert!(list.todos.is_empty());
    }

    #[tokio::test]
    async fn returns_what_was_stored() {
        let server = setup();
        put_sample(&server, "abc").await;

        let response = server.get("/list/abc").await;

        response.assert_status_ok();
        let list: TodoList = response.json();
        assert_eq!(list.todos, sample_todos());
    }

    #[tokio::test]
    async fn uses_camel_case_keys() {
        let server = setup();
        put_sample(&server, "abc").await;

        let body: serde_json::Value = server.get("/list/abc").await.json();

        assert_eq!(body["listId"], "abc");
        assert_eq!(body["todos"][0]["children"][0]["completed"], true);
    }
}

mod put_list {
    use super::*;

    #[tokio::test]
    async fn echoes_the_stored_list() {
        let server = setup();

        let list = put_sample(&server, "abc").await;

        assert_eq!(list.list_id, "abc");
        assert_eq!(list.todos, sample_todos());
    }

    #[tokio::test]
    async fn overwrites_the_previous_tree() {
        let server = setup();
        put_sample(&server, "abc").await;

        server
            .put("/list/abc")
            .json(&UpdateListInput {
                todos: vec![TodoNode::leaf("only".into(), "Only")],
            })
            .await
            .assert_status_ok();

        let list: TodoList = server.get("/list/abc").await.json();
        assert_eq!(list.todos.len(), 1);
        assert_eq!(list.todos[0].id.as_str(), "only");
    }

    #[tokio::test]
    async fn accepts_an_empty_tree() {
        let server = setup();
        put_sample(&server, "abc").await;

        server
            .put("/list/abc")
            .json(&json!({ "todos": [] }))
            .await
            .assert_status_ok();

        let list: TodoList = server.get("/list/abc").await.json();
        assert!(list.todos.is_empty());
    }

    #[tokio::test]
    async fn rejects_a_body_without_a_todo_array() {
        let server = setup();

        let response = server
            .put("/list/abc")
            .json(&json!({ "todos": "not a list" }))
            .await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn rejects_a_body_that_is_not_json() {
        let server = setup();

        let response = server.put("/list/abc").text("todos please").await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let server = setup();

        let response = server
            .put("/list/abc")
            .json(&json!({
                "todos": [
                    { "id": "a", "text": "One", "completed": false, "children": [] },
                    { "id": "a", "text": "Two", "completed": false, "children": [] }
                ]
            }))
            .await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "duplicate todo id: a");

        let list: TodoList = server.get("/list/abc").await.json();
        assert!(list.todos.is_empty());
    }

    #[tokio::test]
    async fn rejects_trees_nested_too_deep() {
        let server = setup();
        let mut node = json!({ "id": "bottom" });
        for level in 0..nested_todos::tree::MAX_DEPTH {
            node = json!({ "id": format!("n{}", level), "children": [node] });
        }

        let response = server.put("/list/abc").json(&json!({ "todos": [node] })).await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(body.error.contains("levels deep"));
    }

    #[tokio::test]
    async fn fills_in_missing_node_fields() {
        let server = setup();

        let list: TodoList = server
            .put("/list/abc")
            .json(&json!({ "todos": [{ "id": "a" }] }))
            .await
            .json();

        assert_eq!(list.todos, vec![TodoNode::leaf("a".into(), "")]);
    }
}

mod delete_list {
    use super::*;

    #[tokio::test]
    async fn removes_the_list() {
        let server = setup();
        put_sample(&server, "abc").await;

        let response = server.delete("/list/abc").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "List deleted successfully");

        let list: TodoList = server.get("/list/abc").await.json();
        assert!(list.todos.is_empty());
    }

    #[tokio::test]
    async fn succeeds_for_unknown_list() {
        let server = setup();

        server.delete("/list/missing").await.assert_status_ok();
    }
}

mod methods {
    use super::*;

    #[tokio::test]
    async fn post_is_not_allowed() {
        let server = setup();

        let response = server
            .post("/list/abc")
            .json(&json!({ "todos": [] }))
            .await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "Method not allowed");
    }

    #[tokio::test]
    async fn plain_options_returns_ok() {
        let server = setup();

        server
            .method(Method::OPTIONS, "/list/abc")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let server = setup();

        let response = server
            .method(Method::OPTIONS, "/list/abc")
            .add_header(
                HeaderName::from_static("origin"),
                HeaderValue::from_static("http://example.com"),
            )
            .add_header(
                HeaderName::from_static("access-control-request-method"),
                HeaderValue::from_static("PUT"),
            )
            .await;

        response.assert_status_ok();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}

mod lists {
    use super::*;

    #[tokio::test]
    async fn returns_most_recently_updated_first() {
        let server = setup();
        put_sample(&server, "first").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        put_sample(&server, "second").await;

        let response = server.get("/lists").await;

        response.assert_status_ok();
        let lists: Vec<ListSummary> = response.json();
        let ids: Vec<&str> = lists.iter().map(|l| l.list_id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn omits_deleted_lists() {
        let server = setup();
        put_sample(&server, "keep").await;
        put_sample(&server, "drop").await;
        server.delete("/list/drop").await.assert_status_ok();

        let lists: Vec<ListSummary> = server.get("/lists").await.json();

        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].list_id, "keep");
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}
