//! Task executor over HTTP: `POST {base}/executions`.

use hearth_orchestrator::{BoxFuture, CollaboratorResult, Execution, TaskExecutor};
use serde_json::{Value, json};
use tracing::debug;

use crate::http;

#[derive(Clone)]
pub struct HttpTaskExecutor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTaskExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: http::client(),
        }
    }
}

impl TaskExecutor for HttpTaskExecutor {
    fn dispatch<'a>(
        &'a self,
        task: &'a str,
        payload: Value,
    ) -> BoxFuture<'a, CollaboratorResult<Execution>> {
        Box::pin(async move {
            let response = self
                .client
                .post(http::join(&self.base_url, "executions"))
                .json(&json!({ "task": task, "input": payload }))
                .send()
                .await
                .map_err(crate::RemoteError::from)?;
            let execution: Execution = http::read_json(response).await?;
            debug!(%task, execution = %execution.execution_ref, "execution accepted");
            Ok(execution)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_orchestrator::CollaboratorError;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn dispatch_posts_task_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executions"))
            .and(body_json(json!({
                "task": "start-server",
                "input": {"serverName": "box1", "instanceId": "i-1"}
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({"executionRef": "exec-9", "startedAt": 1700})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = HttpTaskExecutor::new(format!("{}/", server.uri()));
        let execution = executor
            .dispatch("start-server", json!({"serverName": "box1", "instanceId": "i-1"}))
            .await
            .unwrap();
        assert_eq!(execution.execution_ref, "exec-9");
        assert_eq!(execution.started_at, 1700);
    }

    #[tokio::test]
    async fn rejection_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"message": "throttled"})),
            )
            .mount(&server)
            .await;

        let err = HttpTaskExecutor::new(server.uri())
            .dispatch("start-server", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(ref m) if m == "429: throttled"));
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .mount(&server)
            .await;

        let err = HttpTaskExecutor::new(server.uri())
            .dispatch("start-server", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }
}
