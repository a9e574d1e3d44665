use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use taskwatch_core::{TaskRef, TaskSnapshot};
use taskwatch_logging::watch_debug;

use crate::settings::SourceSettings;
use crate::types::{Envelope, TaskData, TaskRefs, TasksData};
use crate::{FailureKind, FetchError};

/// Backend access the engine needs. `fetch_tasks` drives polling; the
/// other calls back the task commands.
#[async_trait::async_trait]
pub trait TaskSource: Send + Sync {
    /// Fresh snapshots for a batch of tasks.
    async fn fetch_tasks(&self, tasks: &[TaskRef]) -> Result<Vec<TaskSnapshot>, FetchError>;

    async fn fetch_task(&self, task: &TaskRef) -> Result<TaskSnapshot, FetchError>;

    async fn remove_task(&self, task: &TaskRef) -> Result<(), FetchError>;

    async fn remove_tasks(&self, tasks: &[TaskRef]) -> Result<(), FetchError>;
}

/// [`TaskSource`] speaking JSON envelopes over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    settings: SourceSettings,
    client: reqwest::Client,
}

impl HttpTaskSource {
    pub fn new(settings: SourceSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Bytes, FetchError> {
        let url = self
            .settings
            .endpoint(path)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        watch_debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        response.bytes().await.map_err(map_reqwest_error)
    }

    async fn post_for<B, T>(&self, path: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.post(path, body).await?;
        decode_envelope::<T>(&body)?.into_data()
    }

    async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), FetchError> {
        let body = self.post(path, body).await?;
        decode_envelope::<IgnoredAny>(&body).map(|_| ())
    }
}

#[async_trait::async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch_tasks(&self, tasks: &[TaskRef]) -> Result<Vec<TaskSnapshot>, FetchError> {
        let data: TasksData = self
            .post_for(&self.settings.tasks_path, &TaskRefs { tasks })
            .await?;
        Ok(data.tasks)
    }

    async fn fetch_task(&self, task: &TaskRef) -> Result<TaskSnapshot, FetchError> {
        let data: TaskData = self.post_for(&self.settings.task_path, task).await?;
        Ok(data.task)
    }

    async fn remove_task(&self, task: &TaskRef) -> Result<(), FetchError> {
        self.post_ack(&self.settings.remove_path, task).await
    }

    async fn remove_tasks(&self, tasks: &[TaskRef]) -> Result<(), FetchError> {
        self.post_ack(&self.settings.remove_many_path, &TaskRefs { tasks })
            .await
    }
}

/// Reads the status before the payload, so an error envelope carrying an
/// unexpected `data` shape still reports as an error status.
fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, FetchError> {
    let head: Envelope<IgnoredAny> = serde_json::from_slice(body).map_err(decode_error)?;
    head.ensure_ok()?;
    serde_json::from_slice(body).map_err(decode_error)
}

fn decode_error(err: serde_json::Error) -> FetchError {
    FetchError::new(FailureKind::Decode, err.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
