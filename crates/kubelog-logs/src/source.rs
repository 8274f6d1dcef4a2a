use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{AsyncRead, AsyncReadExt, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::LogParams;
use thiserror::Error;

use kubelog_types::ContainerRef;

/// Upper bound on a single read from the source
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Raw log content in arrival order. Dropping it closes the source.
pub type LogByteStream = BoxStream<'static, Result<Bytes, SourceError>>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open log stream: {0}")]
    Open(String),

    #[error("Error reading logs: {0}")]
    Read(String),
}

/// Something that can follow a container's log
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Open a follow-mode stream seeded with the last `tail_lines` lines.
    ///
    /// The stream ends when the container stops; it never ends on its own
    /// while the container is alive, however long it stays idle.
    async fn open(
        &self,
        target: &ContainerRef,
        tail_lines: i64,
    ) -> Result<LogByteStream, SourceError>;
}

/// Follows pod logs through the Kubernetes API
#[derive(Clone)]
pub struct KubeLogSource {
    client: kube::Client,
}

impl KubeLogSource {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogSource for KubeLogSource {
    async fn open(
        &self,
        target: &ContainerRef,
        tail_lines: i64,
    ) -> Result<LogByteStream, SourceError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = LogParams {
            follow: true,
            container: Some(target.container_name.clone()),
            tail_lines: Some(tail_lines),
            ..Default::default()
        };

        let reader = api
            .log_stream(&target.pod_name, &params)
            .await
            .map_err(|e| SourceError::Open(e.to_string()))?;

        Ok(reader_stream(reader))
    }
}

/// Adapt an async reader into a stream of chunks. The first read error
/// is yielded once and ends the stream.
fn reader_stream<R>(reader: R) -> LogByteStream
where
    R: AsyncRead + Send + 'static,
{
    futures::stream::unfold(Some(Box::pin(reader)), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => Some((Err(SourceError::Read(e.to_string())), None)),
        }
    })
    .boxed()
}
