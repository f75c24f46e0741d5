//! # Reflection Client
//!
//! Fetches the schema of a running server over `grpc.reflection.v1`.
//!
//! Each lookup opens one `ServerReflectionInfo` stream. Whenever a file arrives, the imports
//! that have not been seen yet are requested on that same stream, and the stream is only
//! released once every request has been answered. The result is therefore a complete
//! [`DescriptorSet`], ready to build messages with.
//!
//! See the [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md).
use crate::{
    BoxError,
    descriptor::{DescriptorError, DescriptorSet},
};
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Streaming, client::GrpcService, transport::Channel};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

/// Requests that may be queued on a stream before the peer answers.
const REQUEST_BUFFER: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("Peer does not serve reflection: '{0}'")]
    Unsupported(#[source] tonic::Status),
    #[error("Reflection stream failed: '{0}'")]
    Stream(#[source] tonic::Status),
    #[error("Reflection stream closed before every request was answered")]
    Closed,
    #[error("Reflection request could not be queued")]
    SendFailed,
    #[error("Peer rejected the request with code {code}: {message}")]
    Rejected { code: i32, message: String },
    #[error("Expected {expected} from the peer, got: {actual}")]
    UnexpectedAnswer {
        expected: &'static str,
        actual: String,
    },
    #[error("Peer sent a file that does not decode: '{0}'")]
    MalformedFile(#[from] prost::DecodeError),
}

/// Looks up services and files on a peer.
#[derive(Debug, Clone)]
pub struct ReflectionClient<T = Channel> {
    client: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// The file declaring `symbol` (e.g. `helloworld.Greeter`), with its imports.
    pub async fn descriptors_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<DescriptorSet, DescriptorError> {
        self.fetch(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await
    }

    /// The file called `filename` (e.g. `helloworld.proto`), with its imports.
    pub async fn descriptors_by_filename(
        &mut self,
        filename: &str,
    ) -> Result<DescriptorSet, DescriptorError> {
        self.fetch(MessageRequest::FileByFilename(filename.to_string()))
            .await
    }

    /// Fully-qualified names of every service the peer exposes, reflection included.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        let mut session = self.open().await?;
        session
            .send(MessageRequest::ListServices(String::new()))
            .await?;

        match session.answer().await? {
            MessageResponse::ListServicesResponse(list) => {
                Ok(list.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(unexpected("a service list", &other)),
        }
    }

    async fn open(&mut self) -> Result<Session, ReflectionError> {
        let (requests, outgoing) = mpsc::channel(REQUEST_BUFFER);

        let answers = self
            .client
            .server_reflection_info(ReceiverStream::new(outgoing))
            .await
            .map_err(ReflectionError::Unsupported)?
            .into_inner();

        Ok(Session { requests, answers })
    }

    async fn fetch(&mut self, request: MessageRequest) -> Result<DescriptorSet, DescriptorError> {
        let mut session = self.open().await?;
        session.send(request).await?;

        let mut collector = FileCollector::default();
        let mut pending = 1;

        while pending > 0 {
            let batch = match session.answer().await? {
                MessageResponse::FileDescriptorResponse(files) => files.file_descriptor_proto,
                other => return Err(unexpected("file descriptors", &other).into()),
            };
            pending -= 1;

            for import in collector.absorb(batch)? {
                session.send(MessageRequest::FileByFilename(import)).await?;
                pending += 1;
            }
        }

        DescriptorSet::from_file_descriptor_set(collector.finish())
    }
}

/// One open `ServerReflectionInfo` stream.
struct Session {
    requests: mpsc::Sender<ServerReflectionRequest>,
    answers: Streaming<ServerReflectionResponse>,
}

impl Session {
    async fn send(&self, request: MessageRequest) -> Result<(), ReflectionError> {
        tracing::debug!(?request, "sending reflection request");

        // The host is not used by any known server.
        let request = ServerReflectionRequest {
            host: String::new(),
            message_request: Some(request),
        };

        self.requests
            .send(request)
            .await
            .map_err(|_| ReflectionError::SendFailed)
    }

    /// The next answer, with in-band error responses turned into errors.
    async fn answer(&mut self) -> Result<MessageResponse, ReflectionError> {
        let response = self
            .answers
            .message()
            .await
            .map_err(ReflectionError::Stream)?
            .ok_or(ReflectionError::Closed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionError::Rejected {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(answer) => Ok(answer),
            None => Err(ReflectionError::UnexpectedAnswer {
                expected: "an answer",
                actual: "an empty response".to_string(),
            }),
        }
    }
}

/// Accumulates received files and tracks which imports are still missing.
#[derive(Debug, Default)]
struct FileCollector {
    files: BTreeMap<String, FileDescriptorProto>,
    requested: HashSet<String>,
}

impl FileCollector {
    /// Stores a batch of encoded files and returns the imports to request next.
    ///
    /// An import is returned at most once, and never when its file is already known.
    fn absorb(&mut self, batch: Vec<Vec<u8>>) -> Result<Vec<String>, ReflectionError> {
        let mut received = Vec::new();

        for raw in batch {
            let file = FileDescriptorProto::decode(raw.as_slice())?;
            let name = file.name().to_string();

            if !self.files.contains_key(&name) {
                tracing::debug!(file = %name, "received file descriptor");
                received.push(name.clone());
                self.requested.insert(name.clone());
                self.files.insert(name, file);
            }
        }

        let mut missing = Vec::new();
        for name in received {
            for import in &self.files[&name].dependency {
                if self.requested.insert(import.clone()) {
                    missing.push(import.clone());
                }
            }
        }

        Ok(missing)
    }

    fn finish(self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.files.into_values().collect(),
        }
    }
}

fn unexpected(expected: &'static str, answer: &MessageResponse) -> ReflectionError {
    let actual = match answer {
        MessageResponse::FileDescriptorResponse(_) => "file descriptors",
        MessageResponse::AllExtensionNumbersResponse(_) => "extension numbers",
        MessageResponse::ListServicesResponse(_) => "a service list",
        MessageResponse::ErrorResponse(_) => "an error",
    };

    ReflectionError::UnexpectedAnswer {
        expected,
        actual: actual.to_string(),
    }
}
