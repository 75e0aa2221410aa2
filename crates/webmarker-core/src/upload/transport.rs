//! HTTP transport for the media protocol.

use crate::storage::BoxFuture;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Value of one multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// Ordered multipart form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    fields: Vec<FormField>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    pub fn file(mut self, name: &str, filename: &str, mime: &str, bytes: Vec<u8>) -> Self {
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::File {
                filename: filename.to_string(),
                mime: mime.to_string(),
                bytes,
            },
        });
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// First text value named `name`.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|field| match &field.value {
            FormValue::Text(value) if field.name == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Encode as `multipart/form-data` with the given boundary.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        for field in &self.fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match &field.value {
                FormValue::Text(value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            field.name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                FormValue::File {
                    filename,
                    mime,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            field.name, filename, mime
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }
}

/// Status and body of a completed request, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request to {path} failed: {message}")]
pub struct TransportError {
    pub path: String,
    pub message: String,
}

/// Sends protocol requests to the remote media service.
pub trait MediaTransport: Send + Sync {
    /// POST `form` to `path`, relative to the service base URL.
    fn post_form(
        &self,
        path: &str,
        form: Form,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;

    /// Wait between uploads.
    fn pause(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Blocking `ureq` transport.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    /// Session cookie of a logged-in user, sent verbatim.
    cookie: Option<String>,
}

impl UreqTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::agent(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(&self, path: &str, form: &Form) -> Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let boundary = format!("----WebMarkerBoundary{}", Uuid::new_v4().simple());
        let body = form.encode(&boundary);

        let mut request = self
            .agent
            .post(&url)
            .set("Content-Type", &format!("multipart/form-data; boundary={boundary}"));
        if let Some(cookie) = &self.cookie {
            request = request.set("Cookie", cookie);
        }

        let failed = |message: String| TransportError {
            path: path.to_string(),
            message,
        };
        let response = match request.send_bytes(&body) {
            Ok(response) => response,
            // Non-2xx statuses still carry a body the protocol wants to see
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(failed(e.to_string())),
        };
        let status = response.status();
        let body = response.into_string().map_err(|e| failed(e.to_string()))?;
        log::debug!("POST {} -> {} ({} bytes)", path, status, body.len());
        Ok(TransportResponse { status, body })
    }
}

impl MediaTransport for UreqTransport {
    fn post_form(
        &self,
        path: &str,
        form: Form,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let path = path.to_string();
        Box::pin(async move { self.send(&path, &form) })
    }

    fn pause(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move { std::thread::sleep(duration) })
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<(String, Form)>>,
        pauses: Mutex<Vec<Duration>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(&self, status: u16, body: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(TransportResponse::new(status, body)));
            self
        }

        pub(crate) fn fail(&self, message: &str) -> &Self {
            self.responses.lock().unwrap().push_back(Err(TransportError {
                path: String::new(),
                message: message.to_string(),
            }));
            self
        }

        pub(crate) fn paths(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(path, _)| path.clone()).collect()
        }

        pub(crate) fn form(&self, index: usize) -> Form {
            self.calls.lock().unwrap()[index].1.clone()
        }

        pub(crate) fn pauses(&self) -> Vec<Duration> {
            self.pauses.lock().unwrap().clone()
        }
    }

    impl MediaTransport for ScriptedTransport {
        fn post_form(
        &self,
        path: &str,
        form: Form,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
            self.calls.lock().unwrap().push((path.to_string(), form));
            let next = self.responses.lock().unwrap().pop_front();
            let path = path.to_string();
            Box::pin(async move {
                next.unwrap_or_else(|| {
                    Err(TransportError {
                        path,
                        message: "no scripted response".to_string(),
                    })
                })
            })
        }

        fn pause(&self, duration: Duration) -> BoxFuture<'_, ()> {
            self.pauses.lock().unwrap().push(duration);
            Box::pin(async {})
        }
    }
}
