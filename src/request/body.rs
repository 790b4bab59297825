use bytes::{Bytes, BytesMut};
use std::fmt;
use tokio::sync::mpsc;

use crate::error::{Disconnected, Error, HttpError};

/// Request body, read lazily from the host.
///
/// The body can be read once, the collected bytes are cached so every later read observes the
/// same content.
pub struct Body {
    repr: Repr,
    cached: Option<Bytes>,
}

enum Repr {
    Empty,
    Full(Bytes),
    Channel(mpsc::Receiver<Result<Bytes, Disconnected>>),
    #[cfg(feature = "server")]
    Hyper(hyper::body::Incoming),
    Done,
}

impl Body {
    /// Body without content.
    pub fn empty() -> Self {
        Self { repr: Repr::Empty, cached: None }
    }

    /// Body with content already in memory.
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        Self { repr: Repr::Full(bytes.into()), cached: None }
    }

    /// Body streamed by the host through the returned [`BodySender`].
    ///
    /// Dropping the sender ends the body.
    pub fn channel(buffer: usize) -> (BodySender, Body) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (BodySender { tx }, Self { repr: Repr::Channel(rx), cached: None })
    }

    #[cfg(feature = "server")]
    pub(crate) fn hyper(incoming: hyper::body::Incoming) -> Self {
        Self { repr: Repr::Hyper(incoming), cached: None }
    }

    /// Read the next chunk, `None` when the body is complete.
    ///
    /// Chunks are not cached, mixing this with [`Body::collect`] only collects what is left.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match &mut self.repr {
            Repr::Empty | Repr::Done => Ok(None),
            Repr::Full(bytes) => {
                let bytes = std::mem::take(bytes);
                self.repr = Repr::Done;
                Ok(Some(bytes))
            }
            Repr::Channel(rx) => match rx.recv().await {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(disconnected)) => {
                    self.repr = Repr::Done;
                    Err(disconnected.into())
                }
                None => {
                    self.repr = Repr::Done;
                    Ok(None)
                }
            },
            #[cfg(feature = "server")]
            Repr::Hyper(incoming) => {
                use http_body_util::BodyExt;

                loop {
                    match incoming.frame().await {
                        Some(Ok(frame)) => match frame.into_data() {
                            Ok(data) => return Ok(Some(data)),
                            // trailers
                            Err(_) => continue,
                        },
                        Some(Err(err)) => {
                            self.repr = Repr::Done;
                            if err.is_incomplete_message() || err.is_canceled() || err.is_closed() {
                                return Err(Disconnected.into());
                            }
                            return Err(HttpError::bad_request()
                                .with_description(err.to_string())
                                .into());
                        }
                        None => {
                            self.repr = Repr::Done;
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Read the whole body.
    pub async fn collect(&mut self) -> Result<Bytes, Error> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let bytes = match &mut self.repr {
            Repr::Full(bytes) => std::mem::take(bytes),
            _ => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = self.chunk().await? {
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        };
        self.repr = Repr::Done;
        self.cached = Some(bytes.clone());
        Ok(bytes)
    }

    /// Returns `true` if the body is known to be empty without reading it.
    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Empty => true,
            Repr::Full(bytes) => bytes.is_empty(),
            Repr::Done => self.cached.as_ref().is_none_or(Bytes::is_empty),
            _ => false,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match &self.repr {
            Repr::Empty => "Empty",
            Repr::Full(_) => "Full",
            Repr::Channel(_) => "Channel",
            #[cfg(feature = "server")]
            Repr::Hyper(_) => "Hyper",
            Repr::Done => "Done",
        };
        f.debug_struct("Body")
            .field("repr", &repr)
            .field("cached", &self.cached.as_ref().map(Bytes::len))
            .finish()
    }
}

/// Host side of a streamed [`Body`].
#[derive(Debug, Clone)]
pub struct BodySender {
    tx: mpsc::Sender<Result<Bytes, Disconnected>>,
}

impl BodySender {
    /// Deliver a chunk.
    ///
    /// Fails if the request side was dropped.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), Disconnected> {
        self.tx.send(Ok(chunk.into())).await.map_err(|_| Disconnected)
    }

    /// Signal that the client disconnected, the pending read fails with
    /// [`Error::Disconnected`].
    pub async fn abort(self) {
        let _ = self.tx.send(Err(Disconnected)).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn streamed_body_is_cached() {
        let (tx, mut body) = Body::channel(4);
        tokio::spawn(async move {
            tx.send("hello ").await.unwrap();
            tx.send("world").await.unwrap();
        });
        assert_eq!(body.collect().await.unwrap(), "hello world");
        assert_eq!(body.collect().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn abort_is_a_disconnect() {
        let (tx, mut body) = Body::channel(1);
        tx.send("partial").await.unwrap();
        tokio::spawn(tx.abort());
        let err = body.collect().await.unwrap_err();
        assert!(err.is_disconnected());
    }
}
