//! Connection dispatcher
//!
//! A [`Server`] accepts TCP connections on a background thread and serves
//! exactly one request per connection on its own thread. The connection is
//! closed after the response.
use std::{
    io::Write,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use crate::{
    error::GeneralError,
    request::{MAX_BODY_LENGTH, MAX_HEADER_LENGTH, Receiver, Request},
    response::{ResponseWriter, StatusCode, WriterState},
};

/// Settings for [`Server::bind()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub address: SocketAddr,
    /// Answer a request that fails to parse with `400 Bad Request` instead
    /// of closing the connection silently.
    pub reject_malformed: bool,
    /// Maximum length of the request line plus header section.
    pub max_header_length: usize,
    /// Largest `Content-Length` accepted for a request body.
    pub max_body_length: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 42069),
            reject_malformed: false,
            max_header_length: MAX_HEADER_LENGTH,
            max_body_length: MAX_BODY_LENGTH,
        }
    }
}

/// Error reported by a [`Handler`] to be sent as a plain text response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler error {status_code}: {message}")]
pub struct HandlerError {
    pub status_code: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new<S: Into<String>>(status_code: StatusCode, message: S) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl From<GeneralError> for HandlerError {
    fn from(value: GeneralError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(value: std::io::Error) -> Self {
        GeneralError::from(value).into()
    }
}

/// Produces the response for a request.
///
/// The handler either writes the complete response with the writer or
/// returns a [`HandlerError`] without writing anything.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        request: &Request,
        writer: &mut ResponseWriter<&mut dyn Write>,
    ) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut ResponseWriter<&mut dyn Write>) -> Result<(), HandlerError>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        request: &Request,
        writer: &mut ResponseWriter<&mut dyn Write>,
    ) -> Result<(), HandlerError> {
        self(request, writer)
    }
}

struct Shared<H: Handler> {
    config: ServerConfig,
    handler: H,
}

/// Handle to a listening server.
///
/// Dropping the handle closes the listener.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds the listener and starts accepting connections.
    pub fn bind<H: Handler>(config: ServerConfig, handler: H) -> Result<Self, GeneralError> {
        let listener = TcpListener::bind(config.address)?;
        let local_addr = listener.local_addr()?;
        let closed = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared { config, handler });

        let accept_thread = {
            let closed = closed.clone();

            std::thread::Builder::new()
                .name(format!("accept {}", local_addr))
                .spawn(move || accept_loop(listener, closed, shared))?
        };

        tracing::info!(%local_addr, "listening");

        Ok(Self {
            local_addr,
            closed,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting connections and waits for the accept thread to exit.
    ///
    /// Connections already accepted are served to completion.
    pub fn close(&mut self) {
        let Some(accept_thread) = self.accept_thread.take() else {
            return;
        };

        self.closed.store(true, Ordering::SeqCst);

        // Unblock accept() so the loop observes the flag.
        match TcpStream::connect(wake_address(self.local_addr)) {
            Ok(_stream) => {
                if accept_thread.join().is_err() {
                    tracing::error!("accept thread panicked");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "could not wake accept thread");
            }
        }

        tracing::info!(local_addr = %self.local_addr, "closed");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}

fn wake_address(local_addr: SocketAddr) -> SocketAddr {
    match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local_addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local_addr.port())
        }
        _ => local_addr,
    }
}

fn accept_loop<H: Handler>(listener: TcpListener, closed: Arc<AtomicBool>, shared: Arc<Shared<H>>) {
    for stream in listener.incoming() {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(%error, "accept failed");
                continue;
            }
        };

        let shared = shared.clone();

        if let Err(error) = std::thread::Builder::new()
            .name("connection".to_string())
            .spawn(move || handle_connection(stream, &shared))
        {
            tracing::error!(%error, "could not spawn connection thread");
        }
    }

    tracing::debug!("accept loop exited");
}

fn handle_connection<H: Handler>(mut stream: TcpStream, shared: &Shared<H>) {
    let peer = stream.peer_addr().ok();
    let span = tracing::debug_span!("connection", ?peer);
    let _guard = span.enter();

    tracing::debug!("accepted");

    let receiver = Receiver::new()
        .with_max_header_length(shared.config.max_header_length)
        .with_max_body_length(shared.config.max_body_length);

    match Request::from_reader_with_receiver(&stream, receiver) {
        Ok(request) => serve_request(&mut stream, &request, &shared.handler),
        Err(error) => {
            tracing::debug!(%error, "could not read request");

            if shared.config.reject_malformed && !error.is_io() {
                reject(&mut stream, &error);
            }
        }
    }

    if let Err(error) = stream.shutdown(Shutdown::Write) {
        tracing::trace!(%error, "shutdown");
    }

    tracing::debug!("closed");
}

fn serve_request<H: Handler>(stream: &mut TcpStream, request: &Request, handler: &H) {
    tracing::debug!(
        method = request.method(),
        target = request.request_target(),
        "serving request"
    );

    let mut writer = ResponseWriter::new(stream as &mut dyn Write);

    match handler.handle(request, &mut writer) {
        Ok(()) => {
            if writer.state() != WriterState::BodyWritten {
                tracing::warn!(state = ?writer.state(), "handler left response incomplete");
            }
        }
        Err(error) if writer.state() == WriterState::Initial => {
            tracing::debug!(%error, "handler error");

            if let Err(error) = writer.write_plain_response(error.status_code, &error.message) {
                tracing::debug!(%error, "could not write handler error");
            }
        }
        Err(error) => {
            tracing::warn!(
                %error,
                state = ?writer.state(),
                "handler failed after response started"
            );
        }
    }
}

fn reject(stream: &mut TcpStream, error: &GeneralError) {
    let mut writer = ResponseWriter::new(stream);
    let body = format!("{}\n", error);

    if let Err(error) = writer.write_plain_response(StatusCode::BAD_REQUEST, &body) {
        tracing::debug!(%error, "could not write rejection");
    }
}
