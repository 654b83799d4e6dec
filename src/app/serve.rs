use std::{io::Write, path::PathBuf};

use anyhow::Context;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};

use crate::{
    request::Request,
    response::{ResponseWriter, StatusCode, default_headers},
    server::{Handler, HandlerError, Server, ServerConfig},
};

use super::arg::ServeCommand;

const PROXY_PREFIX: &str = "/httpbin";

const BAD_REQUEST_PAGE: &str = "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
";

const INTERNAL_SERVER_ERROR_PAGE: &str = "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
";

const OK_PAGE: &str = "<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
";

pub fn serve(args: &ServeCommand) -> anyhow::Result<()> {
    let config = ServerConfig {
        address: args.listen.address,
        reject_malformed: args.reject_malformed,
        max_header_length: args.max_header_length,
        max_body_length: args.max_body_length,
    };
    let handler = DemoHandler {
        video_file: args.video_file.clone(),
        upstream: args.upstream.clone(),
    };

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handler failed")?;
    let mut server = Server::bind(config, handler).context("starting server failed")?;

    eprintln!("Server started on {}", server.local_addr());

    if let Some(signal) = signals.forever().next() {
        tracing::info!(signal, "received signal");
    }

    server.close();
    eprintln!("Server gracefully stopped");

    Ok(())
}

#[derive(Debug)]
struct DemoHandler {
    video_file: PathBuf,
    upstream: String,
}

impl Handler for DemoHandler {
    fn handle(
        &self,
        request: &Request,
        writer: &mut ResponseWriter<&mut dyn Write>,
    ) -> Result<(), HandlerError> {
        let target = request.request_target();

        if let Some(path) = proxy_path(target) {
            return self.proxy(path, writer);
        }

        match target {
            "/video" => self.video(writer),
            "/yourproblem" => write_html(writer, StatusCode::BAD_REQUEST, BAD_REQUEST_PAGE),
            "/myproblem" => write_html(
                writer,
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_SERVER_ERROR_PAGE,
            ),
            _ => write_html(writer, StatusCode::OK, OK_PAGE),
        }
    }
}

impl DemoHandler {
    fn video(&self, writer: &mut ResponseWriter<&mut dyn Write>) -> Result<(), HandlerError> {
        let data = std::fs::read(&self.video_file).map_err(|error| {
            tracing::warn!(%error, path = ?self.video_file, "could not read video file");
            HandlerError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error reading video file: {}", error),
            )
        })?;

        let mut headers = default_headers(data.len());
        headers.set_override("Content-Type", "video/mp4");

        writer.write_status_line(StatusCode::OK)?;
        writer.write_headers(&headers)?;
        writer.write_body(&data)?;

        Ok(())
    }

    fn proxy(
        &self,
        path: &str,
        writer: &mut ResponseWriter<&mut dyn Write>,
    ) -> Result<(), HandlerError> {
        let path = if path.is_empty() { "/" } else { path };

        let mut response =
            crate::upstream::fetch(self.upstream.as_str(), &self.upstream, path).map_err(|error| {
                tracing::warn!(%error, upstream = %self.upstream, path, "upstream request failed");
                HandlerError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Proxy error: {}", error),
                )
            })?;

        let summary = response.forward_chunked(writer)?;

        tracing::info!(
            path,
            status_code = response.status_code().as_u16(),
            content_length = summary.content_length,
            "proxied"
        );

        Ok(())
    }
}

/// Returns the upstream path for `/httpbin` and `/httpbin/...` targets.
fn proxy_path(target: &str) -> Option<&str> {
    let path = target.strip_prefix(PROXY_PREFIX)?;

    if path.is_empty() || path.starts_with('/') {
        Some(path)
    } else {
        None
    }
}

fn write_html(
    writer: &mut ResponseWriter<&mut dyn Write>,
    status_code: StatusCode,
    page: &str,
) -> Result<(), HandlerError> {
    let mut headers = default_headers(page.len());
    headers.set_override("Content-Type", "text/html");

    writer.write_status_line(status_code)?;
    writer.write_headers(&headers)?;
    writer.write_body(page.as_bytes())?;

    Ok(())
}
