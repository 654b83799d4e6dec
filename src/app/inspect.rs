use std::{
    io::Write,
    net::{Shutdown, TcpListener},
};

use anyhow::Context;

use crate::request::Request;

use super::arg::ListenCommand;

/// Parses one request per connection and prints it, one connection at a time.
pub fn inspect(args: &ListenCommand) -> anyhow::Result<()> {
    let listener = TcpListener::bind(args.address).context("binding listener failed")?;

    eprintln!("TCP server listening on {}", listener.local_addr()?);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(%error, "accept failed");
                continue;
            }
        };

        let peer = stream.peer_addr().ok();
        tracing::info!(?peer, "connection accepted");

        match Request::from_reader(&stream) {
            Ok(request) => {
                let mut stdout = std::io::stdout().lock();
                print_request(&mut stdout, &request)?;
                stdout.flush()?;
            }
            Err(error) => {
                tracing::warn!(%error, "could not read request");
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        tracing::info!(?peer, "connection closed");
    }

    Ok(())
}

fn print_request<W: Write>(mut output: W, request: &Request) -> std::io::Result<()> {
    writeln!(output, "Request line:")?;
    writeln!(output, "- Method: {}", request.method())?;
    writeln!(output, "- Target: {}", request.request_target())?;
    writeln!(output, "- Version: {}", request.request_line.http_version)?;
    writeln!(output, "Headers:")?;

    for (name, value) in &request.headers {
        writeln!(output, "- {}: {}", name, value)?;
    }

    if let Some(body) = &request.body {
        writeln!(output, "Body:")?;
        writeln!(output, "{}", String::from_utf8_lossy(body))?;
    }

    Ok(())
}
