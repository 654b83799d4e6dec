use std::net::TcpListener;

use anyhow::Context;

use crate::lines::LineReader;

use super::arg::ListenCommand;

/// Prints each line received, one connection at a time.
pub fn lines(args: &ListenCommand) -> anyhow::Result<()> {
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

        for line in LineReader::new(stream) {
            match line {
                Ok(line) => println!("{}", line),
                Err(error) => {
                    tracing::warn!(%error, "read failed");
                    break;
                }
            }
        }

        tracing::info!(?peer, "connection closed");
    }

    Ok(())
}
