use std::{net::SocketAddr, path::PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[clap(long, default_value = "info")]
    pub log_level: super::logging::Level,

    /// Append log messages to this file instead of standard error.
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Format log messages as JSON.
    #[clap(long)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the demo routes until interrupted.
    Serve(ServeCommand),
    /// Print every line received on each connection.
    Lines(ListenCommand),
    /// Print the request line and headers of one request per connection.
    Inspect(ListenCommand),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListenCommand {
    #[clap(long, default_value = "0.0.0.0:42069")]
    pub address: SocketAddr,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeCommand {
    #[command(flatten)]
    pub listen: ListenCommand,

    /// Answer malformed requests with 400 Bad Request instead of closing.
    #[clap(long)]
    pub reject_malformed: bool,

    #[clap(long, default_value_t = crate::request::MAX_HEADER_LENGTH)]
    pub max_header_length: usize,

    /// Largest request body accepted, in bytes.
    #[clap(long, default_value_t = crate::request::MAX_BODY_LENGTH)]
    pub max_body_length: u64,

    /// File served at `/video`.
    #[clap(long, default_value = "assets/vim.mp4")]
    pub video_file: PathBuf,

    /// Plain HTTP server that `/httpbin/` requests are forwarded to.
    #[clap(long, default_value = "httpbin.org:80")]
    pub upstream: String,
}
