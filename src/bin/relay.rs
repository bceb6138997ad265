//! Interactive terminal client: prints what the bank sends and forwards one
//! typed line whenever the bank asks for input.

use std::env;
use std::io;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use bank_windows::session::MAX_LINE_BYTES;
use bank_windows::session::messages::{CLOSING_MARKER, FAREWELL_MARKER, PROMPT_MARKER};

const DEFAULT_SERVER: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    match relay(&addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(addr, reason = %e, "connection to the bank failed");
            ExitCode::FAILURE
        }
    }
}

async fn relay(addr: &str) -> io::Result<()> {
    let stream = TcpStream::connect(addr).await?;
    info!(addr, "connected");
    let (mut reader, mut writer) = stream.into_split();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    // unfinished line of server text, kept so markers split across reads match
    let mut pending = String::new();
    let mut buf = vec![0u8; MAX_LINE_BYTES as usize];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            stdout.write_all(b"\nThe bank closed the connection.\n").await?;
            stdout.flush().await?;
            return Ok(());
        }

        let chunk = String::from_utf8_lossy(&buf[..n]);
        stdout.write_all(chunk.as_bytes()).await?;
        stdout.flush().await?;
        pending.push_str(&chunk);

        if pending.contains(FAREWELL_MARKER) || pending.contains(CLOSING_MARKER) {
            return Ok(());
        }

        if pending.ends_with(PROMPT_MARKER) {
            pending.clear();
            let Some(answer) = next_answer(&mut stdin, &mut stdout).await? else {
                return Ok(());
            };
            writer.write_all(answer.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        } else if let Some(end) = pending.rfind('\n') {
            pending.drain(..=end);
        }
    }
}

/// Next non-empty line typed by the user, or `None` once stdin is closed.
async fn next_answer(
    stdin: &mut Lines<BufReader<Stdin>>,
    stdout: &mut Stdout,
) -> io::Result<Option<String>> {
    loop {
        let Some(line) = stdin.next_line().await? else {
            return Ok(None);
        };
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
        stdout.write_all(b"(please type an answer): ").await?;
        stdout.flush().await?;
    }
}
