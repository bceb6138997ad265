use std::io::Write;
use std::net::SocketAddr;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use bank_windows::config::RosterConfig;
use bank_windows::session::messages::{
    CONTINUE_PROMPT, DEPOSIT_AMOUNT_PROMPT, DEPOSIT_SELECT_PROMPT, FAREWELL_MARKER, LABEL_PROMPT,
    MENU_PROMPT, PROMPT_MARKER, REJECTED, TARGET_PROMPT, WITHDRAW_SELECT_PROMPT,
};
use bank_windows::{AccountRegistry, Acceptor, Roster, WorkerPool};

async fn spawn_bank(roster: RosterConfig, windows: usize, queue_capacity: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let roster = Arc::new(Roster::new(roster));
    let registry = Arc::new(AccountRegistry::new(roster.identities().to_vec(), 5));
    let pool: Arc<WorkerPool<TcpStream>> =
        WorkerPool::start(windows, queue_capacity, registry, None);
    let acceptor = Acceptor::new(roster, pool);

    tokio::spawn(async move { acceptor.run(listener).await });
    addr
}

async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut text = String::new();
    let mut buf = [0u8; 1024];
    while !text.contains(needle) {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before {needle:?}; got {text:?}");
        text.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    text
}

/// Send one line and read everything up to and including the next prompt.
async fn answer(stream: &mut TcpStream, line: &str, prompt: &str) -> String {
    assert!(prompt.ends_with(PROMPT_MARKER));
    stream.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    read_until(stream, prompt).await
}

#[tokio::test]
async fn open_deposit_and_list_over_tcp() {
    let addr = spawn_bank(RosterConfig::default(), 5, 20).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let greeting = read_until(&mut stream, MENU_PROMPT).await;
    assert!(greeting.contains("Customer: pi200"));

    answer(&mut stream, "open account", LABEL_PROMPT).await;
    let text = answer(&mut stream, "Alpha", CONTINUE_PROMPT).await;
    assert!(text.contains("Your account is open!"));
    answer(&mut stream, "yes", MENU_PROMPT).await;

    answer(&mut stream, "deposit", TARGET_PROMPT).await;
    let text = answer(&mut stream, "pi200", DEPOSIT_SELECT_PROMPT).await;
    assert!(text.contains("1. Alpha"));
    answer(&mut stream, "1", DEPOSIT_AMOUNT_PROMPT).await;
    let text = answer(&mut stream, "100", CONTINUE_PROMPT).await;
    assert!(text.contains("New balance: 100"));
    answer(&mut stream, "yes", MENU_PROMPT).await;

    let text = answer(&mut stream, "withdraw", WITHDRAW_SELECT_PROMPT).await;
    assert!(text.contains("1. Alpha - balance: 100"));
}

#[tokio::test]
async fn unregistered_peer_is_rejected() {
    let roster = RosterConfig {
        dev_address: None,
        ..RosterConfig::default()
    };
    let addr = spawn_bank(roster, 5, 20).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut text = String::new();
    stream.read_to_string(&mut text).await.unwrap();
    assert_eq!(text, REJECTED);
}

#[tokio::test]
async fn queued_customer_is_served_after_the_window_frees() {
    let addr = spawn_bank(RosterConfig::default(), 1, 20).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    read_until(&mut first, MENU_PROMPT).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    let text = read_until(&mut second, "please wait").await;
    assert!(text.contains("number 1 in line"));

    answer(&mut first, "open account", LABEL_PROMPT).await;
    answer(&mut first, "Alpha", CONTINUE_PROMPT).await;
    first.write_all(b"no\n").await.unwrap();
    read_until(&mut first, FAREWELL_MARKER).await;

    let text = read_until(&mut second, MENU_PROMPT).await;
    assert!(text.contains("Window: 1"));

    // the account opened in the first session is visible to the second
    let text = answer(&mut second, "withdraw", WITHDRAW_SELECT_PROMPT).await;
    assert!(text.contains("1. Alpha - balance: 0"));
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_forwards_typed_answers() {
    let addr = spawn_bank(RosterConfig::default(), 5, 20).await;

    let output = tokio::task::spawn_blocking(move || {
        let mut child = Command::new(env!("CARGO_BIN_EXE_bank-relay"))
            .arg(addr.to_string())
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to run relay");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(b"open account\nAlpha\n\nno\n")
            .unwrap();
        child.wait_with_output().unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Customer: pi200"));
    assert!(stdout.contains("Bank: Alpha"));
    assert!(stdout.contains(FAREWELL_MARKER));
}
