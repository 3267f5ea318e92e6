mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Outcome, connection};
use junos_session::error::{ConnectError, TransportError};
use junos_session::session::Mode;
use tokio::sync::oneshot::error::TryRecvError;

#[tokio::test]
async fn shell_command_returns_stdout() {
    let (conn, stub) = connection(Mode::Shell);
    stub.set_exec_reply("show version", "<rpc-reply/>");

    let raw = conn.run_command("show version").await.expect("run");

    assert_eq!(raw, b"<rpc-reply/>");
    assert_eq!(stub.exec_commands(), vec!["show version".to_string()]);
}

#[tokio::test]
async fn shell_execution_failure_is_command_failed() {
    let (conn, stub) = connection(Mode::Shell);
    stub.exec_error.store(true, Ordering::SeqCst);

    let err = conn.run_command("show bogus").await.unwrap_err();

    assert!(matches!(
        err,
        ConnectError::CommandFailed(TransportError::ExitStatus { status: 1, .. })
    ));
    assert!(conn.is_connected());
}

#[tokio::test]
async fn shell_without_transport_is_not_connected() {
    let (conn, stub) = connection(Mode::Shell);
    conn.terminate().await;

    let err = conn.run_command("show version").await.unwrap_err();

    assert!(matches!(err, ConnectError::NotConnected));
    assert!(stub.exec_commands().is_empty());
}

#[tokio::test]
async fn netconf_without_transport_never_opens_a_session() {
    let (conn, stub) = connection(Mode::Netconf);
    conn.terminate().await;

    for _ in 0..3 {
        let err = conn.run_command("get-alarm-information").await.unwrap_err();
        assert!(matches!(err, ConnectError::NotConnected));
    }

    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 0);
    assert!(!conn.has_rpc_session().await);
}

#[tokio::test]
async fn netconf_session_is_opened_lazily_and_reused() {
    let (conn, stub) = connection(Mode::Netconf);
    stub.set_rpc_reply("get-alarm-information", "<alarm-information/>");
    assert!(!conn.has_rpc_session().await);

    let body = conn.run_command("get-alarm-information").await.expect("first");
    assert_eq!(body, b"<alarm-information/>");
    conn.run_command("get-software-information")
        .await
        .expect("second");

    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 1);
    assert_eq!(
        stub.rpc_names(),
        vec!["get-alarm-information", "get-software-information"]
    );
    assert!(conn.has_rpc_session().await);
}

#[tokio::test]
async fn end_of_stream_drops_session_and_next_call_reopens() {
    let (conn, stub) = connection(Mode::Netconf);
    stub.script(Outcome::Eof);
    stub.script(Outcome::Reply(b"<alarm-information/>".to_vec()));

    let err = conn.run_command("get-alarm-information").await.unwrap_err();
    assert!(matches!(err, ConnectError::SessionLost(TransportError::Eof)));
    assert!(!conn.has_rpc_session().await);
    assert_eq!(stub.session_closes.load(Ordering::SeqCst), 1);

    let body = conn.run_command("get-alarm-information").await.expect("retry");
    assert_eq!(body, b"<alarm-information/>");
    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn other_rpc_failures_keep_the_session() {
    let (conn, stub) = connection(Mode::Netconf);
    stub.script(Outcome::Fail("syntax error".to_string()));

    let err = conn.run_command("get-bogus-information").await.unwrap_err();
    assert!(matches!(
        err,
        ConnectError::CommandFailed(TransportError::Rpc(ref message)) if message == "syntax error"
    ));
    assert!(conn.has_rpc_session().await);

    conn.run_command("get-alarm-information").await.expect("next");
    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_setup_failure_leaves_manager_usable() {
    let (conn, stub) = connection(Mode::Netconf);
    stub.fail_session_setup.store(true, Ordering::SeqCst);

    let err = conn.run_command("get-alarm-information").await.unwrap_err();
    assert!(matches!(err, ConnectError::SessionSetupFailed(_)));
    assert!(!conn.has_rpc_session().await);

    stub.fail_session_setup.store(false, Ordering::SeqCst);
    conn.run_command("get-alarm-information").await.expect("after setup recovers");
    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_rpc_times_out_and_keeps_session() {
    let (conn, stub) = connection(Mode::Netconf);
    stub.script(Outcome::Hang);

    let err = conn.run_command("get-route-information").await.unwrap_err();
    assert!(matches!(err, ConnectError::Timeout(d) if d == Duration::from_secs(15)));
    assert!(conn.has_rpc_session().await);

    conn.run_command("get-alarm-information").await.expect("after timeout");
    assert_eq!(stub.sessions_opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_never_overlap() {
    let (conn, stub) = connection(Mode::Shell);
    *stub.exec_delay.lock().unwrap() = Some(Duration::from_millis(5));

    let mut handles = Vec::new();
    for i in 0..16 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move {
            conn.run_command(&format!("show interfaces ge-0/0/{i}")).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("run");
    }

    assert_eq!(stub.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(stub.exec_commands().len(), 16);
}

#[tokio::test]
async fn close_disconnects_once_and_notifies_once() {
    let (conn, stub) = connection(Mode::Shell);
    let mut notifier = conn.close_notifier().expect("first receiver");
    assert!(conn.close_notifier().is_none());

    conn.close().await;
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert!(notifier.try_recv().is_ok());
    assert!(!conn.is_connected());

    conn.close().await;
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert!(matches!(notifier.try_recv(), Err(TryRecvError::Closed)));
}

#[tokio::test]
async fn close_without_listener_does_not_block() {
    let (conn, _stub) = connection(Mode::Shell);
    drop(conn.close_notifier());

    conn.close().await;
    conn.close().await;

    let err = conn.run_command("show version").await.unwrap_err();
    assert!(matches!(err, ConnectError::NotConnected));
}

#[tokio::test]
async fn close_shuts_netconf_session_before_transport() {
    let (conn, stub) = connection(Mode::Netconf);
    conn.run_command("get-alarm-information").await.expect("run");

    conn.close().await;

    assert_eq!(stub.session_closes.load(Ordering::SeqCst), 1);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert!(!conn.has_rpc_session().await);
}

#[tokio::test(start_paused = true)]
async fn close_gives_up_on_a_wedged_device() {
    let (conn, stub) = connection(Mode::Netconf);
    let mut notifier = conn.close_notifier().expect("receiver");
    conn.run_command("get-alarm-information").await.expect("run");
    stub.hang_session_close.store(true, Ordering::SeqCst);
    stub.hang_disconnect.store(true, Ordering::SeqCst);

    let closing = tokio::spawn({
        let conn = conn.clone();
        async move { conn.close().await }
    });
    while stub.session_closes.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::timeout(Duration::from_secs(3600), conn.terminate())
        .await
        .expect("terminate is not blocked by a hanging close");
    closing.await.expect("join");

    assert_eq!(stub.session_closes.load(Ordering::SeqCst), 1);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 1);
    assert!(notifier.try_recv().is_ok());
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn terminate_drops_transport_and_session_without_notifying() {
    let (conn, stub) = connection(Mode::Netconf);
    let mut notifier = conn.close_notifier().expect("receiver");
    conn.run_command("get-alarm-information").await.expect("run");

    conn.terminate().await;

    assert!(!conn.is_connected());
    assert!(!conn.has_rpc_session().await);
    assert_eq!(stub.drops.load(Ordering::SeqCst), 1);
    assert_eq!(stub.disconnects.load(Ordering::SeqCst), 0);
    assert!(matches!(notifier.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn every_attempt_updates_last_used() {
    let (conn, _stub) = connection(Mode::Shell);
    conn.terminate().await;
    let before = conn.last_used().await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let _ = conn.run_command("show version").await;

    assert!(conn.last_used().await > before);
}

#[tokio::test]
async fn mode_and_device_are_exposed() {
    let (conn, _stub) = connection(Mode::Netconf);

    assert_eq!(conn.mode(), Mode::Netconf);
    assert_eq!(conn.host(), "router1");
    assert_eq!(conn.device().addr(), "exporter@router1:22");
    assert!(conn.is_connected());
}
