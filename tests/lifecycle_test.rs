//! Load/unload behaviour: forced teardown, setup failures, close races.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ksock::lifecycle::{Module, ModuleError, ModuleHost, ServiceModule, WorkerError, WorkerState};
use ksock::net::{AddressFamily, Endpoint, Role, SocketError, SocketHandle};
use ksock::services::{TcpClient, TcpServer, UdpServer};

mod common;

const TEARDOWN_WINDOW: Duration = Duration::from_secs(2);

#[test]
fn test_unload_during_blocked_accept() {
    let mut server = common::load(TcpServer::new(Endpoint::localhost(0)));
    let socket = server.worker().and_then(|w| w.socket()).unwrap();

    // Let the worker settle into accept.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(server.state(), Some(WorkerState::Running));

    let started = Instant::now();
    server.on_unload();
    assert!(started.elapsed() < TEARDOWN_WINDOW, "unload took {:?}", started.elapsed());

    assert!(socket.is_closed());
    assert_eq!(socket.role(), Role::Closed);
    assert!(!server.is_active());
}

#[test]
fn test_unload_with_silent_connected_peer() {
    let mut server = common::load(TcpServer::new(Endpoint::localhost(0)));
    let addr = common::bound_endpoint(&server);

    // Connected but never sends, so the worker sits in the per-connection recv.
    let peer = SocketHandle::tcp(AddressFamily::Ipv4).unwrap();
    peer.connect(&addr).unwrap();
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    server.on_unload();
    assert!(started.elapsed() < TEARDOWN_WINDOW, "unload took {:?}", started.elapsed());
    assert!(!server.is_active());
}

#[test]
fn test_unload_during_blocked_recv_from() {
    let mut server = common::load(UdpServer::new(Endpoint::localhost(0)));
    let socket = server.worker().and_then(|w| w.socket()).unwrap();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    server.on_unload();
    assert!(started.elapsed() < TEARDOWN_WINDOW);
    assert!(socket.is_closed());
}

#[test]
fn test_port_released_after_unload() {
    let mut first = common::load(TcpServer::new(Endpoint::localhost(0)));
    let addr = common::bound_endpoint(&first);
    first.on_unload();

    let mut second = common::load(TcpServer::new(addr));
    assert_eq!(common::bound_endpoint(&second), addr);
    second.on_unload();
}

#[test]
fn test_bind_conflict_fails_load() {
    let mut holder = common::load(TcpServer::new(Endpoint::localhost(0)));
    let addr = common::bound_endpoint(&holder);

    let mut rival = ServiceModule::new(TcpServer::new(addr), common::fast_worker());
    let err = rival.on_load().unwrap_err();
    assert!(matches!(
        err,
        ModuleError::Worker(WorkerError::Setup(SocketError::Bind(_)))
    ));
    assert!(!rival.is_active());
    assert!(rival.worker().is_none());

    holder.on_unload();
}

#[test]
fn test_connect_refused_fails_load() {
    let scratch = SocketHandle::tcp(AddressFamily::Ipv4).unwrap();
    scratch.bind(&Endpoint::localhost(0)).unwrap();
    let dead = scratch.local_endpoint().unwrap();
    scratch.close();

    let mut client = ServiceModule::new(TcpClient::new(dead, "hi"), common::fast_worker());
    let err = client.on_load().unwrap_err();
    assert!(matches!(
        err,
        ModuleError::Worker(WorkerError::Setup(SocketError::Connect(_)))
    ));
}

#[test]
fn test_concurrent_close_race() {
    for _ in 0..20 {
        let socket = Arc::new(SocketHandle::tcp(AddressFamily::Ipv4).unwrap());
        socket.bind(&Endpoint::localhost(0)).unwrap();
        socket.listen(1).unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let closers: Vec<_> = (0..4)
            .map(|i| {
                let socket = Arc::clone(&socket);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if i % 2 == 0 {
                        socket.shutdown(std::net::Shutdown::Both);
                    }
                    socket.close();
                })
            })
            .collect();

        for closer in closers {
            closer.join().unwrap();
        }
        assert!(socket.is_closed());
        assert!(matches!(socket.accept(), Err(SocketError::Closed)));
    }
}

#[test]
fn test_host_unloads_in_reverse_order() {
    let mut host = ModuleHost::new();
    host.load_all(vec![
        Box::new(ServiceModule::new(TcpServer::new(Endpoint::localhost(0)), common::fast_worker())),
        Box::new(ServiceModule::new(UdpServer::new(Endpoint::localhost(0)), common::fast_worker())),
    ])
    .unwrap();
    assert_eq!(host.len(), 2);
    assert!(host.any_active());

    let started = Instant::now();
    host.unload_all();
    assert!(started.elapsed() < TEARDOWN_WINDOW * 2);
    assert!(host.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_host_goes_idle_when_client_finishes() {
    let scratch = SocketHandle::udp(AddressFamily::Ipv4).unwrap();
    scratch.bind(&Endpoint::localhost(0)).unwrap();
    let silent = scratch.local_endpoint().unwrap();

    let mut host = ModuleHost::new();
    let client = ksock::services::UdpClient::new(silent, "anyone?").with_timeout(Duration::from_millis(200));
    tokio::task::block_in_place(|| {
        host.load(Box::new(ServiceModule::new(client, common::fast_worker())))
    })
    .unwrap();

    let idle = tokio::time::timeout(Duration::from_secs(5), async {
        while host.any_active() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(idle.is_ok(), "client never finished");

    tokio::task::block_in_place(|| host.unload_all());
}
