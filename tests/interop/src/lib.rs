//! Loopback tests for polarssl-rs.
//! A rustls server runs on a thread; the session under test connects to it over TCP.

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use polarssl_crypto::CtrDrbg;
    use polarssl_tls::config::{parse_certificates, parse_private_key};
    use polarssl_tls::{
        codes, AuthMode, SessionState, SslError, SslOptions, SslSession, VerifyStatus,
    };
    use rustls::server::WebPkiClientVerifier;
    use rustls::{ServerConfig, ServerConnection, StreamOwned};

    const CA: &str = include_str!("../../vectors/certs/ca.pem");
    const SERVER_CERT: &str = include_str!("../../vectors/certs/server.pem");
    const SERVER_KEY: &str = include_str!("../../vectors/certs/server.key");
    const CLIENT_CERT: &str = include_str!("../../vectors/certs/client.pem");
    const CLIENT_KEY: &str = include_str!("../../vectors/certs/client.key");
    const UNTRUSTED_CERT: &str = include_str!("../../vectors/certs/untrusted.pem");
    const UNTRUSTED_KEY: &str = include_str!("../../vectors/certs/untrusted.key");

    type TlsStream = StreamOwned<ServerConnection, TcpStream>;

    fn server_config(cert: &str, key: &str, require_client_cert: bool) -> Arc<ServerConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let chain = parse_certificates(cert, "server").unwrap();
        let key = parse_private_key(key).unwrap();
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .unwrap();
        let builder = if require_client_cert {
            let ca = parse_certificates(CA, "ca").unwrap();
            let roots = Arc::new(polarssl_tls::verify::root_store(&ca).unwrap());
            let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider)
                .build()
                .unwrap();
            builder.with_client_cert_verifier(verifier)
        } else {
            builder.with_no_client_auth()
        };
        let mut config = builder.with_single_cert(chain, key).unwrap();
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Arc::new(config)
    }

    /// Accept one TLS connection and hand it to `serve` on a new thread.
    fn spawn_tls_server<F>(config: Arc<ServerConfig>, serve: F) -> (SocketAddr, JoinHandle<()>)
    where
        F: FnOnce(&mut TlsStream) + Send + 'static,
    {
        spawn_tcp_server(move |sock| {
            let conn = ServerConnection::new(config).unwrap();
            let mut stream = StreamOwned::new(conn, sock);
            serve(&mut stream);
        })
    }

    fn spawn_tcp_server<F>(serve: F) -> (SocketAddr, JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            serve(sock);
        });
        (addr, handle)
    }

    /// Echo one message, then close_notify.
    fn echo_once(stream: &mut TlsStream) {
        let mut buf = [0u8; 1024];
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(_) => return,
        };
        let _ = stream.write_all(&buf[..n]);
        stream.conn.send_close_notify();
        let _ = stream.flush();
    }

    /// Finish the handshake, then ignore the client until it hangs up.
    fn handshake_then_idle(stream: &mut TlsStream) {
        let mut buf = [0u8; 64];
        while let Ok(n) = stream.read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }

    fn test_drbg() -> Arc<CtrDrbg> {
        Arc::new(CtrDrbg::from_seed_material(&[0x5a; 48], &[0xa5; 16], b"interop").unwrap())
    }

    fn session(options: SslOptions, mode: AuthMode, addr: SocketAddr) -> SslSession {
        let mut ssl = SslSession::with_options(options);
        ssl.set_authmode(mode).unwrap();
        ssl.set_rng(test_drbg()).unwrap();
        ssl.set_socket(TcpStream::connect(addr).unwrap()).unwrap();
        assert_eq!(ssl.state(), SessionState::Configured);
        ssl
    }

    fn trusting() -> SslOptions {
        SslOptions::builder()
            .ca_chain(CA)
            .hostname("localhost")
            .build()
            .unwrap()
    }

    #[test]
    fn test_blocking_handshake_and_echo() {
        let (addr, server) = spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), echo_once);
        let options = SslOptions::builder()
            .ca_chain(CA)
            .hostname("localhost")
            .alpn_protocols(["http/1.1"])
            .build()
            .unwrap();
        let mut ssl = session(options, AuthMode::Required, addr);
        assert!(ssl.is_blocking());
        assert!(ssl.fileno().is_some());

        ssl.handshake().unwrap();
        assert_eq!(ssl.state(), SessionState::Established);
        assert_eq!(ssl.verify_result(), VerifyStatus::Passed);
        assert_eq!(ssl.alpn_protocol(), Some(&b"http/1.1"[..]));
        assert!(ssl.protocol_version().is_some());
        assert!(ssl.cipher_suite().is_some());

        assert_eq!(ssl.write(b"ping over tls").unwrap(), 13);
        let mut echoed = Vec::new();
        while let Some(chunk) = ssl.read(4).unwrap() {
            assert!(chunk.len() <= 4);
            echoed.extend_from_slice(&chunk);
        }
        assert_eq!(echoed, b"ping over tls");
        assert!(ssl.is_eof());
        assert!(matches!(ssl.read(4), Err(SslError::EndOfStream)));

        ssl.close_notify().unwrap();
        assert_eq!(ssl.state(), SessionState::CloseNotified);
        ssl.close().unwrap();
        assert_eq!(ssl.state(), SessionState::Closed);
        server.join().unwrap();
    }

    #[test]
    fn test_nonblocking_socket_with_hook() {
        let (addr, server) = spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), echo_once);
        let sock = TcpStream::connect(addr).unwrap();
        sock.set_nonblocking(true).unwrap();

        let mut ssl = SslSession::with_options(trusting());
        ssl.set_rng(test_drbg()).unwrap();
        ssl.set_socket(sock).unwrap();
        assert!(!ssl.is_blocking());

        let mut cycles = 0u32;
        ssl.handshake_with(|_| {
            cycles += 1;
            Ok(())
        })
        .unwrap();
        assert!(cycles > 0);

        ssl.write(b"hello").unwrap();
        let mut got = Vec::new();
        while let Some(chunk) = ssl.read_with(1024, |_| Ok(())).unwrap() {
            got.extend_from_slice(&chunk);
        }
        assert_eq!(got, b"hello");
        ssl.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_optional_records_untrusted_certificate() {
        let (addr, server) =
            spawn_tls_server(server_config(UNTRUSTED_CERT, UNTRUSTED_KEY, false), echo_once);
        let mut ssl = session(trusting(), AuthMode::Optional, addr);

        ssl.handshake().unwrap();
        assert!(matches!(ssl.verify_result(), VerifyStatus::Failed(_)));

        ssl.write(b"still talking").unwrap();
        assert_eq!(ssl.read(64).unwrap().unwrap(), b"still talking");
        ssl.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_required_rejects_untrusted_certificate() {
        let (addr, server) =
            spawn_tls_server(server_config(UNTRUSTED_CERT, UNTRUSTED_KEY, false), echo_once);
        let mut ssl = session(trusting(), AuthMode::Required, addr);

        let err = ssl.handshake().unwrap_err();
        assert_eq!(err.code(), Some(codes::X509_CERT_VERIFY_FAILED));
        assert_eq!(ssl.state(), SessionState::Failed);
        assert!(matches!(ssl.verify_result(), VerifyStatus::Failed(_)));
        assert!(matches!(ssl.write(b"x"), Err(SslError::InvalidState { .. })));

        drop(ssl);
        server.join().unwrap();
    }

    #[test]
    fn test_none_accepts_untrusted_certificate() {
        let (addr, server) =
            spawn_tls_server(server_config(UNTRUSTED_CERT, UNTRUSTED_KEY, false), echo_once);
        let mut ssl = session(trusting(), AuthMode::None, addr);

        ssl.handshake().unwrap();
        assert_eq!(ssl.verify_result(), VerifyStatus::Skipped);
        ssl.close().unwrap();
        drop(ssl);
        server.join().unwrap();
    }

    #[test]
    fn test_hostname_mismatch_is_fatal_when_required() {
        let (addr, server) = spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), echo_once);
        let options = SslOptions::builder()
            .ca_chain(CA)
            .hostname("not-localhost.example")
            .build()
            .unwrap();
        let mut ssl = session(options, AuthMode::Required, addr);

        let err = ssl.handshake().unwrap_err();
        assert_eq!(err.code(), Some(codes::X509_CERT_VERIFY_FAILED));
        drop(ssl);
        server.join().unwrap();
    }

    #[test]
    fn test_client_certificate_is_presented() {
        let (tx, rx) = mpsc::channel();
        let (addr, server) = spawn_tls_server(
            server_config(SERVER_CERT, SERVER_KEY, true),
            move |stream| {
                echo_once(stream);
                let presented = stream
                    .conn
                    .peer_certificates()
                    .map(|certs| certs.len())
                    .unwrap_or(0);
                tx.send(presented).unwrap();
            },
        );
        let options = SslOptions::builder()
            .ca_chain(CA)
            .hostname("localhost")
            .client_cert(CLIENT_CERT)
            .client_key(CLIENT_KEY)
            .build()
            .unwrap();
        let mut ssl = session(options, AuthMode::Required, addr);

        ssl.handshake().unwrap();
        ssl.write(b"mutual").unwrap();
        assert_eq!(ssl.read(64).unwrap().unwrap(), b"mutual");
        server.join().unwrap();
        assert!(rx.recv().unwrap() >= 1);
        ssl.close().unwrap();
    }

    #[test]
    fn test_non_tls_peer_fails_handshake() {
        let (addr, server) = spawn_tcp_server(|mut sock| {
            let mut hello = [0u8; 4096];
            let _ = sock.read(&mut hello);
            let _ = sock.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
            // hold the socket until the client hangs up
            let mut rest = Vec::new();
            let _ = sock.read_to_end(&mut rest);
        });
        let mut ssl = session(trusting(), AuthMode::Required, addr);

        let err = ssl.handshake().unwrap_err();
        assert!(matches!(err, SslError::Handshake { .. }));
        assert_eq!(ssl.state(), SessionState::Failed);
        ssl.close().unwrap();
        assert_eq!(ssl.state(), SessionState::Failed);

        drop(ssl);
        server.join().unwrap();
    }

    #[test]
    fn test_peer_hangs_up_during_handshake() {
        let (addr, server) = spawn_tcp_server(|mut sock| {
            let mut hello = [0u8; 4096];
            let _ = sock.read(&mut hello);
        });
        let mut ssl = session(trusting(), AuthMode::Required, addr);

        let err = ssl.handshake().unwrap_err();
        assert!(matches!(
            err.code(),
            Some(codes::SSL_CONN_EOF) | Some(codes::NET_RECV_FAILED)
        ));
        assert_eq!(ssl.state(), SessionState::Failed);
        server.join().unwrap();
    }

    #[test]
    fn test_silent_peer_aborted_by_hook_then_resumed() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let config = server_config(SERVER_CERT, SERVER_KEY, false);
        let (addr, server) = spawn_tcp_server(move |sock| {
            // say nothing until the client has given up once
            release_rx.recv().unwrap();
            let conn = ServerConnection::new(config).unwrap();
            let mut stream = StreamOwned::new(conn, sock);
            echo_once(&mut stream);
        });
        let sock = TcpStream::connect(addr).unwrap();
        sock.set_nonblocking(true).unwrap();
        // three 50 ms hook slices outlast this
        let options = SslOptions::builder()
            .ca_chain(CA)
            .hostname("localhost")
            .read_timeout(20)
            .build()
            .unwrap();
        let mut ssl = SslSession::with_options(options);
        ssl.set_rng(test_drbg()).unwrap();
        ssl.set_socket(sock).unwrap();

        let err = ssl
            .handshake_with(|cycle| {
                if cycle.attempt >= 3 {
                    Err("peer is silent".into())
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(err.is_aborted());
        assert!(!matches!(err, SslError::Timeout));
        assert_eq!(ssl.state(), SessionState::Handshaking);

        release_tx.send(()).unwrap();
        ssl.handshake_with(|_| Ok(())).unwrap();
        assert_eq!(ssl.state(), SessionState::Established);

        ssl.write(b"resumed").unwrap();
        assert_eq!(ssl.read_with(64, |_| Ok(())).unwrap().unwrap(), b"resumed");
        ssl.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_read_timeout_on_quiet_connection() {
        let (addr, server) =
            spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), handshake_then_idle);
        let options = SslOptions::builder()
            .ca_chain(CA)
            .hostname("localhost")
            .read_timeout(150)
            .build()
            .unwrap();
        let mut ssl = session(options, AuthMode::Required, addr);
        ssl.handshake().unwrap();

        let err = ssl.read(16).unwrap_err();
        assert!(matches!(err, SslError::Timeout));
        assert_eq!(err.code(), Some(codes::SSL_TIMEOUT));

        ssl.close_notify().unwrap();
        ssl.close().unwrap();
        drop(ssl);
        server.join().unwrap();
    }

    #[test]
    fn test_close_notify_after_peer_vanished() {
        let (addr, server) = spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), |stream| {
            let _ = stream.conn.complete_io(&mut stream.sock);
            let _ = stream.sock.shutdown(std::net::Shutdown::Both);
        });
        let mut ssl = session(trusting(), AuthMode::Required, addr);
        ssl.handshake().unwrap();
        server.join().unwrap();

        ssl.close_notify().unwrap();
        assert_eq!(ssl.state(), SessionState::CloseNotified);
        ssl.close().unwrap();
        assert_eq!(ssl.state(), SessionState::Closed);
        ssl.close().unwrap();
    }

    #[test]
    fn test_sessions_on_parallel_threads() {
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                thread::spawn(move || {
                    let (addr, server) =
                        spawn_tls_server(server_config(SERVER_CERT, SERVER_KEY, false), echo_once);
                    let mut ssl = session(trusting(), AuthMode::Required, addr);
                    ssl.handshake().unwrap();
                    let msg = [b'a' + i; 32];
                    ssl.write(&msg).unwrap();
                    let mut got = Vec::new();
                    while let Some(chunk) = ssl.read(64).unwrap() {
                        got.extend_from_slice(&chunk);
                    }
                    assert_eq!(got, msg);
                    ssl.close().unwrap();
                    server.join().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
