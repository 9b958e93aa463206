//! TLS client connection command (`s-client`).

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use polarssl_crypto::{CtrDrbg, EntropyConfig, EntropySource};
use polarssl_tls::{AuthMode, DebugContext, SslError, SslOptions, SslSession};

/// Server certificate verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerifyMode {
    None,
    Optional,
    Required,
}

impl From<VerifyMode> for AuthMode {
    fn from(mode: VerifyMode) -> Self {
        match mode {
            VerifyMode::None => AuthMode::None,
            VerifyMode::Optional => AuthMode::Optional,
            VerifyMode::Required => AuthMode::Required,
        }
    }
}

pub struct ClientArgs<'a> {
    pub connect: &'a str,
    pub alpn: Option<&'a str>,
    pub ca_file: Option<&'a str>,
    pub verify: VerifyMode,
    pub timeout: u64,
    pub debug: u32,
    pub http: bool,
    pub quiet: bool,
}

pub fn run(args: &ClientArgs<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let (host, addr) = parse_connect(args.connect)?;
    let mode = AuthMode::from(args.verify);

    if args.debug > 0 {
        let ctx = DebugContext::shared();
        ctx.set_threshold(args.debug);
        if let Err(e) = ctx.install_log_bridge() {
            eprintln!("Warning: {e}");
        }
    }

    let mut options = SslOptions::builder()
        .read_timeout(args.timeout)
        .hostname(host.as_str());
    if let Some(ca_path) = args.ca_file {
        let ca_pem = std::fs::read_to_string(ca_path)
            .map_err(|e| format!("cannot read CA file '{ca_path}': {e}"))?;
        options = options.ca_chain(ca_pem);
    }
    if let Some(alpn_str) = args.alpn {
        options = options.alpn_protocols(alpn_str.split(',').map(str::trim));
    }
    let options = options.build()?;

    if !args.quiet {
        eprintln!("Connecting to {addr}...");
    }

    // Resolve and connect with a 10-second timeout
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve '{addr}': {e}"))?
        .next()
        .ok_or_else(|| format!("cannot resolve '{addr}': no addresses found"))?;
    let stream = TcpStream::connect_timeout(&socket_addr, Duration::from_secs(10))
        .map_err(|e| format!("cannot connect to '{addr}': {e}"))?;

    if !args.quiet {
        eprintln!("Connected to {}", stream.peer_addr()?);
    }

    let entropy = Arc::new(EntropySource::new(EntropyConfig::default()));
    let drbg = Arc::new(CtrDrbg::with_personalization(entropy, b"polarssl s-client")?);

    let mut ssl = SslSession::with_options(options);
    ssl.set_authmode(mode)?;
    ssl.set_rng(drbg)?;
    ssl.set_socket(stream)?;
    ssl.handshake()?;

    if !args.quiet {
        print_connection_info(&ssl);
    }
    if args.http {
        do_http(&host, &mut ssl)?;
    }

    ssl.close_notify()?;
    ssl.close()?;

    if !args.quiet {
        eprintln!("Connection closed.");
    }

    Ok(())
}

/// Parse "host:port" or "host" (defaults to port 443).
fn parse_connect(connect: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    if let Some(idx) = connect.rfind(':') {
        let host = &connect[..idx];
        let port = &connect[idx + 1..];
        port.parse::<u16>()
            .map_err(|_| format!("invalid port in '{connect}'"))?;
        Ok((host.to_string(), connect.to_string()))
    } else {
        Ok((connect.to_string(), format!("{connect}:443")))
    }
}

fn print_connection_info(ssl: &SslSession) {
    eprintln!("--- TLS connection established ---");
    if let Some(version) = ssl.protocol_version() {
        eprintln!("  Protocol: {version:?}");
    }
    if let Some(suite) = ssl.cipher_suite() {
        eprintln!("  Cipher:   {suite:?}");
    }
    if let Some(alpn) = ssl.alpn_protocol() {
        eprintln!("  ALPN:     {}", String::from_utf8_lossy(alpn));
    }
    eprintln!("  Verify:   {}", ssl.verify_result());
    eprintln!("---------------------------------");
}

fn do_http(host: &str, ssl: &mut SslSession) -> Result<(), Box<dyn std::error::Error>> {
    let request = format!("GET / HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    ssl.write(request.as_bytes())?;

    loop {
        match ssl.read(16384) {
            Ok(Some(chunk)) => print!("{}", String::from_utf8_lossy(&chunk)),
            Ok(None) | Err(SslError::EndOfStream) => break,
            Err(SslError::Io(ref e)) if e.kind() == std::io::ErrorKind::ConnectionReset => break,
            Err(e) => return Err(e.into()),
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_with_port() {
        let (host, addr) = parse_connect("example.com:8443").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(addr, "example.com:8443");
    }

    #[test]
    fn test_parse_connect_without_port() {
        let (host, addr) = parse_connect("example.com").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(addr, "example.com:443");
    }

    #[test]
    fn test_parse_connect_bad_port() {
        assert!(parse_connect("example.com:https").is_err());
    }

    #[test]
    fn test_verify_mode_maps_to_authmode() {
        assert_eq!(AuthMode::from(VerifyMode::None), AuthMode::None);
        assert_eq!(AuthMode::from(VerifyMode::Optional), AuthMode::Optional);
        assert_eq!(AuthMode::from(VerifyMode::Required), AuthMode::Required);
        assert_eq!(VerifyMode::from_str("optional", false), Ok(VerifyMode::Optional));
        assert!(VerifyMode::from_str("strict", false).is_err());
    }

    #[test]
    fn test_s_client_unreachable_host() {
        let args = ClientArgs {
            connect: "127.0.0.1:1",
            alpn: None,
            ca_file: None,
            verify: VerifyMode::None,
            timeout: 0,
            debug: 0,
            http: false,
            quiet: true,
        };
        assert!(run(&args).is_err());
    }

    #[test]
    fn test_s_client_missing_ca_file() {
        let args = ClientArgs {
            connect: "localhost:4433",
            alpn: None,
            ca_file: Some("/nonexistent/ca.pem"),
            verify: VerifyMode::Required,
            timeout: 0,
            debug: 0,
            http: false,
            quiet: true,
        };
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("cannot read CA file"));
    }
}
