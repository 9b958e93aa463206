use clap::{Parser, Subcommand};

mod rand_cmd;
mod s_client;

/// polarssl-rs command-line tool: TLS client, DRBG output and self tests.
#[derive(Parser)]
#[command(name = "polarssl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// TLS client connection.
    SClient {
        /// Host:port to connect to (default port 443).
        connect: String,
        /// ALPN protocols (comma-separated, e.g. "h2,http/1.1").
        #[arg(long)]
        alpn: Option<String>,
        /// CA certificate file (PEM). Default: bundled web PKI roots.
        #[arg(long = "CAfile")]
        ca_file: Option<String>,
        /// Server certificate verification.
        #[arg(long, value_enum, default_value_t = s_client::VerifyMode::Required)]
        verify: s_client::VerifyMode,
        /// Read timeout in milliseconds (0 waits indefinitely).
        #[arg(long, default_value_t = 0)]
        timeout: u64,
        /// Trace level 0-4 written to stderr.
        #[arg(long, default_value_t = 0)]
        debug: u32,
        /// Send HTTP GET / after handshake and print response.
        #[arg(long)]
        http: bool,
        /// Quiet mode: suppress connection info.
        #[arg(long, short)]
        quiet: bool,
    },
    /// Generate random bytes from a freshly seeded CTR-DRBG.
    Rand {
        /// Number of bytes.
        num: usize,
        /// Output format (hex, bin).
        #[arg(long, default_value = "hex")]
        format: String,
    },
    /// Run the entropy and DRBG self tests.
    SelfTest,
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::SClient {
            connect,
            alpn,
            ca_file,
            verify,
            timeout,
            debug,
            http,
            quiet,
        } => s_client::run(&s_client::ClientArgs {
            connect,
            alpn: alpn.as_deref(),
            ca_file: ca_file.as_deref(),
            verify: *verify,
            timeout: *timeout,
            debug: *debug,
            http: *http,
            quiet: *quiet,
        }),
        Commands::Rand { num, format } => rand_cmd::run(*num, format),
        Commands::SelfTest => self_test::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_flag_is_checked_by_clap() {
        let cli = Cli::try_parse_from(["polarssl", "s-client", "localhost:4433"]).unwrap();
        match cli.command {
            Commands::SClient { verify, .. } => assert_eq!(verify, s_client::VerifyMode::Required),
            _ => panic!("expected s-client"),
        }

        let cli = Cli::try_parse_from(["polarssl", "s-client", "localhost", "--verify", "none"])
            .unwrap();
        match cli.command {
            Commands::SClient { verify, .. } => assert_eq!(verify, s_client::VerifyMode::None),
            _ => panic!("expected s-client"),
        }

        let err = Cli::try_parse_from(["polarssl", "s-client", "localhost", "--verify", "strict"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
