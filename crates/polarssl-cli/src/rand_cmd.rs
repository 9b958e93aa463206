//! Generate random bytes from the CTR-DRBG and output as hex or raw bytes.

use std::io::Write;
use std::sync::Arc;

use polarssl_crypto::{CtrDrbg, EntropyConfig, EntropySource};

pub fn run(num: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if num == 0 || num > 1_048_576 {
        return Err("num must be between 1 and 1048576".into());
    }
    if !matches!(format, "hex" | "bin") {
        return Err(format!("unsupported format: {format} (use hex or bin)").into());
    }

    let entropy = Arc::new(EntropySource::new(EntropyConfig::default()));
    let drbg = CtrDrbg::with_personalization(entropy, b"polarssl rand")?;
    let buf = drbg.random_bytes(num)?;

    match format {
        "hex" => println!("{}", to_hex(&buf)),
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&buf)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
