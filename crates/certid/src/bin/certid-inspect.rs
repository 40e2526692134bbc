// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Context;
use certid::keystore::{KeyStoreHandle, MemoryStore, Pkcs12Store};
use certid::{CertificateDescriptor, CertificateResolver};
use clap::{Parser, Subcommand};
use rustls::pki_types::CertificateDer;
use tracing::debug;
use x509_parser::pem::parse_x509_pem;

#[derive(Debug, Parser)]
#[command(name = "certid-inspect")]
#[command(version, about = "Inspect identity certificates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve an entry of a PKCS#12 file
    Pfx {
        file: PathBuf,
        /// Keystore password (or use CERTID_PASSWORD env var)
        #[arg(long, env = "CERTID_PASSWORD", hide_env_values = true)]
        password: String,
        /// Entry to resolve, the first one by default
        #[arg(long)]
        alias: Option<String>,
    },
    /// List the entries of a PKCS#12 file
    Aliases {
        file: PathBuf,
        #[arg(long, env = "CERTID_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Decode a PEM or DER certificate
    Cert { file: PathBuf },
}

fn read_certificate(data: &[u8]) -> anyhow::Result<CertificateDer<'static>> {
    if data.starts_with(b"-----BEGIN") {
        let (_rem, pem) = parse_x509_pem(data).context("parsing PEM")?;
        Ok(CertificateDer::from(pem.contents))
    } else {
        Ok(CertificateDer::from(data.to_vec()))
    }
}

fn main() -> anyhow::Result<()> {
    certid::trace_init()?;
    let cli = Cli::parse();
    debug!("CLI is {cli:?}");

    let resolver = CertificateResolver::new();
    let descriptor = match cli.command {
        Commands::Pfx {
            file,
            password,
            alias,
        } => {
            let mut request = CertificateDescriptor::from_pfx_file(file, &password);
            if let Some(alias) = alias {
                request = request.with_alias(alias);
            }
            resolver.resolve(request, None)?
        }
        Commands::Aliases { file, password } => {
            let store = Pkcs12Store::open_file(&file, &password)?;
            for alias in store.aliases()? {
                println!("{alias}");
            }
            return Ok(());
        }
        Commands::Cert { file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let store =
                MemoryStore::new().with_entry("certificate", vec![read_certificate(&data)?], None);
            resolver.resolve(CertificateDescriptor::windows_store(), Some(&store))?
        }
    };
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
