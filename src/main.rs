//! kmspki CLI application.
//!
//! This binary creates certificate signing requests, root CA certificates and
//! CA-signed leaf certificates, writing each artifact as a PEM file.

use clap::{Args, Parser, Subcommand, ValueEnum};
use kmspki::cert::ca::CertificateAuthority;
use kmspki::cert::csr::create_csr;
use kmspki::cert::name::Subject;
use kmspki::config::{days, IssuanceConfig};
use kmspki::crypto::pem_encryption::PemCipher;
use kmspki::entropy::{ChunkedEntropy, EntropySource, OsEntropy, OsRandomProvider};
use kmspki::error::{PkiError, Result};
use kmspki::storage::files::{
    ca_paths, csr_paths, load_certificate_authority, load_csr, signed_certificate_path,
    write_certificate_file, write_csr_file, write_encrypted_private_key_file,
    write_private_key_file,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kmspki")]
#[command(about = "Private X.509 PKI backed by a rate-limited entropy source", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Certificate authority operations
    #[command(subcommand)]
    Ca(CaCommands),

    /// Certificate signing request operations
    #[command(subcommand)]
    Csr(CsrCommands),
}

#[derive(Subcommand)]
enum CaCommands {
    /// Create a new root CA certificate and private key
    New {
        #[command(flatten)]
        subject: SubjectArgs,

        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for CAcert.pem and CAkey.pem
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Validity in days (default: 7300, or the config file's value)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        validity_days: Option<u32>,

        /// Prompt for a passphrase and encrypt the CA private key
        #[arg(long)]
        encrypt: bool,
    },

    /// Sign a certificate signing request with a CA
    Sign {
        /// CA certificate file
        #[arg(long)]
        cacert: PathBuf,

        /// CA private key file
        #[arg(long)]
        cakey: PathBuf,

        /// Certificate signing request file
        #[arg(long)]
        csr: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for <cn>.pem
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Validity in days (default: 730, or the config file's value)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        validity_days: Option<u32>,

        /// Prompt for the CA key passphrase
        #[arg(long)]
        passphrase_prompt: bool,
    },
}

#[derive(Subcommand)]
enum CsrCommands {
    /// Create a new private key and certificate signing request
    New {
        #[command(flatten)]
        subject: SubjectArgs,

        #[command(flatten)]
        common: CommonArgs,

        /// Comma separated DNS subject alternative names
        #[arg(long)]
        sans: Option<String>,

        /// Output directory for <cn>.key and <cn>.csr
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct SubjectArgs {
    /// Common name
    #[arg(long)]
    cn: String,

    /// Comma separated 2 character ISO country codes (e.g., GB,US)
    #[arg(long)]
    c: Option<String>,

    /// Comma separated organisation names
    #[arg(long)]
    o: Option<String>,

    /// Comma separated organisational units
    #[arg(long)]
    ou: Option<String>,

    /// Comma separated localities or cities
    #[arg(long)]
    l: Option<String>,

    /// Comma separated states, counties, regions or provinces
    #[arg(long)]
    s: Option<String>,
}

impl SubjectArgs {
    fn to_subject(&self) -> Subject {
        Subject {
            common_name: self.cn.clone(),
            country: split_list(self.c.as_deref()),
            province: split_list(self.s.as_deref()),
            locality: split_list(self.l.as_deref()),
            organization: split_list(self.o.as_deref()),
            organizational_unit: split_list(self.ou.as_deref()),
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entropy source
    #[arg(long, value_enum, default_value_t = EntropyKind::Os)]
    entropy: EntropyKind,
}

impl CommonArgs {
    fn load_config(&self) -> Result<IssuanceConfig> {
        match &self.config {
            Some(path) => IssuanceConfig::load(path),
            None => Ok(IssuanceConfig::default()),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EntropyKind {
    /// Operating system CSPRNG
    Os,
    /// Operating system CSPRNG behind a per-call byte limit
    Chunked,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn build_entropy(kind: EntropyKind, config: &IssuanceConfig) -> Result<Box<dyn EntropySource>> {
    match kind {
        EntropyKind::Os => Ok(Box::new(OsEntropy)),
        EntropyKind::Chunked => {
            let max = config.entropy.max_bytes_per_call;
            let provider = OsRandomProvider::new(max);
            Ok(Box::new(ChunkedEntropy::with_max_bytes_per_call(provider, max)?))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ca(ca_cmd) => handle_ca_command(ca_cmd),
        Commands::Csr(csr_cmd) => handle_csr_command(csr_cmd),
    }
}

fn handle_ca_command(cmd: CaCommands) -> Result<()> {
    match cmd {
        CaCommands::New {
            subject,
            common,
            out,
            validity_days,
            encrypt,
        } => {
            let config = common.load_config()?;
            let entropy = build_entropy(common.entropy, &config)?;
            let validity = validity_days.map(days).unwrap_or_else(|| config.ca_validity());

            let ca = CertificateAuthority::create(&subject.to_subject(), validity, entropy.as_ref())?;

            let (cert_path, key_path) = ca_paths(&out);
            write_certificate_file(ca.certificate(), &cert_path)?;
            if encrypt {
                let passphrase = prompt_new_passphrase()?;
                write_encrypted_private_key_file(
                    ca.key(),
                    &passphrase,
                    PemCipher::Aes256Cbc,
                    entropy.as_ref(),
                    &key_path,
                )?;
            } else {
                write_private_key_file(ca.key(), &key_path)?;
            }

            println!("✓ Created root CA certificate: {}", cert_path.display());
            println!("  Private key: {}", key_path.display());
            println!("  Subject: {}", ca.certificate().subject());
            println!("  Serial: {}", ca.certificate().serial_hex());

            Ok(())
        }

        CaCommands::Sign {
            cacert,
            cakey,
            csr,
            common,
            out,
            validity_days,
            passphrase_prompt,
        } => {
            let config = common.load_config()?;
            let entropy = build_entropy(common.entropy, &config)?;
            let validity = validity_days.map(days).unwrap_or_else(|| config.leaf_validity());

            let request = load_csr(&csr)?;
            let passphrase = if passphrase_prompt {
                Some(rpassword::prompt_password("Enter CA key passphrase: ")?)
            } else {
                None
            };
            let ca = load_certificate_authority(&cacert, &cakey, passphrase.as_deref())?;

            let leaf = ca.sign_leaf(&request, validity, entropy.as_ref())?;
            let cert_path = signed_certificate_path(&out, leaf.common_name().as_deref(), &csr);
            write_certificate_file(&leaf, &cert_path)?;

            println!("✓ Signed certificate: {}", cert_path.display());
            println!("  Subject: {}", leaf.subject());
            println!("  Signed by: {}", leaf.issuer());
            println!("  DNS names: {}", leaf.dns_names().join(", "));

            Ok(())
        }
    }
}

fn handle_csr_command(cmd: CsrCommands) -> Result<()> {
    match cmd {
        CsrCommands::New {
            subject,
            common,
            sans,
            out,
        } => {
            let config = common.load_config()?;
            let entropy = build_entropy(common.entropy, &config)?;

            let subject = subject.to_subject();
            let alt_names = split_list(sans.as_deref());
            let (csr, key) = create_csr(&subject, &alt_names, entropy.as_ref())?;

            let (key_path, csr_path) = csr_paths(&out, &subject.common_name);
            write_private_key_file(&key, &key_path)?;
            write_csr_file(&csr, &csr_path)?;

            println!("✓ Created certificate signing request: {}", csr_path.display());
            println!("  Private key: {}", key_path.display());
            println!("  DNS names: {}", csr.dns_names().join(", "));

            Ok(())
        }
    }
}

fn prompt_new_passphrase() -> Result<String> {
    let passphrase = rpassword::prompt_password("Enter passphrase to encrypt CA key: ")?;
    let confirm = rpassword::prompt_password("Confirm passphrase: ")?;
    if passphrase != confirm {
        return Err(PkiError::ConfigError("Passphrases do not match".to_string()));
    }
    if passphrase.is_empty() {
        return Err(PkiError::ConfigError("Passphrase cannot be empty".to_string()));
    }
    Ok(passphrase)
}
