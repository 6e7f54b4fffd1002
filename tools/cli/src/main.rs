//! rms command-line tool
//!
//! Unwraps rpmsg attachments and works with Azure RMS end-user licenses
//! using the librms library.
//!
//! Commands:
//! - `rms rpmsg decode` turns a `message.rpmsg` into its compound file
//! - `rms license show` prints an end-user license
//! - `rms license fetch` exchanges a publishing license for an end-user license
//! - `rms license decrypt` decrypts content with an end-user license
//! - `rms license templates` lists the tenant's protection templates

#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand};
use librms::client::{
    Certificate, Client, ClientConfig, DEFAULT_BASE_URL, DEFAULT_PLATFORM_ID, DEFAULT_USER_AGENT,
};
use librms::{license, rpmsg, EndUserLicense};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Commands for restricted-permission messages (rpmsg)
    #[command(subcommand)]
    Rpmsg(RpmsgCommand),
    /// Commands for licenses and the licensing service
    License(LicenseArgs),
}

#[derive(Subcommand, Debug)]
enum RpmsgCommand {
    /// Decode an rpmsg file into a raw compound file
    Decode {
        /// Input rpmsg file
        #[arg(value_name = "MESSAGE.RPMSG")]
        input: PathBuf,
        /// Output file for the decoded compound file
        #[arg(short, long, default_value = "rpmsg.compound")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct LicenseArgs {
    /// Disable all TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Extra trusted root certificate (PEM); may be repeated
    #[arg(long = "ca-cert", value_name = "PEM", global = true)]
    ca_certs: Vec<PathBuf>,

    /// Trust only the --ca-cert roots, not the built-in ones
    #[arg(long, global = true, requires = "ca_certs")]
    no_built_in_roots: bool,

    /// User agent presented to the licensing service
    #[arg(short, long, global = true, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// X-MS-RMS-Platform-Id presented to the licensing service
    #[arg(short, long, global = true, default_value = DEFAULT_PLATFORM_ID)]
    platform_id: String,

    /// Licensing service root
    #[arg(long, global = true, env = "RMS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: LicenseCommand,
}

#[derive(Subcommand, Debug)]
enum LicenseCommand {
    /// Print the contents of an end-user license
    Show {
        /// End-user license file
        #[arg(value_name = "USER.LICENSE")]
        license: PathBuf,
    },
    /// Fetch an end-user license using an access token
    Fetch {
        /// OAuth access token for the licensing service
        access_token: String,
        /// Publishing license extracted from the message
        #[arg(value_name = "CONTENT.LICENSE")]
        content_license: PathBuf,
        /// Output file for the end-user license
        #[arg(short, long, default_value = "user.license")]
        output: PathBuf,
    },
    /// Decrypt a file using the end-user license
    Decrypt {
        /// End-user license file
        #[arg(value_name = "USER.LICENSE")]
        license: PathBuf,
        /// Encrypted content
        #[arg(value_name = "CONTENT.ENCRYPTED")]
        content: PathBuf,
        /// Output file for the decrypted content
        #[arg(short, long, default_value = "decrypted.compound")]
        output: PathBuf,
    },
    /// List the protection templates available to the token's user
    Templates {
        /// OAuth access token for the licensing service
        access_token: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(command: Command) -> librms::Result<()> {
    match command {
        Command::Rpmsg(RpmsgCommand::Decode { input, output }) => decode(&input, &output),
        Command::License(args) => run_license(args),
    }
}

fn decode(input: &Path, output: &Path) -> librms::Result<()> {
    let mut reader = rpmsg::decode(BufReader::new(File::open(input)?))?;
    let mut writer = BufWriter::new(File::create(output)?);
    let written = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    info!(segments = reader.segments_read(), "decode finished");
    println!(
        "Decoded {} bytes to compound file: {}",
        written,
        output.display()
    );
    Ok(())
}

fn client_config(args: &LicenseArgs) -> librms::Result<ClientConfig> {
    let mut roots = Vec::with_capacity(args.ca_certs.len());
    for path in &args.ca_certs {
        roots.push(Certificate::from_pem(&fs::read(path)?)?);
    }
    Ok(ClientConfig::new()
        .with_base_url(&args.base_url)
        .with_user_agent(&args.user_agent)
        .with_platform_id(&args.platform_id)
        .with_root_certificates(roots)
        .with_built_in_roots(!args.no_built_in_roots)
        .with_accept_invalid_certs(args.insecure))
}

fn run_license(args: LicenseArgs) -> librms::Result<()> {
    let config = client_config(&args)?;

    match args.command {
        LicenseCommand::Show { license } => {
            let license = EndUserLicense::from_reader(BufReader::new(File::open(license)?))?;
            println!("{}", license);
        }
        LicenseCommand::Fetch {
            access_token,
            content_license,
            output,
        } => {
            let content = fs::read(&content_license)?;
            let publishing = license::publishing_license(&content)?;
            let client = Client::new(config.with_access_token(access_token))?;
            let (license, raw) = client.end_user_license(publishing)?;
            println!("{}", license);
            fs::write(&output, raw)?;
        }
        LicenseCommand::Decrypt {
            license,
            content,
            output,
        } => {
            let license = EndUserLicense::from_reader(BufReader::new(File::open(license)?))?;
            let ciphertext = fs::read(&content)?;
            let plaintext = license.decrypt(&ciphertext)?;
            fs::write(&output, &plaintext)?;
            println!(
                "Decrypted {} bytes from {}",
                plaintext.len(),
                content.display()
            );
        }
        LicenseCommand::Templates { access_token } => {
            let client = Client::new(config.with_access_token(access_token))?;
            for template in client.templates()? {
                println!(
                    "{}\t{}\t{}",
                    template.id.unwrap_or_default(),
                    template.name.unwrap_or_default(),
                    template.description.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}
