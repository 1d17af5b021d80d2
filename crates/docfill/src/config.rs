//! Server configuration.

use std::path::PathBuf;

use clap::Parser;
use docfill_docx::LogoOptions;
use docfill_docx::logo::cm_to_emu;
use rand::RngCore;

/// Arguments of the `serve` command.
#[derive(Debug, Clone, Parser)]
#[clap(name = "docfill-serve")]
pub struct ServeArgs {
    /// The address to listen on.
    #[clap(
        long,
        env = "DOCFILL_ADDR",
        value_name = "ADDR",
        default_value = "127.0.0.1:5000"
    )]
    pub addr: String,

    /// The directory uploaded templates and logos are saved to.
    #[clap(
        long,
        env = "DOCFILL_UPLOADS",
        value_name = "DIR",
        default_value = "uploads"
    )]
    pub uploads: PathBuf,

    /// The template used when the form does not upload one.
    #[clap(
        long,
        env = "DOCFILL_TEMPLATE",
        value_name = "PATH",
        default_value = "template.docx"
    )]
    pub template: PathBuf,

    /// The logo width in centimetres.
    #[clap(long, value_name = "CM", default_value_t = 5.0)]
    pub logo_width_cm: f64,

    /// The key signing flash message cookies. A random key is used when
    /// absent, which invalidates pending messages on restart.
    #[clap(
        long,
        env = "DOCFILL_SECRET_KEY",
        value_name = "KEY",
        hide_env_values = true
    )]
    pub secret_key: Option<String>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        // Picks up the environment the same way an explicit `serve` does.
        Self::parse_from(["docfill-serve"])
    }
}

/// The immutable configuration shared by all requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to listen on.
    pub addr: String,
    /// The directory uploads are saved to.
    pub uploads_dir: PathBuf,
    /// The fallback template.
    pub default_template: PathBuf,
    /// How the logo is placed.
    pub logo: LogoOptions,
    /// The key signing flash cookies.
    pub secret_key: Vec<u8>,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        let secret_key = match args.secret_key {
            Some(key) if !key.is_empty() => key.into_bytes(),
            _ => {
                log::warn!(
                    "no secret key configured, generating a random one; set DOCFILL_SECRET_KEY to keep flash messages across restarts"
                );
                random_key()
            }
        };

        Self {
            addr: args.addr,
            uploads_dir: args.uploads,
            default_template: args.template,
            logo: LogoOptions {
                width: Some(cm_to_emu(args.logo_width_cm)),
                ..LogoOptions::default()
            },
            secret_key,
        }
    }
}

/// Generates a random 32-byte key from the thread-local CSPRNG.
pub fn random_key() -> Vec<u8> {
    let mut key = vec![0; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = ServeArgs::parse_from(["docfill-serve", "--secret-key", "k"]);
        let config = ServerConfig::from(args);
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.default_template, PathBuf::from("template.docx"));
        assert_eq!(config.logo.width, Some(1_800_000));
        assert_eq!(config.logo.marker, "[LOGO]");
        assert_eq!(config.secret_key, b"k");
    }

    #[test]
    fn explicit_values() {
        let args = ServeArgs::parse_from([
            "docfill-serve",
            "--addr",
            "0.0.0.0:8080",
            "--logo-width-cm",
            "2.5",
            "--template",
            "modelos/proposta.docx",
        ]);
        assert_eq!(args.addr, "0.0.0.0:8080");

        let config = ServerConfig::from(args);
        assert_eq!(config.logo.width, Some(900_000));
        assert_eq!(
            config.default_template,
            PathBuf::from("modelos/proposta.docx")
        );
    }

    #[test]
    fn random_keys_differ() {
        let a = random_key();
        assert_eq!(a.len(), 32);
        assert_ne!(a, random_key());
    }
}
