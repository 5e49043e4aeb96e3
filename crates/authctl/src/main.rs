//! `hse-authctl`: operator tooling for the HSE auth core.
//!
//! Reads the same `HSE_AUTH_*` configuration as the services and refuses to
//! run token commands without it.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};

use hse_auth::token::TokenKeys;
use hse_auth::{
    AuthConfig, Permission, PermissionResolver, Role, RoleTable, Subject, TokenKind, TokenVerifier,
    explain_authorization, hash_secret,
};
use hse_core::{PrincipalId, SystemClock, TenantId};
use hse_observability::tracing::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "hse-authctl", version, about = "HSE auth operator tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hash a secret for storage. Reads the secret from stdin when omitted.
    HashSecret {
        secret: Option<String>,
        #[arg(long, env = "HSE_AUTH_BCRYPT_COST")]
        cost: Option<u32>,
    },
    /// Print the permissions a role resolves to.
    Permissions {
        role: Role,
        /// Resolve as a platform principal (no tenant).
        #[arg(long)]
        platform: bool,
    },
    /// Explain whether a role is granted a permission.
    Explain {
        role: Role,
        permission: String,
        #[arg(long)]
        platform: bool,
    },
    /// Verify a token and print its claims.
    Inspect {
        kind: KindArg,
        token: String,
    },
    /// Validate the environment configuration.
    CheckConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Access,
    Refresh,
}

impl From<KindArg> for TokenKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Access => TokenKind::Access,
            KindArg::Refresh => TokenKind::Refresh,
        }
    }
}

fn main() -> Result<()> {
    hse_observability::tracing::init(LogFormat::Pretty);
    let cli = Cli::parse();

    match cli.command {
        Command::HashSecret { secret, cost } => {
            let secret = match secret {
                Some(s) => s,
                None => read_secret_from_stdin()?,
            };
            let hash = hash_secret(&secret, cost.unwrap_or(AuthConfig::default().bcrypt_cost))?;
            println!("{hash}");
        }
        Command::Permissions { role, platform } => {
            let resolver = standard_resolver();
            let subject = subject(role, platform);
            let names: Vec<_> = resolver.permissions_for(&subject).iter().map(|p| p.as_str()).collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        Command::Explain {
            role,
            permission,
            platform,
        } => {
            let permission =
                Permission::from_name(&permission).ok_or_else(|| anyhow!("unknown permission '{permission}'"))?;
            let explanation = explain_authorization(&standard_resolver(), &subject(role, platform), permission, None);
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
        Command::Inspect { kind, token } => {
            let config = AuthConfig::from_env().context("loading HSE_AUTH_* configuration")?;
            let keys = Arc::new(TokenKeys::from_config(&config)?);
            let verifier = TokenVerifier::new(&config, keys, Arc::new(SystemClock));
            match verifier.verify(token.trim(), kind.into()) {
                Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                Err(reason) => bail!("token rejected: {reason}"),
            }
        }
        Command::CheckConfig => {
            let config = AuthConfig::from_env().context("loading HSE_AUTH_* configuration")?;
            tracing::info!("configuration is valid");
            println!("{config:#?}");
        }
    }

    Ok(())
}

fn standard_resolver() -> PermissionResolver {
    PermissionResolver::new(Arc::new(RoleTable::standard()))
}

/// Ids are placeholders; resolution depends only on role and tenancy.
fn subject(role: Role, platform: bool) -> Subject {
    Subject {
        principal_id: PrincipalId::new(),
        role,
        tenant_id: if platform { None } else { Some(TenantId::new()) },
    }
}

fn read_secret_from_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("no secret given on stdin");
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn role_arguments_accept_kebab_case() {
        let cli = Cli::try_parse_from(["hse-authctl", "permissions", "station-manager", "--platform"]).unwrap();
        match cli.command {
            Command::Permissions { role, platform } => {
                assert_eq!(role, Role::StationManager);
                assert!(platform);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn platform_subject_has_no_tenant() {
        assert!(subject(Role::Admin, true).is_super_admin());
        assert!(!subject(Role::Admin, false).is_super_admin());
    }
}
