//! `restgate` admin tool: manage REST grants and issue or inspect credentials.
//!
//! Reads `DATABASE_URL` for the grant store and the `RESTGATE_*` variables for
//! token secrets. Logs go to stderr; command output goes to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use restgate_core::{MethodId, ResourceId, UserId};
use restgate_observability::tracing::{LogFormat, TracingConfig};

mod commands;

#[derive(Parser)]
#[command(name = "restgate")]
#[command(about = "Manage REST permission grants and the credentials that carry them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogOutput::Json)]
    log_format: LogOutput,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogOutput {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the grant tables and the existence-check routine
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Aggregate a user's grants and print a sealed credential
    Issue {
        #[arg(short, long)]
        user: UserId,

        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Validate a credential and print its permissions claim as JSON
    Inspect {
        token: String,

        /// Also explain whether this request would be authorized
        #[arg(long, requires = "method")]
        path: Option<String>,

        #[arg(long, requires = "path")]
        method: Option<String>,
    },

    /// Grant a user a method on a resource
    Grant(GrantArgs),

    /// Remove a previously recorded grant
    Revoke(GrantArgs),

    /// Print a user's grants without issuing a credential
    List {
        #[arg(short, long)]
        user: UserId,

        /// Include resource paths and method names
        #[arg(long)]
        describe: bool,

        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(clap::Args)]
struct GrantArgs {
    #[arg(short, long)]
    user: UserId,

    #[arg(short, long)]
    resource: ResourceId,

    #[arg(short, long)]
    method: MethodId,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogOutput::Json => LogFormat::Json,
        LogOutput::Pretty => LogFormat::Pretty,
    };
    restgate_observability::tracing::init(
        TracingConfig::default()
            .with_verbosity(cli.verbose)
            .with_format(format),
    );

    match cli.command {
        Commands::Migrate { database_url } => commands::migrate(&database_url).await,
        Commands::Issue { user, database_url } => commands::issue(user, &database_url).await,
        Commands::Inspect {
            token,
            path,
            method,
        } => {
            let request = path.zip(method);
            commands::inspect(&token, request.as_ref().map(|(p, m)| (p.as_str(), m.as_str())))
        }
        Commands::Grant(args) => commands::grant(args.grant(), &args.database_url).await,
        Commands::Revoke(args) => commands::revoke(args.grant(), &args.database_url).await,
        Commands::List {
            user,
            describe,
            database_url,
        } => commands::list(user, describe, &database_url).await,
    }
}

impl GrantArgs {
    fn grant(&self) -> restgate_core::Grant {
        restgate_core::Grant::new(self.user, self.resource, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grant_parses_typed_ids() {
        let cli = Cli::try_parse_from([
            "restgate",
            "grant",
            "--user",
            "7",
            "--resource",
            "3",
            "--method",
            "1",
            "--database-url",
            "postgres://localhost/restgate",
        ])
        .unwrap();

        let Commands::Grant(args) = cli.command else {
            panic!("expected grant");
        };
        assert_eq!(
            args.grant(),
            restgate_core::Grant::new(UserId::new(7), ResourceId::new(3), MethodId::new(1))
        );
    }

    #[test]
    fn inspect_path_requires_method() {
        let parsed = Cli::try_parse_from(["restgate", "inspect", "tok", "--path", "/orders"]);
        assert!(parsed.is_err());
    }
}
