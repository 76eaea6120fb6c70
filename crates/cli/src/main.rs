mod config;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use permission::command::{FeatureRef, ManagementCommand, register_management_features};
use permission::{Actor, FeatureUpdate, Permission, PermissionService, Role};
use storage::SqliteStore;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "gatekeeper.toml";
const DATABASE_FILE: &str = "permission.db";

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Manage plugin feature permissions", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./gatekeeper.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage superusers
    #[command(subcommand)]
    Superuser(SuperuserCommand),
    /// Manage feature defaults
    #[command(subcommand)]
    Feature(FeatureCommand),
    /// Set a group override
    Group {
        /// Feature as plugin.feature
        #[arg(value_parser = parse_feature_ref)]
        target: FeatureRef,
        group_id: String,
        #[arg(value_parser = parse_permission)]
        state: Permission,
    },
    /// Set a user override
    User {
        /// Feature as plugin.feature
        #[arg(value_parser = parse_feature_ref)]
        target: FeatureRef,
        user_id: String,
        #[arg(value_parser = parse_permission)]
        state: Permission,
    },
    /// Resolve a permission check
    Check {
        plugin: String,
        feature: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Run a chat management command (group/user) as an actor
    Perm {
        /// Command kind: group or user
        kind: String,
        /// Command arguments, e.g. `chat.ask off`
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },
}

#[derive(Subcommand)]
enum SuperuserCommand {
    /// Grant superuser status
    Add { user_id: String },
    /// Revoke superuser status
    Remove { user_id: String },
    /// List superusers
    List,
}

#[derive(Subcommand)]
enum FeatureCommand {
    /// Register a feature or update some of its defaults
    Set {
        plugin: String,
        feature: String,
        #[arg(long, value_parser = parse_permission)]
        admin: Option<Permission>,
        #[arg(long, value_parser = parse_permission)]
        group: Option<Permission>,
        #[arg(long, value_parser = parse_permission)]
        user: Option<Permission>,
    },
    /// Show a feature's defaults
    Show {
        plugin: String,
        feature: String,
        #[arg(long)]
        json: bool,
    },
    /// List registered features
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ActorArgs {
    /// User id of the actor
    #[arg(short, long)]
    user: String,
    /// Group id; omit for a private conversation
    #[arg(short, long)]
    group: Option<String>,
    /// Role inside the group
    #[arg(short, long, default_value = "member", value_parser = parse_role)]
    role: Role,
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        match &self.group {
            Some(group_id) => Actor::group(self.user.as_str(), group_id.as_str(), self.role),
            None => Actor::private(self.user.as_str()),
        }
    }
}

fn parse_permission(s: &str) -> std::result::Result<Permission, String> {
    s.parse().map_err(|e: permission::Error| e.to_string())
}

fn parse_feature_ref(s: &str) -> std::result::Result<FeatureRef, String> {
    s.parse().map_err(|e: permission::Error| e.to_string())
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    s.parse().map_err(|e: permission::Error| e.to_string())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.log.level);

    let db_path = database_path(cli.database, &config)?;
    let service = PermissionService::new();
    service.init(
        Arc::new(SqliteStore::open(&db_path)?),
        config.superuser.as_deref(),
    )?;
    tracing::debug!(path = %db_path.display(), "Permission database opened");

    match cli.command {
        Commands::Superuser(cmd) => cmd_superuser(&service, cmd),
        Commands::Feature(cmd) => cmd_feature(&service, cmd),
        Commands::Group {
            target,
            group_id,
            state,
        } => {
            service.update_group_permission(&target.plugin, &target.feature, &group_id, state)?;
            println!("{target} in group {group_id}: {state}");
            Ok(())
        }
        Commands::User {
            target,
            user_id,
            state,
        } => {
            service.update_user_permission(&target.plugin, &target.feature, &user_id, state)?;
            println!("{target} for user {user_id}: {state}");
            Ok(())
        }
        Commands::Check {
            plugin,
            feature,
            actor,
        } => {
            let allowed = service.check_permission(&actor.actor(), &plugin, &feature)?;
            println!("{}", Permission::from(allowed));
            Ok(())
        }
        Commands::Perm { kind, args, actor } => {
            register_management_features(&service)?;
            let command = ManagementCommand::parse(&kind, &args.join(" "))?;
            println!("{}", command.execute(&service, &actor.actor())?);
            Ok(())
        }
    }
}

fn cmd_superuser(service: &PermissionService, cmd: SuperuserCommand) -> Result<()> {
    match cmd {
        SuperuserCommand::Add { user_id } => {
            service.set_superuser(&user_id)?;
            println!("{user_id} is a superuser");
        }
        SuperuserCommand::Remove { user_id } => {
            service.remove_superuser(&user_id)?;
            println!("{user_id} is not a superuser");
        }
        SuperuserCommand::List => {
            let superusers = service.engine()?.store().superusers()?;
            if superusers.is_empty() {
                println!("No superusers.");
            }
            for user_id in superusers {
                println!("{user_id}");
            }
        }
    }
    Ok(())
}

fn cmd_feature(service: &PermissionService, cmd: FeatureCommand) -> Result<()> {
    let store = service.engine()?.store();
    match cmd {
        FeatureCommand::Set {
            plugin,
            feature,
            admin,
            group,
            user,
        } => {
            let update = FeatureUpdate { admin, group, user };
            if update.is_empty() {
                println!("Nothing to update.");
                return Ok(());
            }
            service.update_feature_permission(&plugin, &feature, update)?;
            cmd_feature(
                service,
                FeatureCommand::Show {
                    plugin,
                    feature,
                    json: false,
                },
            )?;
        }
        FeatureCommand::Show {
            plugin,
            feature,
            json,
        } => match store.feature_defaults(&plugin, &feature)? {
            Some(defaults) if json => println!("{}", serde_json::to_string_pretty(&defaults)?),
            Some(d) => println!(
                "{plugin}.{feature}  admin={}  group={}  user={}",
                d.admin, d.group, d.user
            ),
            None => println!("{plugin}.{feature} is not registered"),
        },
        FeatureCommand::List { json } => {
            let features = store.features()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&features)?);
                return Ok(());
            }
            if features.is_empty() {
                println!("No features registered.");
                return Ok(());
            }

            println!("{:<40}  {:<6}  {:<6}  USER", "FEATURE", "ADMIN", "GROUP");
            println!("{}", "-".repeat(66));
            for entry in features {
                let name = format!("{}.{}", entry.plugin, entry.feature);
                let d = entry.defaults;
                println!("{name:<40}  {:<6}  {:<6}  {}", d.admin, d.group, d.user);
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default()),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn database_path(flag: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    if let Some(path) = flag.or_else(|| config.database.path.clone()) {
        return Ok(path);
    }
    let data_dir = dirs_data_dir().ok_or(Error::NoDatabasePath)?;
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join(DATABASE_FILE))
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/gatekeeper"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("gatekeeper"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("gatekeeper"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_command() {
        let cli = Cli::try_parse_from([
            "gatekeeper",
            "check",
            "chat",
            "ask",
            "--user",
            "U1",
            "--group",
            "G1",
            "--role",
            "owner",
        ])
        .unwrap();
        let Commands::Check { actor, .. } = cli.command else {
            panic!("expected check");
        };
        assert_eq!(actor.actor(), Actor::group("U1", "G1", Role::Owner));
    }

    #[test]
    fn test_parse_feature_set_with_toggle_words() {
        let cli = Cli::try_parse_from([
            "gatekeeper", "feature", "set", "chat", "ask", "--group", "off", "--user", "yes",
        ])
        .unwrap();
        let Commands::Feature(FeatureCommand::Set { admin, group, user, .. }) = cli.command else {
            panic!("expected feature set");
        };
        assert_eq!(admin, None);
        assert_eq!(group, Some(Permission::Deny));
        assert_eq!(user, Some(Permission::Allow));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Cli::try_parse_from(["gatekeeper", "group", "chat", "G1", "on"]).is_err());
        assert!(Cli::try_parse_from(["gatekeeper", "user", "chat.ask", "U1", "maybe"]).is_err());
    }

    #[test]
    fn test_database_flag_wins_over_config() {
        let config = Config::parse("[database]\npath = \"from-config.db\"").unwrap();
        assert_eq!(
            database_path(Some(PathBuf::from("flag.db")), &config).unwrap(),
            PathBuf::from("flag.db")
        );
        assert_eq!(
            database_path(None, &config).unwrap(),
            PathBuf::from("from-config.db")
        );
    }
}
