/*!
Operator CLI for MarketPulse account lifecycle management
*/

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use fs2::FileExt;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use marketpulse_accounts::{
    AccountId, AccountsConfig, AuditManager, DeletionController, DeletionSweeper, NewAccount,
    ProfileUpdate, RegistrationController, Requester, RequesterRole, RoleAuthorizer,
    SqliteAccountStore, SweepEvent, load_config,
};

fn cli() -> Command {
    Command::new("marketpulse-accountctl")
        .version("0.1.0")
        .about("Manages MarketPulse accounts: registration, profile updates, deletion")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a TOML configuration file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("db-path")
                .short('p')
                .long("db-path")
                .help("Path to the account database")
                .value_name("PATH"),
        )
        .subcommand(
            Command::new("register")
                .about("Create a new account")
                .arg(Arg::new("username").long("username").required(true).value_name("NAME"))
                .arg(Arg::new("email").long("email").required(true).value_name("EMAIL"))
                .arg(Arg::new("password").long("password").required(true).value_name("PASSWORD"))
                .arg(Arg::new("first-name").long("first-name").value_name("NAME"))
                .arg(Arg::new("last-name").long("last-name").value_name("NAME"))
                .arg(Arg::new("phone").long("phone").value_name("PHONE")),
        )
        .subcommand(
            Command::new("show")
                .about("Print an account as JSON")
                .arg(Arg::new("account").long("account").required(true).value_name("ID")),
        )
        .subcommand(
            Command::new("update")
                .about("Update profile fields on an active account")
                .arg(Arg::new("account").long("account").required(true).value_name("ID"))
                .arg(Arg::new("username").long("username").value_name("NAME"))
                .arg(Arg::new("email").long("email").value_name("EMAIL"))
                .arg(Arg::new("password").long("password").value_name("PASSWORD"))
                .arg(Arg::new("first-name").long("first-name").value_name("NAME"))
                .arg(Arg::new("last-name").long("last-name").value_name("NAME"))
                .arg(Arg::new("phone").long("phone").value_name("PHONE")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an account and everything it owns")
                .arg(Arg::new("account").long("account").required(true).value_name("ID"))
                .arg(
                    Arg::new("requester")
                        .long("requester")
                        .required(true)
                        .help("Principal requesting the deletion")
                        .value_name("PRINCIPAL"),
                )
                .arg(
                    Arg::new("role")
                        .long("role")
                        .help("Requester role: user or admin")
                        .value_name("ROLE")
                        .default_value("admin"),
                ),
        )
        .subcommand(
            Command::new("sweep")
                .about("Resume deletions interrupted in pending_deletion")
                .arg(
                    Arg::new("once")
                        .long("once")
                        .help("Run a single pass instead of looping")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marketpulse")
        .join("accounts.db")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = cli().get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => load_config(path).await?,
        None => AccountsConfig::default(),
    };

    let db_path = matches
        .get_one::<String>("db-path")
        .map(PathBuf::from)
        .or_else(|| {
            matches
                .get_one::<String>("config")
                .map(|_| config.store.db_path.clone())
        })
        .unwrap_or_else(default_db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Arc::new(SqliteAccountStore::open(&db_path)?);

    match matches.subcommand() {
        Some(("register", sub)) => {
            let registration = RegistrationController::new(store, config.policy);
            let password = sub.get_one::<String>("password").unwrap().clone();
            let account = registration
                .register(NewAccount {
                    first_name: sub.get_one::<String>("first-name").cloned().unwrap_or_default(),
                    last_name: sub.get_one::<String>("last-name").cloned().unwrap_or_default(),
                    phone: sub.get_one::<String>("phone").cloned(),
                    username: sub.get_one::<String>("username").unwrap().clone(),
                    email: sub.get_one::<String>("email").unwrap().clone(),
                    confirm_password: password.clone(),
                    password,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Some(("show", sub)) => {
            let registration = RegistrationController::new(store, config.policy);
            let account_id = AccountId::new(sub.get_one::<String>("account").unwrap().clone());
            match registration.get(&account_id).await? {
                Some(account) => println!("{}", serde_json::to_string_pretty(&account)?),
                None => {
                    warn!("account {} not found", account_id);
                    std::process::exit(1);
                }
            }
        }
        Some(("update", sub)) => {
            let registration = RegistrationController::new(store, config.policy);
            let account_id = AccountId::new(sub.get_one::<String>("account").unwrap().clone());
            let account = registration
                .update_profile(
                    &account_id,
                    ProfileUpdate {
                        username: sub.get_one::<String>("username").cloned(),
                        first_name: sub.get_one::<String>("first-name").cloned(),
                        last_name: sub.get_one::<String>("last-name").cloned(),
                        phone: sub.get_one::<String>("phone").cloned(),
                        email: sub.get_one::<String>("email").cloned(),
                        password: sub.get_one::<String>("password").cloned(),
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Some(("delete", sub)) => {
            let account_id = AccountId::new(sub.get_one::<String>("account").unwrap().clone());
            let principal = sub.get_one::<String>("requester").unwrap().clone();
            let role = match sub.get_one::<String>("role").map(String::as_str) {
                Some("user") => RequesterRole::User,
                Some("admin") | None => RequesterRole::Admin,
                Some(other) => return Err(format!("unknown role: {other}").into()),
            };

            let audit = Arc::new(Mutex::new(AuditManager::from_config(&config.audit)));
            audit.lock().await.initialize().await?;
            let controller = DeletionController::new(store, Arc::new(RoleAuthorizer))
                .with_audit(audit.clone());

            let result = controller
                .delete(&Requester { principal, role }, &account_id)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            audit.lock().await.flush().await;

            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Some(("sweep", sub)) => {
            // One sweeper per data directory
            let lock_path = db_path.with_extension("sweep.lock");
            let lock_file = File::create(&lock_path)?;
            if lock_file.try_lock_exclusive().is_err() {
                return Err(format!(
                    "another sweeper already holds {}",
                    lock_path.display()
                )
                .into());
            }

            let audit = Arc::new(Mutex::new(AuditManager::from_config(&config.audit)));
            audit.lock().await.initialize().await?;
            let controller = Arc::new(
                DeletionController::new(store.clone(), Arc::new(RoleAuthorizer))
                    .with_audit(audit.clone()),
            );
            let sweeper = DeletionSweeper::new(store, controller, config.sweep.clone());

            if sub.get_flag("once") {
                let pass = sweeper.run_once().await?;
                info!(
                    "sweep pass complete: {} resumed, {} failed",
                    pass.resumed.len(),
                    pass.failed.len()
                );
            } else {
                info!(
                    "sweeping for interrupted deletions every {} ms",
                    config.sweep.interval_ms
                );
                let mut events = Box::pin(sweeper.events());
                loop {
                    tokio::select! {
                        maybe = events.next() => {
                            match maybe {
                                Some(SweepEvent::Resumed(id)) => {
                                    info!("resumed deletion of {}", id);
                                }
                                Some(SweepEvent::ResumeFailed(id, detail)) => {
                                    warn!("resume of {} failed: {}", id, detail);
                                }
                                Some(SweepEvent::PassComplete { resumed, failed }) => {
                                    if resumed > 0 || failed > 0 {
                                        info!("pass complete: {} resumed, {} failed", resumed, failed);
                                    }
                                }
                                Some(SweepEvent::SweepError(detail)) => {
                                    error!("sweep error: {}", detail);
                                }
                                None => break,
                            }
                        }
                        _ = tokio::signal::ctrl_c() => {
                            info!("shutdown requested");
                            break;
                        }
                    }
                }
            }

            audit.lock().await.flush().await;
            lock_file.unlock()?;
        }
        _ => {
            cli().print_help()?;
        }
    }

    Ok(())
}
