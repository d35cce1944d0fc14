//! Bootstrap an admin account
//!
//! Creates the admin user with a password login, or resets the password of
//! an existing admin.
//!
//! Usage:
//!   folio-seed <email> [password] [name]
//!
//! When the password is omitted it is read from stdin, which keeps it out of
//! the process list.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use folio_api::auth::{normalize_email, validate_password, AuthService};
use folio_api::Config;
use folio_shared::{create_pool, run_migrations, CredentialStore, NewUser, PgCredentialStore, Role};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let Some(email) = args.next() else {
        eprintln!("Usage: folio-seed <email> [password] [name]");
        std::process::exit(1);
    };
    let email = normalize_email(&email).context("Invalid email")?;

    let password = match args.next() {
        Some(password) => password,
        None => {
            print!("Enter password for {}: ", email);
            io::stdout().flush()?;

            let mut password = String::new();
            io::stdin().read_line(&mut password)?;
            password.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    validate_password(&password)?;
    let name = args.next().unwrap_or_else(|| "Admin".to_string());

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = create_pool(&config.database_url, 1)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));
    let auth = AuthService::new(
        store.clone(),
        config.session_duration(),
        config.invite_duration(),
    );

    let user = match store.user_by_email(&email).await? {
        Some(user) if !user.is_admin() => {
            bail!("{} exists but is not an admin; refusing to touch it", email);
        }
        Some(user) => user,
        None => {
            let user = store
                .insert_user(NewUser {
                    email: email.clone(),
                    name,
                    role: Role::Admin,
                })
                .await?;
            println!("Created admin user {}", user.email);
            user
        }
    };

    if store.password_login_for_user(user.id).await?.is_some() {
        println!("Login already exists for {}. Updating password...", user.email);
        auth.update_password(user.id, &password).await?;
        let revoked = auth.delete_user_sessions(user.id).await?;
        println!("Password updated; {} session(s) revoked", revoked);
    } else {
        auth.create_password_login(user.id, &user.email, &password)
            .await?;
        println!("Password login created for {}", user.email);
    }

    Ok(())
}
