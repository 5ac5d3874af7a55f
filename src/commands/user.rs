use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::Context;
use crate::auth::{self, Permission};
use crate::cli::UserCommand;
use crate::db;
use crate::error::EngagementError;
use crate::models::{Role, User};

#[derive(Serialize)]
struct LoginOutput<'a> {
    access_token: &'a str,
    token_type: &'static str,
    expires_in: i64,
    user: &'a User,
}

pub async fn execute(command: UserCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        UserCommand::Register {
            email,
            first_name,
            last_name,
            role,
            password,
        } => register(ctx, email, first_name, last_name, role, password).await,
        UserCommand::Login { email, password } => login(ctx, &email, &password).await,
        UserCommand::List => {
            ctx.authorize(&[Permission::Read])?;
            let users = db::list_users(&ctx.pool).await?;
            ctx.emit(&users[..], |users| {
                for user in users {
                    println!(
                        "{}  {:<28} {:<8} {}{}",
                        user.id,
                        user.full_name(),
                        user.role,
                        user.email,
                        if user.is_active { "" } else { " (inactive)" }
                    );
                }
            })
        }
        UserCommand::Whoami => {
            let identity = ctx.authorize(&[Permission::Read])?;
            ctx.emit(&identity.user_id, |id| {
                println!("{} ({})", id, identity.role);
            })
        }
        UserCommand::Update {
            first_name,
            last_name,
        } => {
            let identity = ctx.authorize(&[Permission::Read])?;
            let mut user = db::find_user_by_id(&ctx.pool, identity.user_id).await?;
            user.update_profile(first_name.as_deref(), last_name.as_deref())?;
            db::save_user(&ctx.pool, &user).await?;
            info!(user_id = %user.id, "profile updated");
            ctx.emit(&user, |user| println!("Profile updated: {}.", user.full_name()))
        }
        UserCommand::ChangePassword {
            current_password,
            new_password,
        } => {
            let identity = ctx.authorize(&[Permission::Read])?;
            let mut user = db::find_user_by_id(&ctx.pool, identity.user_id).await?;
            if let Err(err) = auth::change_password(&mut user, &current_password, &new_password) {
                warn!(user_id = %user.id, "password change rejected");
                return Err(err.into());
            }
            db::save_user(&ctx.pool, &user).await?;
            info!(user_id = %user.id, "password changed");
            ctx.emit(&user.id, |_| println!("Password changed."))
        }
    }
}

async fn register(
    ctx: &Context,
    email: String,
    first_name: String,
    last_name: String,
    role: Option<Role>,
    password: String,
) -> anyhow::Result<()> {
    auth::validate_new_password(&password)?;

    let role = if db::count_users(&ctx.pool).await? == 0 {
        if role.is_some_and(|requested| requested != Role::Admin) {
            warn!("first user is always registered as admin");
        }
        Role::Admin
    } else {
        ctx.authorize(&[Permission::ManageUsers])?;
        role.unwrap_or(Role::Member)
    };

    let user = User {
        id: Uuid::new_v4(),
        email: email.trim().to_lowercase(),
        password_hash: auth::hash_password(&password)?,
        first_name,
        last_name,
        role,
        is_active: true,
        created_at: ctx.now,
    };
    db::insert_user(&ctx.pool, &user).await?;

    ctx.emit(&user, |user| {
        println!("Registered {} as {} ({}).", user.full_name(), user.role, user.id);
    })
}

async fn login(ctx: &Context, email: &str, password: &str) -> anyhow::Result<()> {
    let rejected = || EngagementError::Unauthorized("invalid email or password".to_string());

    let user = db::find_user_by_email(&ctx.pool, email)
        .await?
        .ok_or_else(rejected)?;
    if !auth::verify_password(password, &user.password_hash) {
        warn!(email = %email, "login rejected");
        return Err(rejected().into());
    }
    if !user.is_active {
        return Err(EngagementError::Unauthorized("account is inactive".to_string()).into());
    }

    // Expiry is checked against the wall clock, so ignore --as-of here.
    let token = ctx.tokens()?.issue(&user, Utc::now())?;
    info!(user_id = %user.id, "token issued");

    let output = LoginOutput {
        access_token: &token,
        token_type: "bearer",
        expires_in: ctx.settings.token_ttl().num_seconds(),
        user: &user,
    };
    ctx.emit(&output, |output| {
        println!("{}", output.access_token);
    })
}
