//! Auth command - session management.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use serde_json::json;
use sigil_client::{Profile, SignInInput, SignUpInput};
use sigil_session::{FetchPolicy, LogoutOutcome, SessionError};

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with a username and password
    Login {
        /// Username or email
        username: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "SIGIL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Keep the token for this invocation only
        #[arg(long)]
        no_remember: bool,
    },

    /// Create an account and sign in
    Signup {
        /// Email address
        #[arg(long)]
        email: String,

        /// Username
        #[arg(long)]
        username: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "SIGIL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Keep the token for this invocation only
        #[arg(long)]
        no_remember: bool,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the stored session
    Status,

    /// Ask the server who the current token belongs to
    Whoami,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login {
            username,
            password,
            no_remember,
        } => cmd_login(ctx, username, password, no_remember).await,
        AuthCommand::Signup {
            email,
            username,
            password,
            no_remember,
        } => cmd_signup(ctx, email, username, password, no_remember).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Status => cmd_status(ctx),
        AuthCommand::Whoami => cmd_whoami(ctx).await,
    }
}

fn read_password(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        return Err(anyhow!("Password must not be empty"));
    }
    Ok(password)
}

fn remember(ctx: &Context, no_remember: bool) -> bool {
    !no_remember && ctx.config().session().remember
}

/// Turn a session error into a message fit for the terminal.
fn auth_failure(e: SessionError) -> anyhow::Error {
    match e {
        SessionError::Remote(remote) => anyhow!("Sign-in failed: {}", remote.user_message()),
        SessionError::Unauthenticated(message) => {
            anyhow!("Sign-in rejected by the server: {}", message)
        }
        other => anyhow!("Sign-in failed: {}", other),
    }
}

fn print_signed_in(ctx: &Context, profile: Option<&Profile>, remember: bool) -> Result<()> {
    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "authenticated": true,
                "remembered": remember,
                "profile": profile,
            }))?
        );
        return Ok(());
    }

    match profile {
        Some(profile) => println!("Signed in as {}.", profile.display_name()),
        None => println!("Signed in."),
    }
    if !remember {
        println!("Session not remembered; it ends when this command exits.");
    }
    Ok(())
}

async fn cmd_login(
    ctx: &Context,
    username: String,
    password: Option<String>,
    no_remember: bool,
) -> Result<()> {
    let input = SignInInput::new(username, read_password(password)?);
    let remember = remember(ctx, no_remember);

    let session = ctx.session()?;
    let profile = session
        .manager()
        .sign_in(&input, remember)
        .await
        .map_err(auth_failure)?;

    print_signed_in(ctx, profile.as_ref(), remember)?;
    session.end_session();
    Ok(())
}

async fn cmd_signup(
    ctx: &Context,
    email: String,
    username: String,
    password: Option<String>,
    no_remember: bool,
) -> Result<()> {
    let input = SignUpInput::new(email, username, read_password(password)?);
    let remember = remember(ctx, no_remember);

    let session = ctx.session()?;
    let profile = session
        .manager()
        .sign_up(&input, remember)
        .await
        .map_err(auth_failure)?;

    print_signed_in(ctx, profile.as_ref(), remember)?;
    session.end_session();
    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let manager = session.manager();

    if !manager.has_session() {
        if ctx.json_output {
            println!("{}", json!({"signedOut": false}));
        } else {
            println!("Not signed in.");
        }
        return Ok(());
    }

    let outcome = manager.logout().await?;
    if ctx.json_output {
        println!(
            "{}",
            json!({"signedOut": true, "confirmed": outcome == LogoutOutcome::Confirmed})
        );
    } else {
        match outcome {
            LogoutOutcome::Confirmed => println!("Signed out."),
            LogoutOutcome::LocalOnly => {
                println!("Signed out locally (the server could not be reached).")
            }
        }
    }
    Ok(())
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let tokens = session.tokens();
    let profile = tokens.current_profile();
    let tier = tokens.active_tier();
    let stored_at = tokens.stored_at();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "authenticated": tier.is_some(),
                "tier": tier.map(|t| t.to_string()),
                "storedAt": stored_at.map(|t| t.to_rfc3339()),
                "profile": profile,
                "endpoint": session.client().endpoint().as_str(),
            }))?
        );
        return Ok(());
    }

    println!("Session Status");
    println!("--------------");

    match tier {
        Some(tier) => {
            println!("Signed in ({} storage)", tier);
            if let Some(profile) = &profile {
                println!("  User: {}", profile.display_name());
                if let Some(email) = &profile.email {
                    println!("  Email: {}", email);
                }
            }
            if let Some(stored_at) = stored_at {
                println!(
                    "  Since: {}",
                    stored_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
                );
            }
        }
        None => {
            println!("Not signed in");
            println!("  Run 'sigil auth login <username>' to sign in");
        }
    }

    if ctx.verbose {
        println!();
        println!("Endpoint: {}", session.client().endpoint());
        println!("Data dir: {}", ctx.data_dir().display());
    }

    Ok(())
}

async fn cmd_whoami(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let manager = session.manager();

    if !manager.require_session().await {
        return Err(anyhow!("Not signed in. Run 'sigil auth login <username>' first."));
    }

    let profile = manager
        .me(FetchPolicy::NetworkOnly)
        .await
        .map_err(|e| match e {
            SessionError::Unauthenticated(_) => {
                anyhow!("Session expired and was cleared. Run 'sigil auth login' again.")
            }
            other => anyhow!(other),
        })?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "me": profile }))?);
        return Ok(());
    }

    match profile {
        Some(profile) => println!("{}", profile.display_name()),
        None => println!("The server does not recognise this session."),
    }
    Ok(())
}
