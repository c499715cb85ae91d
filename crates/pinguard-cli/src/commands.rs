//! Command handlers

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use pinguard_core::{
    validate_new_pin, validate_pin_format, LockoutPolicy, PinAuthenticator, PinError,
    PinGuardConfig,
};
use pinguard_flow::{FlowError, HttpResetService, RecoveryContacts, RecoveryFlow, RecoveryMethod};
use tracing::warn;

use crate::prompt;

fn explain(e: PinError) -> anyhow::Error {
    match e {
        PinError::LockedOut { remaining } => anyhow!(
            "Too many failed attempts. Try again in {}",
            LockoutPolicy::describe(remaining)
        ),
        other => anyhow::Error::new(other),
    }
}

pub fn setup(
    auth: &PinAuthenticator,
    context: &str,
    pin: Option<String>,
    confirm: Option<String>,
) -> Result<()> {
    if auth.is_pin_setup(context).map_err(explain)? {
        bail!("A PIN is already set up for '{}'. Use `change` to replace it.", context);
    }

    let pin = prompt::pin("New PIN", pin)?;
    let confirm = prompt::pin("Confirm PIN", confirm)?;
    validate_new_pin(&pin, &confirm).map_err(explain)?;

    auth.setup_pin(context, &pin).map_err(explain)?;
    println!("PIN set up for '{}'", context);
    Ok(())
}

pub fn verify(auth: &PinAuthenticator, context: &str, pin: Option<String>) -> Result<()> {
    let pin = prompt::pin("PIN", pin)?;
    auth.verify_pin(context, &pin).map_err(explain)?;
    println!("PIN accepted");
    Ok(())
}

pub fn change(
    auth: &PinAuthenticator,
    context: &str,
    old_pin: Option<String>,
    new_pin: Option<String>,
    confirm: Option<String>,
) -> Result<()> {
    let old_pin = prompt::pin("Current PIN", old_pin)?;
    let new_pin = prompt::pin("New PIN", new_pin)?;
    let confirm = prompt::pin("Confirm new PIN", confirm)?;
    validate_new_pin(&new_pin, &confirm).map_err(explain)?;

    auth.change_pin(context, &old_pin, &new_pin).map_err(explain)?;
    println!("PIN changed");
    Ok(())
}

pub fn remove(auth: &PinAuthenticator, context: &str, pin: Option<String>) -> Result<()> {
    let pin = prompt::pin("Current PIN", pin)?;
    auth.remove_pin(context, &pin).map_err(explain)?;
    println!("PIN removed for '{}'", context);
    Ok(())
}

pub fn status(auth: &PinAuthenticator, context: &str, json: bool) -> Result<()> {
    let status = auth.security_status(context).map_err(explain)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Context:            {}", context);
    println!("PIN set up:         {}", if status.pin_setup { "yes" } else { "no" });
    println!("Failed attempts:    {}", status.failed_attempts);
    println!("Remaining attempts: {}", status.remaining_attempts);
    if status.is_locked_out {
        println!(
            "Locked out:         yes ({} remaining)",
            LockoutPolicy::countdown(status.lockout_remaining())
        );
    } else {
        println!("Locked out:         no");
    }
    Ok(())
}

pub fn validate(pin: Option<String>) -> Result<()> {
    let pin = prompt::pin("PIN", pin)?;
    validate_pin_format(&pin).map_err(explain)?;
    println!("PIN is acceptable");
    Ok(())
}

pub fn emergency_reset(auth: &PinAuthenticator, context: &str, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Emergency reset wipes the PIN without verifying it. Re-run with --yes-i-understand.");
    }

    warn!(context, "emergency reset requested from the command line");
    auth.emergency_reset(context).map_err(explain)?;
    println!("Credential and attempt state wiped for '{}'", context);
    Ok(())
}

pub async fn recover(
    auth: Arc<PinAuthenticator>,
    config: &PinGuardConfig,
    context: &str,
    method: RecoveryMethod,
    contact: String,
) -> Result<()> {
    let contacts = match method {
        RecoveryMethod::Phone => RecoveryContacts {
            phone: Some(contact),
            email: None,
        },
        RecoveryMethod::Email => RecoveryContacts {
            phone: None,
            email: Some(contact),
        },
    };
    let service = Arc::new(HttpResetService::new(&config.reset_service));
    let mut flow = RecoveryFlow::new(auth, service, context, contacts);

    flow.begin()?;
    flow.select_method(method)?;

    let masked = flow.masked_contact().unwrap_or_default();
    if !prompt::confirm(&format!("Send a reset code to {}?", masked))? {
        flow.cancel();
        println!("Recovery cancelled");
        return Ok(());
    }

    flow.send_code().await.map_err(|e| anyhow!(e.user_message()))?;
    println!("Code sent to your {}", method);

    loop {
        let code = prompt::line("Reset code (r to resend)")?;
        if code.eq_ignore_ascii_case("r") {
            match flow.resend_code().await {
                Ok(()) => println!("Code re-sent"),
                Err(e) => eprintln!("{}", e.user_message()),
            }
            continue;
        }

        match flow.submit_code(&code) {
            Ok(()) => break,
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }

    loop {
        let new_pin = prompt::line("New PIN")?;
        let confirm = prompt::line("Confirm new PIN")?;

        match flow.submit_new_pin(&new_pin, &confirm).await {
            Ok(()) => break,
            Err(FlowError::Pin(e)) if e.is_validation() => eprintln!("{}", e.user_message()),
            Err(e) => bail!("{}", e.user_message()),
        }
    }

    println!("PIN reset for '{}'", context);
    Ok(())
}
