//! Student-facing routes: auth, dashboard, details, receipt upload,
//! allocation acceptance and the offer view.

use axum::extract::{Form, Multipart};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{parse_mark, valid_name, HighschoolMarks, Plus2Marks, StudentRow};
use crate::session::SessionContext;
use crate::{credentials, io, offer, view, HandlerResult, ACCOUNT_EXISTS, INVALID_CREDENTIALS};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailsForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub hs_math: String,
    #[serde(default)]
    pub hs_science: String,
    #[serde(default)]
    pub hs_english: String,
    #[serde(default)]
    pub hs_hindi: String,
    #[serde(default)]
    pub plus_physics: String,
    #[serde(default)]
    pub plus_chem: String,
    #[serde(default)]
    pub plus_math: String,
    #[serde(default)]
    pub choice1: String,
    #[serde(default)]
    pub choice2: String,
}

pub async fn signup_form(mut ctx: SessionContext) -> HandlerResult {
    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::student_signup(&flash)))
}

pub async fn signup(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<SignupForm>,
) -> HandlerResult {
    if !valid_name(&body.name) {
        ctx.flash_error("Name may only contain letters, spaces, apostrophes, hyphens and periods.")
            .await;
        return Ok(ctx.redirect("/student/signup"));
    }
    if body.password.is_empty() {
        ctx.flash_error("Password must not be empty.").await;
        return Ok(ctx.redirect("/student/signup"));
    }

    let existing =
        sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE email = $1 LIMIT 1")
            .bind(&body.email)
            .fetch_optional(&pg)
            .await?;
    if existing.is_some() {
        ctx.flash_error(ACCOUNT_EXISTS).await;
        return Ok(ctx.redirect("/student/signup"));
    }

    let password_hash = match credentials::hash(&body.password) {
        Ok(hashed) => hashed,
        Err(err) => {
            // the plaintext never reaches the log
            log::error!("student signup hashing failed: {}", err);
            ctx.flash_error("Could not create the account.").await;
            return Ok(ctx.redirect("/student/signup"));
        }
    };

    let res = sqlx::query(
        "INSERT INTO students (id, name, email, phone, password_hash, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(body.name.trim())
    .bind(&body.email)
    .bind(&body.phone)
    .bind(&password_hash)
    .bind(Utc::now())
    .execute(&pg)
    .await;

    match res {
        Ok(_) => {
            ctx.flash_success("Signup successful. Please login.").await;
            Ok(ctx.redirect("/student/login"))
        }
        Err(err) => {
            // a duplicate email that raced past the pre-check lands here too
            log::error!("student signup insert failed: {}", err);
            ctx.flash_error(ACCOUNT_EXISTS).await;
            Ok(ctx.redirect("/student/signup"))
        }
    }
}

pub async fn login_form(mut ctx: SessionContext) -> HandlerResult {
    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::student_login(&flash)))
}

pub async fn login(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<LoginForm>,
) -> HandlerResult {
    let user = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE email = $1 LIMIT 1")
        .bind(&body.email)
        .fetch_optional(&pg)
        .await?;

    let stored = user.as_ref().map(|row| row.password_hash.as_str());
    if !credentials::verify_candidate(&body.password, stored) {
        ctx.flash_error(INVALID_CREDENTIALS).await;
        return Ok(ctx.redirect("/student/login"));
    }

    if let Some(user) = user {
        ctx.login_student(user.identity()).await;
    }
    Ok(ctx.redirect("/student/dashboard"))
}

pub async fn logout(mut ctx: SessionContext) -> HandlerResult {
    ctx.logout_student().await;
    Ok(ctx.redirect("/"))
}

pub async fn dashboard(mut ctx: SessionContext, Extension(pg): Extension<PgPool>) -> HandlerResult {
    let ident = match ctx.student() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/student/login")),
    };

    // Always re-read the row; the session copy only carries identity.
    let student = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1 LIMIT 1")
        .bind(ident.id)
        .fetch_optional(&pg)
        .await?;

    match student {
        Some(student) => {
            let flash = ctx.take_flash().await;
            Ok(ctx.page(view::student_dashboard(&student, &flash)))
        }
        None => {
            ctx.logout_student().await;
            Ok(ctx.redirect("/student/login"))
        }
    }
}

pub async fn submit_details(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<DetailsForm>,
) -> HandlerResult {
    let ident = match ctx.student() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/student/login")),
    };

    let highschool = HighschoolMarks {
        math: parse_mark(&body.hs_math),
        science: parse_mark(&body.hs_science),
        english: parse_mark(&body.hs_english),
        hindi: parse_mark(&body.hs_hindi),
    };
    let plus2 = Plus2Marks {
        physics: parse_mark(&body.plus_physics),
        chemistry: parse_mark(&body.plus_chem),
        math: parse_mark(&body.plus_math),
    };

    // Last write wins; there is no merge with previously saved details.
    sqlx::query(
        "UPDATE students SET name = $1, phone = $2, highschool_marks = $3, plus2_marks = $4, \
         branch_choice1 = $5, branch_choice2 = $6 WHERE id = $7",
    )
    .bind(&body.name)
    .bind(&body.phone)
    .bind(highschool.encode())
    .bind(plus2.encode())
    .bind(blank_to_null(&body.choice1))
    .bind(blank_to_null(&body.choice2))
    .bind(ident.id)
    .execute(&pg)
    .await?;

    ctx.flash_success("Details saved.").await;
    Ok(ctx.redirect("/student/dashboard"))
}

pub async fn upload_receipt(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    mut multipart: Multipart,
) -> HandlerResult {
    let ident = match ctx.student() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/student/login")),
    };

    let mut stored = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| Error::internal("MultipartError", err.to_string()))?
    {
        if field.name() != Some("receipt") {
            continue;
        }
        let original_name = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| Error::internal("MultipartError", err.to_string()))?;
        if !bytes.is_empty() {
            stored = Some(io::store_upload(&bytes, original_name.as_deref()).await?);
        }
        break;
    }

    match stored {
        Some(filename) => {
            // A fresh upload always goes back to unverified.
            sqlx::query(
                "UPDATE students SET payment_receipt = $1, payment_verified = FALSE WHERE id = $2",
            )
            .bind(&filename)
            .bind(ident.id)
            .execute(&pg)
            .await?;
            ctx.flash_success("Receipt uploaded. Awaiting admin verification.")
                .await;
        }
        None => {
            ctx.flash_error("No file uploaded.").await;
        }
    }
    Ok(ctx.redirect("/student/dashboard"))
}

pub async fn accept_allocation(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
) -> HandlerResult {
    let ident = match ctx.student() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/student/login")),
    };

    // Unconditional set; accepting twice is a no-op.
    sqlx::query("UPDATE students SET accepted_allocation = TRUE WHERE id = $1")
        .bind(ident.id)
        .execute(&pg)
        .await?;

    ctx.flash_success("You accepted the allocated branch. Please upload your payment receipt.")
        .await;
    Ok(ctx.redirect("/student/dashboard"))
}

pub async fn offer_letter(mut ctx: SessionContext) -> HandlerResult {
    let ident = match ctx.student() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/student/login")),
    };

    let path = offer::offer_path(ident.id);
    if !io::io_file_exists(&path) {
        ctx.flash_error("Offer not yet generated.").await;
        return Ok(ctx.redirect("/student/dashboard"));
    }
    let bytes = io::read_io_file(&path).await?;
    Ok(ctx.page(String::from_utf8_lossy(&bytes).into_owned()))
}

fn blank_to_null(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_choices_store_as_null() {
        assert_eq!(blank_to_null(""), None);
        assert_eq!(blank_to_null("   "), None);
        assert_eq!(blank_to_null(" CSE "), Some("CSE"));
    }
}
