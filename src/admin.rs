//! Admin-facing routes: auth, the ranked dashboard, branch allocation and
//! payment verification.

use std::path::PathBuf;

use axum::extract::{Form, Path};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{valid_name, AdminRow, Plus2Marks, StudentRow};
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
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateForm {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentForm {
    #[serde(default)]
    pub student_id: String,
}

pub struct RankedStudent {
    pub row: StudentRow,
    pub plus2: Plus2Marks,
    pub total: f64,
}

/// Descending by plus-two total. `sort_by` is stable, so students with equal
/// totals keep their fetch order.
pub fn rank_students(rows: Vec<StudentRow>) -> Vec<RankedStudent> {
    let mut ranked: Vec<RankedStudent> = rows
        .into_iter()
        .map(|row| {
            let plus2 = row.plus2();
            let total = plus2.total();
            RankedStudent { row, plus2, total }
        })
        .collect();
    ranked.sort_by(|a, b| b.total.total_cmp(&a.total));
    ranked
}

pub async fn signup_form(mut ctx: SessionContext) -> HandlerResult {
    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::admin_signup(&flash)))
}

pub async fn signup(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<SignupForm>,
) -> HandlerResult {
    if !valid_name(&body.name) {
        ctx.flash_error("Name may only contain letters, spaces, apostrophes, hyphens and periods.")
            .await;
        return Ok(ctx.redirect("/admin/signup"));
    }
    if body.password.is_empty() {
        ctx.flash_error("Password must not be empty.").await;
        return Ok(ctx.redirect("/admin/signup"));
    }

    let existing = sqlx::query_as::<_, AdminRow>("SELECT * FROM admins WHERE email = $1 LIMIT 1")
        .bind(&body.email)
        .fetch_optional(&pg)
        .await?;
    if existing.is_some() {
        ctx.flash_error(ACCOUNT_EXISTS).await;
        return Ok(ctx.redirect("/admin/signup"));
    }

    let password_hash = match credentials::hash(&body.password) {
        Ok(hashed) => hashed,
        Err(err) => {
            log::error!("admin signup hashing failed: {}", err);
            ctx.flash_error("Could not create the account.").await;
            return Ok(ctx.redirect("/admin/signup"));
        }
    };

    let res = sqlx::query(
        "INSERT INTO admins (id, name, email, password_hash, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(body.name.trim())
    .bind(&body.email)
    .bind(&password_hash)
    .bind(Utc::now())
    .execute(&pg)
    .await;

    match res {
        Ok(_) => {
            ctx.flash_success("Admin created. Please login.").await;
            Ok(ctx.redirect("/admin/login"))
        }
        Err(err) => {
            log::error!("admin signup insert failed: {}", err);
            ctx.flash_error(ACCOUNT_EXISTS).await;
            Ok(ctx.redirect("/admin/signup"))
        }
    }
}

pub async fn login_form(mut ctx: SessionContext) -> HandlerResult {
    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::admin_login(&flash)))
}

pub async fn login(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<LoginForm>,
) -> HandlerResult {
    let admin = sqlx::query_as::<_, AdminRow>("SELECT * FROM admins WHERE email = $1 LIMIT 1")
        .bind(&body.email)
        .fetch_optional(&pg)
        .await?;

    let stored = admin.as_ref().map(|row| row.password_hash.as_str());
    if !credentials::verify_candidate(&body.password, stored) {
        ctx.flash_error(INVALID_CREDENTIALS).await;
        return Ok(ctx.redirect("/admin/login"));
    }

    if let Some(admin) = admin {
        ctx.login_admin(admin.identity()).await;
    }
    Ok(ctx.redirect("/admin/dashboard"))
}

pub async fn logout(mut ctx: SessionContext) -> HandlerResult {
    ctx.logout_admin().await;
    Ok(ctx.redirect("/"))
}

pub async fn dashboard(mut ctx: SessionContext, Extension(pg): Extension<PgPool>) -> HandlerResult {
    let ident = match ctx.admin() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/admin/login")),
    };

    // created_at defines the fetch order that ties fall back to.
    let rows = sqlx::query_as::<_, StudentRow>("SELECT * FROM students ORDER BY created_at")
        .fetch_all(&pg)
        .await?;
    let ranked = rank_students(rows);

    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::admin_dashboard(&ident.name, &ranked, &flash)))
}

pub async fn allocate(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<AllocateForm>,
) -> HandlerResult {
    let ident = match ctx.admin() {
        Some(ident) => ident.clone(),
        None => return Ok(ctx.redirect("/admin/login")),
    };

    let student_id = match Uuid::parse_str(body.student_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            ctx.flash_error("Invalid student id.").await;
            return Ok(ctx.redirect("/admin/dashboard"));
        }
    };
    let branch = body.branch.trim();
    if branch.is_empty() {
        ctx.flash_error("Branch must not be empty.").await;
        return Ok(ctx.redirect("/admin/dashboard"));
    }

    // The branch is deliberately not checked against the student's choices;
    // the admin has override authority.
    let res = sqlx::query(
        "UPDATE students SET allocated_branch = $1, allocated_by_admin = $2 WHERE id = $3",
    )
    .bind(branch)
    .bind(ident.id)
    .bind(student_id)
    .execute(&pg)
    .await?;

    if res.rows_affected() < 1 {
        ctx.flash_error("No such student.").await;
    } else {
        ctx.flash_success("Branch allocated.").await;
    }
    Ok(ctx.redirect("/admin/dashboard"))
}

pub async fn verify_payment(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Form(body): Form<VerifyPaymentForm>,
) -> HandlerResult {
    if ctx.admin().is_none() {
        return Ok(ctx.redirect("/admin/login"));
    }

    let student_id = match Uuid::parse_str(body.student_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            ctx.flash_error("Invalid student id.").await;
            return Ok(ctx.redirect("/admin/dashboard"));
        }
    };

    let res = sqlx::query(
        "UPDATE students SET payment_verified = TRUE, offer_generated = TRUE WHERE id = $1",
    )
    .bind(student_id)
    .execute(&pg)
    .await?;
    if res.rows_affected() < 1 {
        ctx.flash_error("No such student.").await;
        return Ok(ctx.redirect("/admin/dashboard"));
    }

    let student =
        sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1 LIMIT 1")
            .bind(student_id)
            .fetch_optional(&pg)
            .await?;

    match student {
        Some(student) => match offer::generate(&student).await {
            Ok(()) => {
                ctx.flash_success("Payment verified and offer generated.")
                    .await;
            }
            Err(err) => {
                // The flag is already set and the letter is missing; the
                // inconsistency is visible here and only here.
                log::error!("offer generation failed for {}: {}", student_id, err);
                ctx.flash_error("Payment verified, but the offer letter could not be written.")
                    .await;
            }
        },
        None => ctx.flash_error("No such student.").await,
    }
    Ok(ctx.redirect("/admin/dashboard"))
}

pub async fn receipt(
    mut ctx: SessionContext,
    Extension(pg): Extension<PgPool>,
    Path(student_id): Path<Uuid>,
) -> HandlerResult {
    if ctx.admin().is_none() {
        return Ok(ctx.redirect("/admin/login"));
    }

    let student = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1 LIMIT 1")
        .bind(student_id)
        .fetch_optional(&pg)
        .await?;

    match student.and_then(|row| row.payment_receipt) {
        Some(filename) => {
            let bytes = io::read_io_file(PathBuf::from(io::UPLOADS_DIR).join(&filename)).await?;
            Ok(ctx.file(bytes))
        }
        None => {
            ctx.flash_error("No receipt on file for that student.").await;
            Ok(ctx.redirect("/admin/dashboard"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, plus2_marks: Option<&str>) -> StudentRow {
        StudentRow {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "555".to_owned(),
            password_hash: String::new(),
            highschool_marks: None,
            plus2_marks: plus2_marks.map(str::to_owned),
            branch_choice1: None,
            branch_choice2: None,
            allocated_branch: None,
            allocated_by_admin: None,
            accepted_allocation: false,
            payment_receipt: None,
            payment_verified: false,
            offer_generated: false,
            created_at: Utc::now(),
        }
    }

    fn names(ranked: &[RankedStudent]) -> Vec<&str> {
        ranked.iter().map(|entry| entry.row.name.as_str()).collect()
    }

    #[test]
    fn ranking_sorts_by_descending_total() {
        let rows = vec![
            student("Bela", Some(r#"{"Physics":50,"Chemistry":50,"Math":50}"#)),
            student("Asha", Some(r#"{"Physics":80,"Chemistry":70,"Math":90}"#)),
            student("Chand", Some(r#"{"Physics":60,"Chemistry":60,"Math":60}"#)),
        ];
        let ranked = rank_students(rows);
        assert_eq!(names(&ranked), vec!["Asha", "Chand", "Bela"]);
        assert_eq!(ranked[0].total, 240.0);
    }

    #[test]
    fn ties_keep_fetch_order() {
        let rows = vec![
            student("First", Some(r#"{"Physics":50,"Chemistry":50,"Math":50}"#)),
            student("Second", Some(r#"{"Physics":75,"Chemistry":75,"Math":0}"#)),
            student("Top", Some(r#"{"Physics":90,"Chemistry":90,"Math":90}"#)),
        ];
        let ranked = rank_students(rows);
        assert_eq!(names(&ranked), vec!["Top", "First", "Second"]);
    }

    #[test]
    fn malformed_marks_rank_with_total_zero() {
        let rows = vec![
            student("Broken", Some("{{ not json")),
            student("Empty", None),
            student("Partial", Some(r#"{"Physics":"abc","Math":40}"#)),
        ];
        let ranked = rank_students(rows);
        assert_eq!(names(&ranked), vec!["Partial", "Broken", "Empty"]);
        assert_eq!(ranked[0].total, 40.0);
        assert_eq!(ranked[1].total, 0.0);
        assert_eq!(ranked[2].total, 0.0);
    }
}
