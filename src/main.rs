pub mod admin;
pub mod config;
pub mod credentials;
pub mod err;
pub mod io;
pub mod models;
pub mod offer;
pub mod session;
pub mod student;
pub mod view;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::handler::Handler;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceBuilder;

use crate::config::Config;
use crate::err::Error;
use crate::session::{MemoryStore, SessionContext, SessionHandle};

pub type HandlerResult = axum::response::Result<Response, Error>;

// Shared so that no auth path can leak which emails are registered.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const ACCOUNT_EXISTS: &str = "Could not create the account, the email may already exist.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::load();

    io::prepare_io().await?;

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect(&config.database_url())
        .await?;
    init_schema(&pool).await?;

    let sessions: SessionHandle = Arc::new(MemoryStore::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/student/signup", get(student::signup_form).post(student::signup))
        .route("/student/login", get(student::login_form).post(student::login))
        .route("/student/logout", get(student::logout))
        .route("/student/dashboard", get(student::dashboard))
        .route("/student/details", post(student::submit_details))
        .route("/student/upload_receipt", post(student::upload_receipt))
        .route("/student/accept_allocation", post(student::accept_allocation))
        .route("/student/offer", get(student::offer_letter))
        .route("/admin/signup", get(admin::signup_form).post(admin::signup))
        .route("/admin/login", get(admin::login_form).post(admin::login))
        .route("/admin/logout", get(admin::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/allocate", post(admin::allocate))
        .route("/admin/verify_payment", post(admin::verify_payment))
        .route("/admin/receipt/:student_id", get(admin::receipt))
        .fallback(err::handler_404.into_service())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(pool))
                .layer(Extension(sessions)),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log::info!("Starting counseling portal on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn index(mut ctx: SessionContext) -> HandlerResult {
    let flash = ctx.take_flash().await;
    Ok(ctx.page(view::index(&flash)))
}

async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(CREATE_STUDENTS).execute(pool).await?;
    sqlx::query(CREATE_ADMINS).execute(pool).await?;
    Ok(())
}

const CREATE_STUDENTS: &str = "\
CREATE TABLE IF NOT EXISTS students (\
    id UUID PRIMARY KEY,\
    name TEXT NOT NULL,\
    email TEXT NOT NULL UNIQUE,\
    phone TEXT NOT NULL,\
    password_hash TEXT NOT NULL,\
    highschool_marks TEXT,\
    plus2_marks TEXT,\
    branch_choice1 TEXT,\
    branch_choice2 TEXT,\
    allocated_branch TEXT,\
    allocated_by_admin UUID,\
    accepted_allocation BOOLEAN NOT NULL DEFAULT FALSE,\
    payment_receipt TEXT,\
    payment_verified BOOLEAN NOT NULL DEFAULT FALSE,\
    offer_generated BOOLEAN NOT NULL DEFAULT FALSE,\
    created_at TIMESTAMPTZ NOT NULL\
)";

const CREATE_ADMINS: &str = "\
CREATE TABLE IF NOT EXISTS admins (\
    id UUID PRIMARY KEY,\
    name TEXT NOT NULL,\
    email TEXT NOT NULL UNIQUE,\
    password_hash TEXT NOT NULL,\
    created_at TIMESTAMPTZ NOT NULL\
)";
