//! Simple REST API server example for the library engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /books` - Catalog a book
//! - `GET /books` - List all books with availability
//! - `POST /users` - Register a user
//! - `GET /users` - List all users
//! - `POST /issues` - Check out a book (today's date unless `date` is given)
//! - `POST /issues/:id/return` - Return an issued book
//! - `GET /issues/open` - List open issues
//! - `GET /report` - Summary counts
//!
//! ## Example Usage
//!
//! ```bash
//! # Catalog a book
//! curl -X POST http://localhost:3000/books \
//!   -H "Content-Type: application/json" \
//!   -d '{"title": "Clean Code", "author": "Robert C. Martin", "total_copies": 2}'
//!
//! # Register a user
//! curl -X POST http://localhost:3000/users \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Alice"}'
//!
//! # Check out
//! curl -X POST http://localhost:3000/issues \
//!   -H "Content-Type: application/json" \
//!   -d '{"book_id": 1, "user_id": 1}'
//!
//! # Return
//! curl -X POST http://localhost:3000/issues/1/return \
//!   -H "Content-Type: application/json" -d '{}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use library_ledger_rs::{
    BookDetails, BookId, BookSnapshot, Issue, IssueId, Library, LibraryError, ReportSummary,
    User, UserDetails, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

/// Request body for checking out a book.
///
/// ```json
/// {"book_id": 1, "user_id": 1, "date": "2024-03-01", "loan_days": 7}
/// ```
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub book_id: u32,
    pub user_id: u32,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub loan_days: Option<u32>,
}

/// Request body for returning a book.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the library engine.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// === Error Handling ===

/// Wrapper for converting `LibraryError` into HTTP responses.
pub struct AppError(LibraryError);

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LibraryError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LibraryError::Unavailable { .. } => (StatusCode::CONFLICT, "UNAVAILABLE"),
            LibraryError::AlreadyReturned { .. } => (StatusCode::CONFLICT, "ALREADY_RETURNED"),
            LibraryError::UserNotEligible { .. } => (StatusCode::FORBIDDEN, "USER_NOT_ELIGIBLE"),
            LibraryError::BookHasOpenIssues { .. } | LibraryError::UserHasOpenIssues { .. } => {
                (StatusCode::CONFLICT, "HAS_OPEN_ISSUES")
            }
            LibraryError::DuplicateIsbn(_) => (StatusCode::CONFLICT, "DUPLICATE_ISBN"),
            LibraryError::DuplicateEmail(_) => (StatusCode::CONFLICT, "DUPLICATE_EMAIL"),
            LibraryError::DuplicateIssue => (StatusCode::CONFLICT, "DUPLICATE_ISSUE"),
            LibraryError::InvalidCopies { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_COPIES")
            }
            LibraryError::EmptyTitle | LibraryError::EmptyName => {
                (StatusCode::BAD_REQUEST, "MISSING_FIELD")
            }
            LibraryError::InvalidLoanPeriod => (StatusCode::BAD_REQUEST, "INVALID_LOAN_PERIOD"),
            LibraryError::InvalidReturnDate { .. } => {
                (StatusCode::BAD_REQUEST, "INVALID_RETURN_DATE")
            }
            LibraryError::FineOverflow { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "FINE_OVERFLOW")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /books - Catalog a book.
async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<BookDetails>,
) -> Result<(StatusCode, Json<BookSnapshot>), AppError> {
    let book = state.library.add_book(request)?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /books - List all books.
async fn list_books(State(state): State<AppState>) -> Json<Vec<BookSnapshot>> {
    Json(state.library.books())
}

/// POST /users - Register a user.
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<UserDetails>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.library.add_user(request)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users - List all users.
async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.library.users())
}

/// POST /issues - Check out a book.
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Issue>), AppError> {
    let book_id = BookId(request.book_id);
    let user_id = UserId(request.user_id);
    let date = request.date.unwrap_or_else(today);
    let issue = match request.loan_days {
        Some(days) => state
            .library
            .checkout_with_period(book_id, user_id, date, days)?,
        None => state.library.checkout(book_id, user_id, date)?,
    };
    Ok((StatusCode::CREATED, Json(issue)))
}

/// POST /issues/:id/return - Return an issued book.
async fn return_book(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<ReturnRequest>,
) -> Result<Json<Issue>, AppError> {
    let date = request.date.unwrap_or_else(today);
    let issue = state.library.return_book(IssueId(id), date)?;
    Ok(Json(issue))
}

/// GET /issues/open - List open issues.
async fn list_open_issues(State(state): State<AppState>) -> Json<Vec<Issue>> {
    Json(state.library.open_issues())
}

/// GET /report - Summary counts as of today.
async fn report(State(state): State<AppState>) -> Json<ReportSummary> {
    Json(state.library.report_summary(today()))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/books", post(create_book).get(list_books))
        .route("/users", post(create_user).get(list_users))
        .route("/issues", post(checkout))
        .route("/issues/open", get(list_open_issues))
        .route("/issues/{id}/return", post(return_book))
        .route("/report", get(report))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = AppState {
        library: Arc::new(Library::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    tracing::info!("Library API server running on http://127.0.0.1:3000");

    axum::serve(listener, app).await.unwrap();
}
