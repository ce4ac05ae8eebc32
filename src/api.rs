//! HTTP routes consumed by the frontend.
//!
//! Every expense route takes a [`Session`], which verifies the bearer token
//! before the handler body runs.

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AuthService, Session};
use crate::balance::BalanceJson;
use crate::error::{LedgerError, LedgerResult};
use crate::expenses::{ExpenseJson, ExpenseService, NewExpense};

#[derive(Deserialize)]
struct RegisterJson {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginJson {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[post("/auth/register")]
async fn register(
    auth: web::Data<AuthService>,
    json: web::Json<RegisterJson>,
) -> LedgerResult<HttpResponse> {
    let response = auth
        .register(&json.username, &json.email, &json.password)
        .await?;
    Ok(HttpResponse::Created().json(response))
}

#[post("/auth/login")]
async fn login(
    auth: web::Data<AuthService>,
    json: web::Json<LoginJson>,
) -> LedgerResult<HttpResponse> {
    let response = auth.login(&json.email, &json.password).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/auth/me")]
async fn current_user(
    auth: web::Data<AuthService>,
    session: Session,
) -> LedgerResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(auth.current_user(&session).await?))
}

#[get("/expenses")]
async fn list_expenses(
    expenses: web::Data<ExpenseService>,
    session: Session,
) -> LedgerResult<HttpResponse> {
    let listed: Vec<ExpenseJson> = expenses
        .list(&session)
        .await?
        .into_iter()
        .map(ExpenseJson::from)
        .collect();
    Ok(HttpResponse::Ok().json(listed))
}

#[post("/expenses")]
async fn add_expense(
    expenses: web::Data<ExpenseService>,
    session: Session,
    expense: web::Json<NewExpense>,
) -> LedgerResult<HttpResponse> {
    let created = expenses.create(&session, expense.into_inner()).await?;
    Ok(HttpResponse::Created().json(ExpenseJson::from(created)))
}

#[delete("/expenses/{id}")]
async fn delete_expense(
    expenses: web::Data<ExpenseService>,
    session: Session,
    id: web::Path<String>,
) -> LedgerResult<HttpResponse> {
    expenses.delete(&session, &id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/balance")]
async fn get_balance(
    expenses: web::Data<ExpenseService>,
    session: Session,
) -> LedgerResult<HttpResponse> {
    let balance = expenses.balance(&session).await?;
    Ok(HttpResponse::Ok().json(BalanceJson::from(balance)))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Registers the `/api` routes and the health check. The caller provides
/// `web::Data<AuthService>` and `web::Data<ExpenseService>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _| {
        LedgerError::validation(format!("Invalid JSON body: {err}")).into()
    });
    cfg.service(health).service(
        web::scope("/api")
            .app_data(json_config)
            .service(register)
            .service(login)
            .service(current_user)
            .service(list_expenses)
            .service(add_expense)
            .service(delete_expense)
            .service(get_balance),
    );
}
