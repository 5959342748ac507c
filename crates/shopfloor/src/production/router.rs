use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::aggregation::{LogWindow, SHORT_HISTORY_DAYS};
use super::dates::{deserialize_optional_date, deserialize_optional_month};
use super::domain::{LogId, Operation, Operator, ProductModel, RuleDraft, RuleId, WorkSubmission};
use super::repository::{
    CatalogRepository, LogFilter, LogRepository, RepositoryError, RuleRepository, SettingsStore,
};
use super::service::{ProductionService, ProductionServiceError};

pub const SUBJECT_HEADER: &str = "x-credential-subject";
pub const SECRET_HEADER: &str = "x-credential-secret";

type SharedService<R, L, S, C> = State<Arc<ProductionService<R, L, S, C>>>;

/// Router builder exposing the logging, matrix, reporting and catalog endpoints.
pub fn production_router<R, L, S, C>(service: Arc<ProductionService<R, L, S, C>>) -> Router
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/logs",
            post(log_work_handler::<R, L, S, C>).get(list_logs_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/logs/:log_id",
            put(edit_log_handler::<R, L, S, C>).delete(delete_log_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/rules",
            get(list_rules_handler::<R, L, S, C>).post(add_rule_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/rules/import",
            post(import_rules_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/rules/recalculate",
            post(recalculate_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/rules/:rule_id",
            put(update_rule_handler::<R, L, S, C>).delete(delete_rule_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/target",
            get(get_target_handler::<R, L, S, C>).put(set_target_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/operators/:operator/report",
            get(operator_report_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/operators/:operator/history",
            get(history_handler::<R, L, S, C>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<R, L, S, C>))
        .route("/api/v1/catalog", get(catalog_handler::<R, L, S, C>))
        .route(
            "/api/v1/catalog/operators",
            post(register_operator_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/catalog/models",
            post(register_model_handler::<R, L, S, C>),
        )
        .route(
            "/api/v1/catalog/operations",
            post(register_operation_handler::<R, L, S, C>),
        )
        .route("/api/v1/auth/verify", post(verify_handler::<R, L, S, C>))
        .with_state(service)
}

pub(crate) fn error_response(error: ProductionServiceError) -> Response {
    let status = match &error {
        ProductionServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ProductionServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
        ProductionServiceError::Import(_) => StatusCode::BAD_REQUEST,
        ProductionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ProductionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ProductionServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, ProductionServiceError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(error) => error_response(error),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn authorize<R, L, S, C>(
    service: &ProductionService<R, L, S, C>,
    headers: &HeaderMap,
) -> Result<(), ProductionServiceError>
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    service.authorize_admin(header(headers, SUBJECT_HEADER), header(headers, SECRET_HEADER))
}

fn authorize_log_change<R, L, S, C>(
    service: &ProductionService<R, L, S, C>,
    headers: &HeaderMap,
    id: &LogId,
    new_operator: Option<&str>,
) -> Result<(), ProductionServiceError>
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    service.authorize_log_change(
        id,
        new_operator,
        header(headers, SUBJECT_HEADER),
        header(headers, SECRET_HEADER),
    )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogsQuery {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    to: Option<NaiveDate>,
    #[serde(default)]
    operator: Option<String>,
}

impl LogsQuery {
    fn into_filter(self) -> Result<LogFilter, ProductionServiceError> {
        let window = match (self.date, self.from, self.to) {
            (Some(date), None, None) => LogWindow::Day { date },
            (None, Some(from), Some(to)) if from <= to => LogWindow::Range { from, to },
            (None, Some(_), Some(_)) => {
                return Err(ProductionServiceError::Validation(
                    "'from' must not be after 'to'".to_string(),
                ))
            }
            (None, None, None) => LogWindow::Unrestricted,
            _ => {
                return Err(ProductionServiceError::Validation(
                    "use either 'date' or both 'from' and 'to'".to_string(),
                ))
            }
        };

        Ok(LogFilter {
            window,
            operator: self.operator.filter(|name| !name.trim().is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportQuery {
    #[serde(default, deserialize_with = "deserialize_optional_month")]
    month: Option<LogWindow>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DashboardQuery {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TargetPayload {
    points: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyRequest {
    subject: String,
    secret: String,
}

pub(crate) async fn log_work_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Json(submission): Json<WorkSubmission>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    respond(StatusCode::CREATED, service.log_work(submission))
}

pub(crate) async fn list_logs_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Query(query): Query<LogsQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = query
        .into_filter()
        .and_then(|filter| service.logs(&filter));
    respond(StatusCode::OK, result)
}

pub(crate) async fn edit_log_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Path(log_id): Path<String>,
    Json(submission): Json<WorkSubmission>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let id = LogId(log_id);
    let result = authorize_log_change(
        &service,
        &headers,
        &id,
        Some(submission.operator.as_str()),
    )
    .and_then(|()| service.edit_log(&id, submission));
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_log_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Path(log_id): Path<String>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let id = LogId(log_id);
    match authorize_log_change(&service, &headers, &id, None)
        .and_then(|()| service.delete_log(&id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_rules_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    respond(StatusCode::OK, service.rules())
}

pub(crate) async fn add_rule_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Json(draft): Json<RuleDraft>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers).and_then(|()| service.add_rule(draft));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn update_rule_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Path(rule_id): Path<String>,
    Json(draft): Json<RuleDraft>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result =
        authorize(&service, &headers).and_then(|()| service.update_rule(&RuleId(rule_id), draft));
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_rule_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Path(rule_id): Path<String>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    match authorize(&service, &headers).and_then(|()| service.delete_rule(&RuleId(rule_id))) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn import_rules_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    body: String,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers)
        .and_then(|()| service.import_rules(Cursor::new(body.into_bytes())));
    respond(StatusCode::OK, result)
}

pub(crate) async fn recalculate_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers).and_then(|()| service.recalculate_all());
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_target_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = service.target().map(|target| TargetPayload {
        points: target.points(),
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn set_target_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Json(payload): Json<TargetPayload>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers)
        .and_then(|()| service.set_target(payload.points))
        .map(|target| TargetPayload {
            points: target.points(),
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn operator_report_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Path(operator): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let window = query.month.unwrap_or(LogWindow::Unrestricted);
    respond(StatusCode::OK, service.operator_report(&operator, window))
}

pub(crate) async fn history_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Path(operator): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let limit = query.limit.unwrap_or(SHORT_HISTORY_DAYS);
    respond(StatusCode::OK, service.recent_history(&operator, limit))
}

pub(crate) async fn dashboard_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = query
        .date
        .ok_or_else(|| ProductionServiceError::Validation("'date' is required".to_string()))
        .and_then(|date| service.daily_dashboard(date));
    respond(StatusCode::OK, result)
}

pub(crate) async fn catalog_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    respond(StatusCode::OK, service.catalog())
}

pub(crate) async fn register_operator_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Json(operator): Json<Operator>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers).and_then(|()| service.register_operator(operator));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn register_model_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Json(model): Json<ProductModel>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result = authorize(&service, &headers).and_then(|()| service.register_model(model));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn register_operation_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    headers: HeaderMap,
    Json(operation): Json<Operation>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let result =
        authorize(&service, &headers).and_then(|()| service.register_operation(operation));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn verify_handler<R, L, S, C>(
    State(service): SharedService<R, L, S, C>,
    Json(request): Json<VerifyRequest>,
) -> Response
where
    R: RuleRepository + 'static,
    L: LogRepository + 'static,
    S: SettingsStore + 'static,
    C: CatalogRepository + 'static,
{
    let valid = service.verify_credential(&request.subject, &request.secret);
    (StatusCode::OK, Json(json!({ "valid": valid }))).into_response()
}
