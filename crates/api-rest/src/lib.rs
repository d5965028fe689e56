//! REST surface for the UQM Operation API.
//!
//! Maps the core operations 1:1 to routes; handlers validate the wire types,
//! call a single engine operation and convert the result. All business rules
//! live in `uqm-core`; the only logic here is the translation of typed core
//! failures into HTTP status codes.

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use api_shared::dto;
use api_shared::HealthService;
use uqm_core::{
    AssignmentResolver, BankTicketEngine, Clock, CoreConfig, JourneyEngine, QueueError, Reporting,
    StoreSet,
};
use uqm_types::{BranchCode, DepartmentName};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    bank: Arc<BankTicketEngine>,
    journeys: Arc<JourneyEngine>,
    resolver: Arc<AssignmentResolver>,
    reporting: Arc<Reporting>,
}

impl AppState {
    /// Wires all engines onto one store set and clock.
    pub fn new(cfg: Arc<CoreConfig>, stores: StoreSet, clock: Arc<dyn Clock>) -> Self {
        let bank = Arc::new(BankTicketEngine::new(
            stores.bank_tickets.clone(),
            stores.counters.clone(),
            stores.sequences.clone(),
            clock.clone(),
            cfg.clone(),
        ));
        let journeys = Arc::new(JourneyEngine::new(
            stores.hospital_tickets.clone(),
            clock.clone(),
            cfg,
        ));
        let resolver = Arc::new(AssignmentResolver::new(
            stores.counters.clone(),
            stores.rooms.clone(),
            clock.clone(),
        ));
        let reporting = Arc::new(Reporting::new(
            stores.bank_tickets.clone(),
            stores.hospital_tickets.clone(),
            clock,
        ));
        Self {
            bank,
            journeys,
            resolver,
            reporting,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        issue_ticket,
        assign_to_counter,
        hold_ticket,
        serve_ticket,
        open_counter,
        find_available_counters,
        branch_summary,
        admit,
        enter_department,
        assign_room,
        clear_payment,
        advance,
        mark_no_show,
        assign_room_to_staff,
        journey_outcomes,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ErrorRes,
        dto::IssueTicketReq,
        dto::AssignCounterReq,
        dto::OpenCounterReq,
        dto::BankTicketRes,
        dto::CounterRes,
        dto::CountersRes,
        dto::BranchSummaryRes,
        dto::PayerDto,
        dto::AdmitReq,
        dto::EnterDepartmentReq,
        dto::AssignRoomReq,
        dto::ClearPaymentReq,
        dto::AssignRoomStaffReq,
        dto::VisitRes,
        dto::HospitalTicketRes,
        dto::RoomRes,
        dto::JourneyOutcomesRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router, Swagger UI included.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bank/tickets", post(issue_ticket))
        .route("/bank/tickets/:id/assign", post(assign_to_counter))
        .route("/bank/tickets/:id/hold", post(hold_ticket))
        .route("/bank/tickets/:id/serve", post(serve_ticket))
        .route("/bank/counters", post(open_counter))
        .route("/bank/branches/:branch/counters", get(find_available_counters))
        .route("/bank/branches/:branch/summary", get(branch_summary))
        .route("/hospital/tickets", post(admit))
        .route("/hospital/tickets/:id/enter", post(enter_department))
        .route("/hospital/tickets/:id/room", post(assign_room))
        .route("/hospital/tickets/:id/payment", post(clear_payment))
        .route("/hospital/tickets/:id/advance", post(advance))
        .route("/hospital/tickets/:id/no-show", post(mark_no_show))
        .route("/hospital/rooms", post(assign_room_to_staff))
        .route("/hospital/journeys/summary", get(journey_outcomes))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<dto::ErrorRes>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Core taxonomy → HTTP status. `Conflict` and `InvalidTransition` both map
/// to 409: the resource exists but refuses the request in its current state.
fn error_response(err: QueueError) -> ApiError {
    let status = match &err {
        QueueError::NotFound { .. } => StatusCode::NOT_FOUND,
        QueueError::InvalidTransition(_) | QueueError::Conflict(_) => StatusCode::CONFLICT,
        QueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "operation failed");
    }
    (
        status,
        Json(dto::ErrorRes {
            error: err.to_string(),
        }),
    )
}

fn parse_branch(input: &str) -> Result<BranchCode, ApiError> {
    BranchCode::new(input).map_err(|e| error_response(QueueError::from(e)))
}

fn parse_department(input: &str) -> Result<DepartmentName, ApiError> {
    DepartmentName::new(input).map_err(|e| error_response(QueueError::from(e)))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = dto::HealthRes)
    )
)]
/// Health check endpoint, used by monitoring and load balancers.
async fn health(State(_state): State<AppState>) -> Json<dto::HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/bank/tickets",
    request_body = dto::IssueTicketReq,
    responses(
        (status = 201, description = "Ticket issued", body = dto::BankTicketRes),
        (status = 400, description = "Invalid branch code", body = dto::ErrorRes)
    )
)]
/// Issues a new bank ticket with the next number for (branch, today).
async fn issue_ticket(
    State(state): State<AppState>,
    Json(req): Json<dto::IssueTicketReq>,
) -> Result<(StatusCode, Json<dto::BankTicketRes>), ApiError> {
    let branch = parse_branch(&req.branch)?;
    let ticket = state
        .bank
        .issue(req.queue_id, branch)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

#[utoipa::path(
    post,
    path = "/bank/tickets/{id}/assign",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = dto::AssignCounterReq,
    responses(
        (status = 200, description = "Ticket now serving", body = dto::BankTicketRes),
        (status = 404, description = "Ticket or counter not found", body = dto::ErrorRes),
        (status = 409, description = "Invalid transition or counter occupied", body = dto::ErrorRes)
    )
)]
/// Assigns the ticket to a counter and starts (or resumes) serving it.
async fn assign_to_counter(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<dto::AssignCounterReq>,
) -> ApiResult<dto::BankTicketRes> {
    let ticket = state
        .bank
        .assign_to_counter(id, req.counter_id)
        .map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/bank/tickets/{id}/hold",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket on hold", body = dto::BankTicketRes),
        (status = 404, description = "Ticket not found", body = dto::ErrorRes),
        (status = 409, description = "Ticket is not being served", body = dto::ErrorRes)
    )
)]
/// Puts a serving ticket on hold; the counter stays bound.
async fn hold_ticket(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<dto::BankTicketRes> {
    let ticket = state.bank.hold(id).map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/bank/tickets/{id}/serve",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket served", body = dto::BankTicketRes),
        (status = 404, description = "Ticket not found", body = dto::ErrorRes),
        (status = 409, description = "Ticket is not being served", body = dto::ErrorRes)
    )
)]
/// Completes service, finalises durations and releases the counter.
async fn serve_ticket(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<dto::BankTicketRes> {
    let ticket = state.bank.serve(id).map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/bank/counters",
    request_body = dto::OpenCounterReq,
    responses(
        (status = 201, description = "Counter opened", body = dto::CounterRes),
        (status = 409, description = "Counter number already open today", body = dto::ErrorRes)
    )
)]
/// Registers a counter for the branch for today.
async fn open_counter(
    State(state): State<AppState>,
    Json(req): Json<dto::OpenCounterReq>,
) -> Result<(StatusCode, Json<dto::CounterRes>), ApiError> {
    let branch = parse_branch(&req.branch)?;
    let counter = state
        .resolver
        .open_counter(branch, req.counter_number, req.user_id, req.queue_id)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(counter.into())))
}

#[utoipa::path(
    get,
    path = "/bank/branches/{branch}/counters",
    params(("branch" = String, Path, description = "Branch code")),
    responses(
        (status = 200, description = "Available counters, number ascending", body = dto::CountersRes)
    )
)]
/// Lists the branch's available counters for today.
async fn find_available_counters(
    State(state): State<AppState>,
    AxumPath(branch): AxumPath<String>,
) -> ApiResult<dto::CountersRes> {
    let branch = parse_branch(&branch)?;
    let counters = state
        .resolver
        .find_available_counters(&branch)
        .map_err(error_response)?;
    Ok(Json(dto::CountersRes {
        counters: counters.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/bank/branches/{branch}/summary",
    params(("branch" = String, Path, description = "Branch code")),
    responses(
        (status = 200, description = "Served-ticket statistics for today", body = dto::BranchSummaryRes)
    )
)]
/// Today's served-ticket statistics for the branch.
async fn branch_summary(
    State(state): State<AppState>,
    AxumPath(branch): AxumPath<String>,
) -> ApiResult<dto::BranchSummaryRes> {
    let branch = parse_branch(&branch)?;
    let summary = state
        .reporting
        .branch_day_summary(&branch)
        .map_err(error_response)?;
    Ok(Json(summary.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets",
    request_body = dto::AdmitReq,
    responses(
        (status = 201, description = "Ticket admitted into its first department", body = dto::HospitalTicketRes),
        (status = 404, description = "Unknown journey template", body = dto::ErrorRes)
    )
)]
/// Admits a patient: assigns the journey and enters its first department.
async fn admit(
    State(state): State<AppState>,
    Json(req): Json<dto::AdmitReq>,
) -> Result<(StatusCode, Json<dto::HospitalTicketRes>), ApiError> {
    let ticket = state
        .journeys
        .admit(&req.journey_id, req.payer.into())
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets/{id}/enter",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = dto::EnterDepartmentReq,
    responses(
        (status = 200, description = "Visit open (idempotent)", body = dto::HospitalTicketRes),
        (status = 404, description = "Ticket not found", body = dto::ErrorRes),
        (status = 409, description = "Ticket is terminal", body = dto::ErrorRes)
    )
)]
/// Opens a visit for the department; a no-op if one is already open there.
async fn enter_department(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<dto::EnterDepartmentReq>,
) -> ApiResult<dto::HospitalTicketRes> {
    let department = parse_department(&req.department)?;
    let ticket = state
        .journeys
        .enter_department(id, department)
        .map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets/{id}/room",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = dto::AssignRoomReq,
    responses(
        (status = 200, description = "Room assigned to the open visit", body = dto::HospitalTicketRes),
        (status = 404, description = "No open visit for the department", body = dto::ErrorRes)
    )
)]
/// Assigns a room to the open visit in the department. Arriving after the
/// stage closed is a benign race; the ticket is left unchanged.
async fn assign_room(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<dto::AssignRoomReq>,
) -> ApiResult<dto::HospitalTicketRes> {
    let department = parse_department(&req.department)?;
    let ticket = state
        .journeys
        .assign_room(id, &department, req.room_id)
        .map_err(|e| {
            if matches!(e, QueueError::NotFound { .. }) {
                tracing::warn!(ticket = %id, %department, "room assignment arrived after the stage closed");
            }
            error_response(e)
        })?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets/{id}/payment",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = dto::ClearPaymentReq,
    responses(
        (status = 200, description = "Payment cleared", body = dto::HospitalTicketRes),
        (status = 404, description = "No open visit for the department", body = dto::ErrorRes),
        (status = 409, description = "Already cleared", body = dto::ErrorRes)
    )
)]
/// Clears the cash payment for the open visit in the department.
async fn clear_payment(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<dto::ClearPaymentReq>,
) -> ApiResult<dto::HospitalTicketRes> {
    let department = parse_department(&req.department)?;
    let ticket = state
        .journeys
        .clear_payment(id, &department)
        .map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets/{id}/advance",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Journey moved one step forward", body = dto::HospitalTicketRes),
        (status = 404, description = "Ticket not found", body = dto::ErrorRes),
        (status = 409, description = "Open visit not eligible for completion", body = dto::ErrorRes)
    )
)]
/// Closes the current open visit and moves the journey forward one step.
async fn advance(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<dto::HospitalTicketRes> {
    let ticket = state.journeys.advance(id).map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/tickets/{id}/no-show",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket marked no-show", body = dto::HospitalTicketRes),
        (status = 404, description = "Ticket not found", body = dto::ErrorRes),
        (status = 409, description = "Ticket is already terminal", body = dto::ErrorRes)
    )
)]
/// Marks the ticket a no-show and closes its open visit.
async fn mark_no_show(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<dto::HospitalTicketRes> {
    let ticket = state.journeys.mark_no_show(id).map_err(error_response)?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/hospital/rooms",
    request_body = dto::AssignRoomStaffReq,
    responses(
        (status = 200, description = "Room upserted for the staff member", body = dto::RoomRes),
        (status = 409, description = "Room number taken in the department", body = dto::ErrorRes)
    )
)]
/// Upserts the room owned by a staff member.
async fn assign_room_to_staff(
    State(state): State<AppState>,
    Json(req): Json<dto::AssignRoomStaffReq>,
) -> ApiResult<dto::RoomRes> {
    let department = parse_department(&req.department)?;
    let room = state
        .resolver
        .assign_room_to_staff(req.staff_id, department, req.room_number)
        .map_err(error_response)?;
    Ok(Json(room.into()))
}

#[utoipa::path(
    get,
    path = "/hospital/journeys/summary",
    responses(
        (status = 200, description = "Journey outcome counts", body = dto::JourneyOutcomesRes)
    )
)]
/// Completed / no-show / in-progress counts over all journey tickets.
async fn journey_outcomes(State(state): State<AppState>) -> ApiResult<dto::JourneyOutcomesRes> {
    let outcomes = state.reporting.journey_outcomes().map_err(error_response)?;
    Ok(Json(outcomes.into()))
}
