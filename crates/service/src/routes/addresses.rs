//! Address book route handlers.

use address_book_core::{Address, AddressFilter};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheService;
use crate::db::AddressStore;
use crate::encryption::EncryptionGateway;
use crate::error::{AppError, Result};
use crate::middleware::Customer;
use crate::services::AddressPage;
use crate::services::validator::{
    AddressRequest, Page, parse_address_id, parse_default, parse_filter, parse_role,
};
use crate::state::AppState;

/// `?limit=&offset=` of list requests, validated by [`Page::parse`].
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
    offset: Option<String>,
}

impl ListQuery {
    fn page(&self) -> Result<Page> {
        Ok(Page::parse(self.limit.as_deref(), self.offset.as_deref())?)
    }
}

/// `?default=1&default_type=` of create and update requests.
#[derive(Debug, Default, Deserialize)]
pub struct DefaultQuery {
    default: Option<String>,
    default_type: Option<String>,
}

/// Body of update and set-default responses.
#[derive(Debug, Serialize)]
pub struct Ack {
    status: &'static str,
}

const OK: Ack = Ack { status: "ok" };

fn body(payload: std::result::Result<Json<AddressRequest>, JsonRejection>) -> Result<AddressRequest> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// List all addresses.
pub async fn list_all<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Query(query): Query<ListQuery>,
) -> Result<Json<AddressPage>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let page = query.page()?;
    let addresses = state
        .addresses()
        .list(customer.user_id, AddressFilter::All, page)
        .await?;
    Ok(Json(addresses))
}

/// List one slice of the address book.
pub async fn list_by_type<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AddressPage>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let filter = parse_filter(&kind)?;
    let page = query.page()?;
    let addresses = state
        .addresses()
        .list(customer.user_id, filter, page)
        .await?;
    Ok(Json(addresses))
}

/// Create an address.
pub async fn create<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Query(query): Query<DefaultQuery>,
    payload: std::result::Result<Json<AddressRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Address>)>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let request = body(payload)?;
    let default = parse_default(query.default.as_deref(), query.default_type.as_deref())?;
    let address = state
        .addresses()
        .create(customer.user_id, &request, default)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Update an address.
pub async fn update<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Path(id): Path<String>,
    Query(query): Query<DefaultQuery>,
    payload: std::result::Result<Json<AddressRequest>, JsonRejection>,
) -> Result<Json<Ack>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let id = parse_address_id(&id)?;
    let request = body(payload)?;
    let default = parse_default(query.default.as_deref(), query.default_type.as_deref())?;
    state
        .addresses()
        .update(customer.user_id, id, &request, default)
        .await?;
    Ok(Json(OK))
}

/// Make an address the default billing or shipping address.
pub async fn set_default<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<Ack>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let id = parse_address_id(&id)?;
    let role = parse_role(&kind)?;
    state
        .addresses()
        .set_default(customer.user_id, id, role)
        .await?;
    Ok(Json(OK))
}

/// Delete an address and return the rest.
pub async fn delete<S, C, E>(
    State(state): State<AppState<S, C, E>>,
    customer: Customer,
    Path(id): Path<String>,
) -> Result<Json<AddressPage>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let id = parse_address_id(&id)?;
    let remaining = state.addresses().delete(customer.user_id, id).await?;
    Ok(Json(remaining))
}
