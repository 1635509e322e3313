/*
 * REST API module for the checkout service
 */

use ethers::types::Address;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, post, routes, State};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;
use crate::config::Config;
use crate::models::{
    CheckoutReceipt, CheckoutRequest, ItemPriceReport, QuoteReport, SwapdeskError,
};
use crate::service::CheckoutService;
use crate::utils::parse_units;

type ApiResult<T> = std::result::Result<T, Custom<String>>;

pub struct ApiState {
    pub config: Config,
    pub checkout_service: Arc<CheckoutService>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub token_in: String,
    pub token_out: String,
    /// Whole-token units of `token_in`, e.g. `"20"` or `"0.5"`.
    pub amount_in: String,
    pub fee: u32,
    pub recipient: Option<String>,
    /// Whole-token units of `token_out`.
    pub amount_out_minimum: Option<String>,
}

fn status_for(error: &SwapdeskError) -> Status {
    match error {
        SwapdeskError::CheckoutFailed { source, .. } => status_for(source),
        SwapdeskError::InvalidInput(_) => Status::BadRequest,
        SwapdeskError::RevertError { .. }
        | SwapdeskError::InsufficientAllowance { .. }
        | SwapdeskError::InsufficientBalance { .. }
        | SwapdeskError::TransactionFailed { .. } => Status::UnprocessableEntity,
        SwapdeskError::RpcError(_) | SwapdeskError::TransactionDropped { .. } => Status::BadGateway,
        _ => Status::InternalServerError,
    }
}

fn reject(error: SwapdeskError) -> Custom<String> {
    error!("Request failed: {error}");
    Custom(status_for(&error), error.to_string())
}

#[get("/api/v1/quote?<token_in>&<token_out>&<amount_out>&<fee>")]
pub async fn get_quote(
    token_in: &str,
    token_out: &str,
    amount_out: &str,
    fee: u32,
    state: &State<ApiState>,
) -> ApiResult<Json<QuoteReport>> {
    let service = &state.checkout_service;
    let token_in = service.tokens().get(token_in).map_err(reject)?;
    let token_out = service.tokens().get(token_out).map_err(reject)?;
    let amount_out = parse_units(amount_out, i32::from(token_out.decimals)).map_err(reject)?;

    let report = service
        .quote_report(token_in, token_out, amount_out, fee)
        .await
        .map_err(reject)?;
    Ok(Json(report))
}

#[get("/api/v1/item-price?<price>")]
pub async fn get_item_price(
    price: Option<&str>,
    state: &State<ApiState>,
) -> ApiResult<Json<ItemPriceReport>> {
    let service = &state.checkout_service;
    let item_price = match price {
        Some(price) => {
            let listing = service
                .tokens()
                .get(&state.config.pricing.listing_token)
                .map_err(reject)?;
            Some(parse_units(price, i32::from(listing.decimals)).map_err(reject)?)
        }
        None => None,
    };

    let report = service.item_price(item_price).await.map_err(reject)?;
    Ok(Json(report))
}

#[post("/api/v1/checkout", format = "json", data = "<body>")]
pub async fn post_checkout(
    body: Json<CheckoutBody>,
    state: &State<ApiState>,
) -> ApiResult<Json<CheckoutReceipt>> {
    let service = &state.checkout_service;
    let request = checkout_request(&body, service).map_err(reject)?;
    let receipt = service.checkout(request).await.map_err(reject)?;
    Ok(Json(receipt))
}

fn checkout_request(body: &CheckoutBody, service: &CheckoutService) -> crate::models::Result<CheckoutRequest> {
    let token_in = service.tokens().get(&body.token_in)?.clone();
    let token_out = service.tokens().get(&body.token_out)?.clone();

    let amount_in = parse_units(&body.amount_in, i32::from(token_in.decimals))?;
    let amount_out_minimum = body
        .amount_out_minimum
        .as_deref()
        .map(|minimum| parse_units(minimum, i32::from(token_out.decimals)))
        .transpose()?;
    let recipient = body
        .recipient
        .as_deref()
        .map(|recipient| {
            Address::from_str(recipient)
                .map_err(|e| SwapdeskError::InvalidInput(format!("Invalid recipient: {e}")))
        })
        .transpose()?;

    Ok(CheckoutRequest {
        token_in,
        token_out,
        amount_in,
        fee: body.fee,
        recipient,
        amount_out_minimum,
    })
}

#[get("/metrics")]
pub async fn get_metrics(state: &State<ApiState>) -> ApiResult<String> {
    state.checkout_service.metrics().render().map_err(reject)
}

#[get("/health")]
pub async fn health_check() -> &'static str {
    "OK"
}

#[must_use]
pub fn create_rocket(state: ApiState) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment()
        .merge(("address", state.config.server.host.clone()))
        .merge(("port", state.config.server.port));

    rocket::custom(figment).manage(state).mount(
        "/",
        routes![get_quote, get_item_price, post_checkout, get_metrics, health_check],
    )
}
