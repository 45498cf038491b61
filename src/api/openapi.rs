//! OpenAPI document assembled from the annotated handlers.

use utoipa::OpenApi;

use crate::api::dto::{
    BalanceResponse, CreateIntentRequest, IntentResponse, PaymentEventDto, PaymentEventsResponse,
    PaymentStatusResponse, SubmitTxRequest,
};
use crate::api::handlers::{payments, system};
use crate::config::PaymentConfigView;
use crate::domain::{AttemptStatus, ErrorCode};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI document for the gateway's REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "stablepay-gateway",
        description = "Stablecoin payment intake and exactly-once settlement"
    ),
    paths(
        payments::create_intent,
        payments::submit_tx,
        payments::get_payment,
        payments::list_events,
        payments::get_balance,
        system::health_handler,
        system::payment_config_handler,
    ),
    components(schemas(
        CreateIntentRequest,
        IntentResponse,
        SubmitTxRequest,
        PaymentStatusResponse,
        PaymentEventDto,
        PaymentEventsResponse,
        BalanceResponse,
        PaymentConfigView,
        AttemptStatus,
        ErrorCode,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Payments", description = "Payment intents, submission and settlement status"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_payment_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/payments/intents"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/payments/{id}/submit"));
        assert!(paths.iter().any(|p| p.as_str() == "/config/payment"));
    }
}
