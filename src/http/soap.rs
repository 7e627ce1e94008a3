//! SOAP envelopes for the CASA web service.
//!
//! Faults carry one of a fixed set of messages; the specific verification
//! failure never reaches the caller.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::subscription::types::SubscriptionId;

const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soap:Body>{}</soap:Body>",
            "</soap:Envelope>"
        ),
        body
    )
}

/// Fault envelope with a fixed public message.
pub fn fault(status: StatusCode, message: &'static str) -> Response {
    let body = envelope(&format!(
        "<soap:Fault><faultcode>soap:Client</faultcode><faultstring>{}</faultstring></soap:Fault>",
        message
    ));
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Success envelope naming the verified subscription.
pub fn subscription_verified(subscription: SubscriptionId) -> Response {
    let body = envelope(&format!(
        "<CasaVerifyResponse><valid>true</valid><subscription>{}</subscription></CasaVerifyResponse>",
        subscription
    ));
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fault_body() {
        let response = fault(StatusCode::FORBIDDEN, "Invalid CASA token");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("<faultstring>Invalid CASA token</faultstring>"));
        assert!(body.starts_with("<?xml"));
    }
}
